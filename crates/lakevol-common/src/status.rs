//! Result status values reported per image.

use serde::{Deserialize, Serialize};

/// How far a per-image volume estimate can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Area and volume come from a water polygon and a built curve.
    Measured,
    /// No water pixels were found; area and volume are zero.
    NoWater,
    /// No DEM was supplied; only the area is reported.
    NoDem,
    /// The DEM had no valid samples; volume lookups are zero.
    DemNoData,
    /// The observed area exceeds the curve; values are clamped to its top.
    OverRange,
}

impl Reliability {
    /// Status name as written to JSON output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Reliability::Measured => "measured",
            Reliability::NoWater => "no_water",
            Reliability::NoDem => "no_dem",
            Reliability::DemNoData => "dem_no_data",
            Reliability::OverRange => "over_range",
        }
    }

    /// Whether the volume figure is a direct curve lookup.
    pub fn is_measured(&self) -> bool {
        matches!(self, Reliability::Measured)
    }
}

impl std::fmt::Display for Reliability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
