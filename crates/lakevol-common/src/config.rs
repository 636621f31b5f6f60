//! Engine configuration.

use crate::error::ConfigError;
use crate::units::CUBIC_METRES_PER_TMC;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// Policies
// ============================================================================

/// How connected water components are turned into the reported polygon.
///
/// The choice materially changes the reported area, so it is always an explicit
/// configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolygonPolicy {
    /// Keep only the single largest component (first in scan order on ties).
    #[default]
    LargestOnly,
    /// Keep every component as one multi-part geometry.
    MergeAll,
}

impl PolygonPolicy {
    /// Returns the policy name as used in config files and on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PolygonPolicy::LargestOnly => "largest-only",
            PolygonPolicy::MergeAll => "merge-all",
        }
    }
}

impl std::fmt::Display for PolygonPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolygonPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "largest-only" | "largest_only" | "largest" => Ok(PolygonPolicy::LargestOnly),
            "merge-all" | "merge_all" | "merge" => Ok(PolygonPolicy::MergeAll),
            _ => Err(ConfigError::UnknownVariant {
                kind: "polygon policy",
                value: s.to_string(),
                expected: "largest-only, merge-all",
            }),
        }
    }
}

/// Which part of the DEM feeds the volume curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum DemExtent {
    /// Use the whole DEM. The curve is built once per run and shared by all images.
    #[default]
    Full,
    /// Crop the DEM to the water polygon's bounding box grown by `margin_m` metres.
    PolygonMargin {
        /// Margin around the polygon bounds, in metres.
        margin_m: f64,
    },
}

impl DemExtent {
    /// Default margin used by `polygon-margin` when none is given.
    pub const DEFAULT_MARGIN_M: f64 = 500.0;
}

impl FromStr for DemExtent {
    type Err = ConfigError;

    /// Parses `full`, `polygon-margin` or `polygon-margin:<metres>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (mode, margin) = match lowered.split_once(':') {
            Some((mode, margin)) => (mode, Some(margin)),
            None => (lowered.as_str(), None),
        };

        match (mode, margin) {
            ("full", None) => Ok(DemExtent::Full),
            ("polygon-margin", None) => Ok(DemExtent::PolygonMargin {
                margin_m: Self::DEFAULT_MARGIN_M,
            }),
            ("polygon-margin", Some(margin)) => {
                let margin_m: f64 = margin.parse().map_err(|_| ConfigError::InvalidParameter {
                    name: "curve.dem_extent.margin_m",
                    value: margin.to_string(),
                    reason: "margin must be a number of metres",
                })?;
                Ok(DemExtent::PolygonMargin { margin_m })
            }
            _ => Err(ConfigError::UnknownVariant {
                kind: "DEM extent",
                value: s.to_string(),
                expected: "full, polygon-margin, polygon-margin:<metres>",
            }),
        }
    }
}

// ============================================================================
// Component Configuration
// ============================================================================

/// Band label tokens used to identify spectral channels.
///
/// A band label matches when the whole lower-cased label, or any of its
/// alphanumeric tokens, equals one of the listed tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// Tokens identifying the green band.
    pub green_labels: Vec<String>,
    /// Tokens identifying the near-infrared band.
    pub nir_labels: Vec<String>,
    /// Tokens identifying the scene-classification band.
    pub scl_labels: Vec<String>,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            green_labels: vec!["green".into(), "b3".into(), "b03".into()],
            nir_labels: vec!["nir".into(), "b8".into(), "b08".into()],
            scl_labels: vec![
                "scl".into(),
                "scene_classification".into(),
                "scene-classification".into(),
            ],
        }
    }
}

/// Cloud masking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Scene-classification codes treated as cloud-invalid.
    pub scl_invalid_classes: Vec<u8>,
    /// Probability above which a pixel is considered cloudy.
    pub probability_threshold: f32,
    /// Minimum band count before the probability model is invoked.
    pub min_bands_for_model: usize,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            // saturated, cloud shadow, unclassified, cloud medium, cloud high, cirrus, snow
            scl_invalid_classes: vec![1, 3, 7, 8, 9, 10, 11],
            probability_threshold: 0.4,
            min_bands_for_model: 10,
        }
    }
}

/// Water index and polygon extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Pixels with index >= threshold are water.
    pub index_threshold: f32,
    /// Added to the index denominator.
    pub index_epsilon: f32,
    /// Side length of the square opening kernel (odd).
    pub opening_kernel: usize,
    /// Components smaller than this are dropped during cleanup.
    pub min_component_pixels: usize,
    /// How multiple water components are reported.
    pub polygon_policy: PolygonPolicy,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            index_threshold: 0.0,
            index_epsilon: 1e-6,
            opening_kernel: 3,
            min_component_pixels: 64,
            polygon_policy: PolygonPolicy::LargestOnly,
        }
    }
}

/// Volume curve construction and basin-floor heuristic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Elevation step between curve levels.
    pub step: f64,
    /// Reference elevations must lie this far below the DEM minimum to be used as floor.
    /// Also the depth of the plain zero anchor below the DEM minimum.
    pub floor_epsilon: f64,
    /// Area (ha) whose first crossing is inspected for a floor artifact.
    pub detection_area_ha: f64,
    /// A jump starting below this area (ha) counts as sharp.
    pub jump_low_area_ha: f64,
    /// A jump ending above this area (ha) counts as sharp.
    pub jump_high_area_ha: f64,
    /// Depth of the synthesized floor below the detected level.
    pub synthetic_floor_depth: f64,
    /// Volume factor for the frustum approximation below the DEM floor.
    pub cone_factor: f64,
    /// Elevation drop of the virtual (0 ha, 0 m³) point used below the curve's minimum area.
    pub virtual_floor_depth: f64,
    /// Which part of the DEM feeds the curve.
    pub dem_extent: DemExtent,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            step: 0.1,
            floor_epsilon: 0.1,
            detection_area_ha: 10.0,
            jump_low_area_ha: 5.0,
            jump_high_area_ha: 50.0,
            synthetic_floor_depth: 5.0,
            cone_factor: 1.0 / 3.0,
            virtual_floor_depth: 1.0,
            dem_extent: DemExtent::Full,
        }
    }
}

/// Reporting unit conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Cubic metres per alternate volume unit.
    pub alternate_volume_m3: f64,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            alternate_volume_m3: CUBIC_METRES_PER_TMC,
        }
    }
}

impl UnitConfig {
    /// Convert cubic metres to the alternate volume unit.
    pub fn to_alternate(&self, volume_m3: f64) -> f64 {
        volume_m3 / self.alternate_volume_m3
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Immutable configuration injected into every engine component.
///
/// Missing sections and fields in a YAML file fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Band detection.
    pub bands: BandConfig,
    /// Cloud masking.
    pub cloud: CloudConfig,
    /// Water extraction.
    pub water: WaterConfig,
    /// Volume curve.
    pub curve: CurveConfig,
    /// Reporting units.
    pub units: UnitConfig,
}

impl EngineConfig {
    /// Parse and validate a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize the configuration to YAML.
    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check that every parameter is within its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
            ConfigError::InvalidParameter {
                name,
                value: value.to_string(),
                reason,
            }
        }

        let cloud = &self.cloud;
        if !(0.0..=1.0).contains(&cloud.probability_threshold) {
            return Err(invalid(
                "cloud.probability_threshold",
                cloud.probability_threshold,
                "must be within [0, 1]",
            ));
        }

        let water = &self.water;
        if !water.index_threshold.is_finite() || !(-1.0..=1.0).contains(&water.index_threshold) {
            return Err(invalid(
                "water.index_threshold",
                water.index_threshold,
                "must be within [-1, 1]",
            ));
        }
        if !(water.index_epsilon >= 0.0) {
            return Err(invalid("water.index_epsilon", water.index_epsilon, "must be >= 0"));
        }
        if water.opening_kernel == 0 || water.opening_kernel % 2 == 0 {
            return Err(invalid(
                "water.opening_kernel",
                water.opening_kernel,
                "must be a positive odd number",
            ));
        }

        let curve = &self.curve;
        if !(curve.step.is_finite() && curve.step > 0.0) {
            return Err(invalid("curve.step", curve.step, "must be > 0"));
        }
        if !(curve.floor_epsilon > 0.0) {
            return Err(invalid("curve.floor_epsilon", curve.floor_epsilon, "must be > 0"));
        }
        if !(curve.jump_low_area_ha < curve.jump_high_area_ha) {
            return Err(invalid(
                "curve.jump_low_area_ha",
                curve.jump_low_area_ha,
                "must be below curve.jump_high_area_ha",
            ));
        }
        if !(curve.synthetic_floor_depth > 0.0) {
            return Err(invalid(
                "curve.synthetic_floor_depth",
                curve.synthetic_floor_depth,
                "must be > 0",
            ));
        }
        if !(curve.cone_factor > 0.0) {
            return Err(invalid("curve.cone_factor", curve.cone_factor, "must be > 0"));
        }
        if !(curve.virtual_floor_depth >= 0.0) {
            return Err(invalid(
                "curve.virtual_floor_depth",
                curve.virtual_floor_depth,
                "must be >= 0",
            ));
        }
        if let DemExtent::PolygonMargin { margin_m } = curve.dem_extent {
            if !(margin_m >= 0.0) {
                return Err(invalid("curve.dem_extent.margin_m", margin_m, "must be >= 0"));
            }
        }

        if !(self.units.alternate_volume_m3 > 0.0) {
            return Err(invalid(
                "units.alternate_volume_m3",
                self.units.alternate_volume_m3,
                "must be > 0",
            ));
        }

        Ok(())
    }
}
