//! # lakevol-volume
//!
//! Elevation/area/volume curves for lake basins.
//!
//! This crate provides:
//! - [`build_curve`]: sweep a DEM in fixed elevation steps and accumulate
//!   flooded area and stored volume, extending the curve below the DEM
//!   minimum when the basin floor is missing
//! - [`VolumeCurve::lookup_area`]: invert the curve, turning an observed
//!   water area into a surface elevation and volume
//! - [`VolumeCurve::volume_at_elevation`]: volume stored at a given level
//!
//! ## Example
//!
//! ```
//! use lakevol_common::CurveConfig;
//! use lakevol_volume::build_curve_from_samples;
//!
//! // A 10x10 bowl of 100 m² pixels
//! let samples: Vec<f64> = (0..100)
//!     .map(|i| {
//!         let (r, c) = ((i / 10) as f64 - 4.5, (i % 10) as f64 - 4.5);
//!         100.0 + (r * r + c * c).sqrt()
//!     })
//!     .collect();
//!
//! let config = CurveConfig::default();
//! let curve = build_curve_from_samples(samples, 100.0, None, &config);
//!
//! let hit = curve.lookup_area(0.5, config.virtual_floor_depth);
//! assert!(!hit.over_range);
//! assert!(hit.volume_m3 <= curve.max_volume_m3());
//! ```

mod curve;
mod error;
mod interpolate;

pub use curve::{
    build_curve, build_curve_from_samples, CurvePoint, CurveRow, CurveStatus, FloorModel, VolumeCurve,
};
pub use error::CurveError;
pub use interpolate::AreaLookup;

/// Result type for curve operations.
pub type Result<T> = std::result::Result<T, CurveError>;
