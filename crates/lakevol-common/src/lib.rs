//! # lakevol-common
//!
//! Configuration, status values and unit conventions shared by every lakevol component.
//!
//! All thresholds, unit-conversion constants and basin-floor heuristic parameters
//! live in one immutable [`EngineConfig`]. Each component receives the section it
//! needs by reference, so tests can parameterize behavior without touching globals.
//!
//! ## Example
//!
//! ```
//! use lakevol_common::{EngineConfig, PolygonPolicy};
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.water.polygon_policy, PolygonPolicy::LargestOnly);
//! assert_eq!(config.curve.step, 0.1);
//!
//! let yaml = "water:\n  polygon_policy: merge-all\n";
//! let config = EngineConfig::from_yaml_str(yaml)?;
//! assert_eq!(config.water.polygon_policy, PolygonPolicy::MergeAll);
//! # Ok::<(), lakevol_common::ConfigError>(())
//! ```

mod config;
mod error;
mod status;
pub mod units;

pub use config::{
    BandConfig, CloudConfig, CurveConfig, DemExtent, EngineConfig, PolygonPolicy, UnitConfig,
    WaterConfig,
};
pub use error::ConfigError;
pub use status::Reliability;
