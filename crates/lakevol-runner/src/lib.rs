//! # lakevol-runner
//!
//! Multi-image lake analysis: water extraction for every image of a series,
//! volume lookup against a shared DEM curve, and a water frequency map.
//!
//! Images run in parallel on the rayon pool. A failing image is reported as
//! [`ImageOutcome::Failed`] and the rest of the series still completes.
//! Outcomes keep the input order.
//!
//! ## Example
//!
//! ```no_run
//! use lakevol_common::EngineConfig;
//! use lakevol_raster::read_elevation;
//! use lakevol_runner::{parse_dates, Analysis};
//! use std::path::PathBuf;
//!
//! let dem = read_elevation("dem/basin.tif")?;
//! let analysis = Analysis::new(EngineConfig::default())
//!     .with_dem(dem, "basin.tif")
//!     .with_base_level(251.5);
//!
//! let images = vec![PathBuf::from("scenes/a.tif"), PathBuf::from("scenes/b.tif")];
//! let dates = parse_dates("2024-01-05,2024-02-10")?;
//! let run = analysis.run_files(&images, &dates);
//! for result in run.results() {
//!     println!("{}: {:.2} ha, {:.0} m3", result.id, result.area_ha, result.volume_m3);
//! }
//! # Ok::<(), lakevol_runner::RunnerError>(())
//! ```

mod analysis;
mod error;

pub use analysis::{parse_dates, Analysis, AnalysisResult, AnalysisRun, ImageOutcome};
pub use error::RunnerError;

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
