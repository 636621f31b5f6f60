//! Error types for analysis runs.

use lakevol_common::ConfigError;
use lakevol_raster::RasterError;
use lakevol_water::InputError;
use thiserror::Error;

/// Errors that can occur while setting up or executing a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A raster could not be read.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// An image failed input validation.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// A date in the date list is not `YYYY-MM-DD`.
    #[error("Invalid date '{value}': {source}")]
    InvalidDate {
        /// The rejected text.
        value: String,
        /// Parser error.
        source: chrono::ParseError,
    },

    /// I/O error writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
