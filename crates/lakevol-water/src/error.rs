//! Error types for water extraction.

use thiserror::Error;

/// Structural input problems that abort processing of one image.
#[derive(Debug, Error)]
pub enum InputError {
    /// Image carries no coordinate-reference metadata.
    #[error("image '{image_id}' has no coordinate reference system")]
    MissingCrs {
        /// Offending image.
        image_id: String,
    },

    /// Band grid has zero rows or columns.
    #[error("image '{image_id}' has an empty grid ({rows} x {cols})")]
    EmptyGrid {
        /// Offending image.
        image_id: String,
        /// Row count.
        rows: usize,
        /// Column count.
        cols: usize,
    },

    /// Image has fewer than the two bands a water index needs.
    #[error("image '{image_id}' has {count} band(s), at least 2 are required")]
    TooFewBands {
        /// Offending image.
        image_id: String,
        /// Band count.
        count: usize,
    },
}

/// Failures reported by a cloud probability model.
///
/// These never escape the cloud selector; they select the degraded strategy.
#[derive(Debug, Error)]
pub enum CloudModelError {
    /// No model is configured.
    #[error("no cloud probability model configured")]
    Unavailable,

    /// The model ran and failed.
    #[error("cloud model failed: {0}")]
    Failed(String),
}

/// Errors from water frequency accumulation.
#[derive(Debug, Error)]
pub enum FrequencyError {
    /// Mask grid differs from the accumulator grid.
    #[error("mask shape {actual:?} does not match accumulator shape {expected:?}")]
    ShapeMismatch {
        /// Accumulator shape.
        expected: (usize, usize),
        /// Mask shape.
        actual: (usize, usize),
    },
}
