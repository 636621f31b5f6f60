//! Error types for volume curves.

use thiserror::Error;

/// Errors from assembling a curve out of tabulated points.
#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    /// No points were supplied.
    #[error("curve has no points")]
    Empty,

    /// Elevation does not strictly increase, or area/volume decrease.
    #[error("curve point {index} breaks monotonicity: {reason}")]
    NotMonotonic {
        /// Index of the offending point.
        index: usize,
        /// Which quantity decreased.
        reason: &'static str,
    },

    /// A value is NaN or infinite.
    #[error("curve point {index} is not finite")]
    NotFinite {
        /// Index of the offending point.
        index: usize,
    },
}
