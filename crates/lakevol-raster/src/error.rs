//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when loading or slicing raster data.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Unsupported data layout or sample type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),

    /// Band index is outside the raster.
    #[error("Band index {index} out of range for raster with {count} bands")]
    BandOutOfRange {
        /// Requested band index.
        index: usize,
        /// Number of bands in the raster.
        count: usize,
    },

    /// Supplied array does not match the declared grid.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },
}
