//! # lakevol-raster
//!
//! Georeferenced raster grids for lake analysis.
//!
//! This crate provides:
//! - [`RasterImage`]: an immutable multi-band image stored as `(band, row, col)`
//!   with an affine transform, optional CRS, per-band labels and acquisition date
//! - [`ElevationRaster`]: a single-band elevation model with a no-data value
//! - [`GeoTransform`]: pixel-to-world affine transforms
//! - GeoTIFF loading for both, reading ModelTiepoint/ModelPixelScale or
//!   ModelTransformation, the GeoKey directory EPSG code, GDAL_NODATA and
//!   GDAL band descriptions
//!
//! ## Example
//!
//! ```no_run
//! use lakevol_raster::{read_elevation, read_image};
//!
//! let image = read_image("scenes/2024-03-01.tif", "2024-03-01")?;
//! println!("{} bands, {:?}", image.band_count(), image.shape());
//!
//! let dem = read_elevation("dem/basin.tif")?;
//! println!("pixel area: {} m2", dem.pixel_area());
//! # Ok::<(), lakevol_raster::RasterError>(())
//! ```

mod error;
mod geotiff;
mod image;
mod transform;

pub use error::RasterError;
pub use geotiff::{read_elevation, read_image};
pub use image::{is_geographic_crs, Bounds, ElevationRaster, PixelWindow, RasterImage};
pub use transform::GeoTransform;

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
