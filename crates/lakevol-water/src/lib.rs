//! # lakevol-water
//!
//! Water extent extraction from multi-band imagery.
//!
//! Per image the pipeline is:
//! 1. [`select_bands`]: green, NIR and scene-classification bands from labels,
//!    falling back to a band-count heuristic
//! 2. [`cloud_mask`]: cloud-invalid pixels from scene-classification codes, or
//!    from an optional [`CloudProbabilityModel`] that degrades to an all-clear
//!    mask whenever it is missing or misbehaves
//! 3. [`water_index`] and [`threshold`]: normalized difference water index with
//!    NaN under clouds
//! 4. [`opening`] and [`remove_small_components`]: cleanup, only on the model path
//! 5. [`WaterPolygon::from_mask`]: 4-connected components traced into
//!    world-coordinate polygons with holes, selected by [`PolygonPolicy`]
//!
//! [`WaterExtractor`] runs all of these; [`WaterFrequency`] accumulates masks
//! across a series.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use lakevol_common::EngineConfig;
//! use lakevol_raster::{GeoTransform, RasterImage};
//! use lakevol_water::WaterExtractor;
//! use ndarray::{s, Array3};
//!
//! let mut bands = Array3::<f32>::from_elem((4, 20, 20), 0.05);
//! bands.slice_mut(s![3, .., ..]).fill(0.1);
//! bands.slice_mut(s![1, 5..15, 5..15]).fill(0.3);
//! let image = RasterImage::new("demo", bands, GeoTransform::new(0.0, 0.0, 10.0, -10.0))
//!     .with_crs("EPSG:32644");
//!
//! let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
//! let water = extractor.extract(&image)?;
//! assert!((water.polygon.area_ha - 1.0).abs() < 1e-9);
//! # Ok::<(), lakevol_water::InputError>(())
//! ```
//!
//! [`PolygonPolicy`]: lakevol_common::PolygonPolicy

mod bands;
mod cloud;
mod components;
mod error;
mod extract;
mod frequency;
mod index;
mod morphology;
mod vectorize;

pub use bands::{heuristic_indices, label_matches, select_bands, BandAssignment, BandSource};
pub use cloud::{
    cloud_mask, normalize_stack, CloudMask, CloudProbabilityModel, CloudStrategy, NoCloudModel,
};
pub use components::{label_components, remove_small_components, Component, Components};
pub use error::{CloudModelError, FrequencyError, InputError};
pub use extract::{WaterExtraction, WaterExtractor};
pub use frequency::WaterFrequency;
pub use index::{threshold, water_index, WaterIndexRaster, WaterMask};
pub use morphology::{dilate, erode, opening};
pub use vectorize::{trace_component, WaterPolygon};
