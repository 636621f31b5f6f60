//! Per-image water extraction.

use crate::bands::{select_bands, BandAssignment};
use crate::cloud::{cloud_mask, CloudProbabilityModel, CloudStrategy, NoCloudModel};
use crate::components::remove_small_components;
use crate::error::InputError;
use crate::index::{threshold, water_index, WaterIndexRaster, WaterMask};
use crate::morphology::opening;
use crate::vectorize::WaterPolygon;
use lakevol_common::EngineConfig;
use lakevol_raster::{is_geographic_crs, RasterImage};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything produced for one image.
#[derive(Debug, Clone)]
pub struct WaterExtraction {
    /// Bands used.
    pub bands: BandAssignment,
    /// Cloud strategy used.
    pub cloud_strategy: CloudStrategy,
    /// Water index, NaN under clouds.
    pub index: WaterIndexRaster,
    /// Final water mask (after cleanup when it applies).
    pub mask: WaterMask,
    /// Selected water region.
    pub polygon: WaterPolygon,
}

/// Extracts water polygons from images with a fixed configuration and cloud model.
#[derive(Clone)]
pub struct WaterExtractor {
    config: Arc<EngineConfig>,
    model: Arc<dyn CloudProbabilityModel>,
}

impl std::fmt::Debug for WaterExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaterExtractor")
            .field("model", &self.model.name())
            .finish_non_exhaustive()
    }
}

impl WaterExtractor {
    /// Create an extractor without a cloud probability model.
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            config,
            model: Arc::new(NoCloudModel),
        }
    }

    /// Use a cloud probability model for images without a scene-classification band.
    pub fn with_cloud_model(mut self, model: Arc<dyn CloudProbabilityModel>) -> Self {
        self.model = model;
        self
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run band selection, cloud masking, index thresholding, cleanup and
    /// vectorization for one image.
    pub fn extract(&self, image: &RasterImage) -> Result<WaterExtraction, InputError> {
        validate_input(image)?;

        let config = &*self.config;
        let bands = select_bands(image, &config.bands);
        let clouds = cloud_mask(image, &bands, &config.cloud, self.model.as_ref());

        let green = image.band(bands.green).map_err(|_| too_few_bands(image))?;
        let nir = image.band(bands.nir).map_err(|_| too_few_bands(image))?;
        let values = water_index(green, nir, &clouds.invalid, config.water.index_epsilon);

        let mut mask = threshold(&values, config.water.index_threshold);
        if clouds.strategy.needs_cleanup() {
            mask = opening(&mask, config.water.opening_kernel);
            mask = remove_small_components(&mask, config.water.min_component_pixels);
        }

        let transform = *image.transform();
        let mask = WaterMask { mask, transform };
        let polygon = WaterPolygon::from_mask(&mask, config.water.polygon_policy, image.id(), image.date());

        debug!(
            image = image.id(),
            green = bands.green,
            nir = bands.nir,
            cloudy = clouds.invalid_count(),
            water_pixels = polygon.pixel_count,
            area_ha = polygon.area_ha,
            "water extracted"
        );

        Ok(WaterExtraction {
            bands,
            cloud_strategy: clouds.strategy,
            index: WaterIndexRaster { values, transform },
            mask,
            polygon,
        })
    }
}

fn too_few_bands(image: &RasterImage) -> InputError {
    InputError::TooFewBands {
        image_id: image.id().to_string(),
        count: image.band_count(),
    }
}

fn validate_input(image: &RasterImage) -> Result<(), InputError> {
    let crs = image.crs().ok_or_else(|| InputError::MissingCrs {
        image_id: image.id().to_string(),
    })?;

    let (rows, cols) = image.shape();
    if rows == 0 || cols == 0 {
        return Err(InputError::EmptyGrid {
            image_id: image.id().to_string(),
            rows,
            cols,
        });
    }
    if image.band_count() < 2 {
        return Err(too_few_bands(image));
    }

    if is_geographic_crs(crs) {
        warn!(image = image.id(), crs, "image is in a geographic CRS, areas will not be metric");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudModelError;
    use approx::assert_relative_eq;
    use lakevol_raster::GeoTransform;
    use ndarray::{s, Array2, Array3, ArrayView3};

    /// 4-band image: NIR 0.1 everywhere, green 0.3 on a 10x10 block at
    /// rows/cols 10..20, green 0.05 elsewhere.
    fn block_image(bands: usize) -> RasterImage {
        let mut stack = Array3::<f32>::from_elem((bands, 30, 30), 0.02);
        stack.slice_mut(s![1, .., ..]).fill(0.05);
        stack.slice_mut(s![1, 10..20, 10..20]).fill(0.3);
        stack.slice_mut(s![3, .., ..]).fill(0.1);
        RasterImage::new("block", stack, GeoTransform::new(400_000.0, 2_000_000.0, 10.0, -10.0))
            .with_crs("EPSG:32643")
            .with_labels(vec![Some("B2"), Some("B3"), Some("B4"), Some("B8")])
    }

    struct FailingModel;

    impl CloudProbabilityModel for FailingModel {
        fn probabilities(&self, _stack: ArrayView3<'_, f32>) -> Result<Array2<f32>, CloudModelError> {
            Err(CloudModelError::Failed("weights missing".to_string()))
        }
    }

    #[test]
    fn test_block_scenario() {
        let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
        let out = extractor.extract(&block_image(4)).unwrap();

        assert_eq!((out.bands.green, out.bands.nir), (1, 3));
        assert!(out.cloud_strategy.is_degraded());
        assert_eq!(out.mask.water_pixels(), 100);
        assert!(out.mask.mask[[10, 10]] && out.mask.mask[[19, 19]]);
        assert!(!out.mask.mask[[9, 10]] && !out.mask.mask[[20, 19]]);
        assert_relative_eq!(out.polygon.area_ha, 1.0, epsilon = 1e-9);
        assert_eq!(out.polygon.image_id, "block");
    }

    #[test]
    fn test_all_below_threshold_is_empty() {
        let mut image_stack = Array3::<f32>::from_elem((4, 8, 8), 0.05);
        image_stack.slice_mut(s![3, .., ..]).fill(0.2);
        let image = RasterImage::new("dry", image_stack, GeoTransform::new(0.0, 0.0, 10.0, -10.0))
            .with_crs("EPSG:32643");

        let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
        let out = extractor.extract(&image).unwrap();
        assert!(out.polygon.is_empty());
        assert_eq!(out.polygon.area_ha, 0.0);
        assert!(out.mask.is_empty());
    }

    #[test]
    fn test_failing_model_leaves_index_untouched() {
        let image = block_image(12);
        let plain = WaterExtractor::new(Arc::new(EngineConfig::default()));
        let failing = plain.clone().with_cloud_model(Arc::new(FailingModel));

        let a = plain.extract(&image).unwrap();
        let b = failing.extract(&image).unwrap();
        assert!(matches!(b.cloud_strategy, CloudStrategy::Degraded(ref r) if r.contains("weights missing")));
        assert!(!b.index.values.iter().any(|v| v.is_nan()));
        assert_eq!(a.mask, b.mask);
    }

    #[test]
    fn test_missing_crs() {
        let image = RasterImage::new("nocrs", Array3::zeros((4, 2, 2)), GeoTransform::default());
        let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
        assert!(matches!(
            extractor.extract(&image),
            Err(InputError::MissingCrs { ref image_id }) if image_id == "nocrs"
        ));
    }

    #[test]
    fn test_empty_grid() {
        let image = RasterImage::new("empty", Array3::zeros((4, 0, 5)), GeoTransform::default())
            .with_crs("EPSG:32643");
        let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
        assert!(matches!(
            extractor.extract(&image),
            Err(InputError::EmptyGrid { rows: 0, cols: 5, .. })
        ));
    }

    #[test]
    fn test_scene_classification_skips_cleanup() {
        // A single water pixel survives when SCL drives cloud masking
        let mut stack = Array3::<f32>::from_elem((5, 6, 6), 0.05);
        stack.slice_mut(s![3, .., ..]).fill(0.1);
        stack[[1, 2, 2]] = 0.3;
        stack.slice_mut(s![4, .., ..]).fill(4.0);
        stack[[4, 0, 0]] = 9.0;
        let image = RasterImage::new("scl", stack, GeoTransform::new(0.0, 0.0, 10.0, -10.0))
            .with_crs("EPSG:32643")
            .with_labels(vec![Some("B2"), Some("B3"), Some("B4"), Some("B8"), Some("SCL")]);

        let extractor = WaterExtractor::new(Arc::new(EngineConfig::default()));
        let out = extractor.extract(&image).unwrap();
        assert_eq!(out.cloud_strategy, CloudStrategy::SceneClassification);
        assert!(out.index.values[[0, 0]].is_nan());
        assert_eq!(out.polygon.pixel_count, 1);
        assert_relative_eq!(out.polygon.area_ha, 0.01, epsilon = 1e-12);
    }
}
