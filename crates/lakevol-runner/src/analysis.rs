//! Multi-image analysis against a shared DEM.
//!
//! Images are processed on the rayon pool in two passes. Every image first
//! goes through water extraction; the curves for the distinct DEM crop windows
//! those polygons need are then built once each, and finally every area is
//! looked up on its curve. With the default full-DEM extent a run builds
//! exactly one curve. Failures are recorded per image and never stop the run.

use crate::error::RunnerError;
use chrono::NaiveDate;
use lakevol_common::{DemExtent, EngineConfig, Reliability};
use lakevol_metrics::{metric_defs, RunLabels};
use lakevol_raster::{read_image, ElevationRaster, PixelWindow, RasterImage};
use lakevol_volume::{build_curve, FloorModel, VolumeCurve};
use lakevol_water::{
    CloudProbabilityModel, CloudStrategy, WaterExtraction, WaterExtractor, WaterFrequency, WaterMask,
    WaterPolygon,
};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ============================================================================
// Results
// ============================================================================

/// Per-image analysis record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Image id.
    pub id: String,
    /// Acquisition date, if known.
    pub date: Option<NaiveDate>,
    /// Selected water area in hectares.
    pub area_ha: f64,
    /// Water bodies in the selected region.
    pub component_count: usize,
    /// Water surface elevation read off the curve, `None` without a DEM.
    pub elevation: Option<f64>,
    /// Stored volume in cubic metres.
    pub volume_m3: f64,
    /// Stored volume in the alternate unit.
    pub volume_tmc: f64,
    /// Reference level the base volume was computed at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_level: Option<f64>,
    /// Volume at the reference level in cubic metres.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_volume_m3: Option<f64>,
    /// Volume at the reference level in the alternate unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_volume_tmc: Option<f64>,
    /// Lowest valid DEM elevation under the curve.
    pub min_elevation: Option<f64>,
    /// Highest valid DEM elevation under the curve.
    pub max_elevation: Option<f64>,
    /// How clouds were masked.
    pub cloud: CloudStrategy,
    /// The observed area exceeded the curve.
    pub over_range: bool,
    /// How far the volume figure can be trusted.
    pub reliability: Reliability,
}

/// Outcome of one image in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// The image was analysed.
    Completed(AnalysisResult),
    /// The image was rejected; the rest of the run went ahead.
    Failed {
        /// Image id.
        image_id: String,
        /// Why it was rejected.
        error: String,
    },
}

impl ImageOutcome {
    /// Image id of either variant.
    pub fn image_id(&self) -> &str {
        match self {
            ImageOutcome::Completed(result) => &result.id,
            ImageOutcome::Failed { image_id, .. } => image_id,
        }
    }

    /// The result, when the image was analysed.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            ImageOutcome::Completed(result) => Some(result),
            ImageOutcome::Failed { .. } => None,
        }
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// One outcome per input image, in input order.
    pub outcomes: Vec<ImageOutcome>,
    /// Water frequency over every analysed image on the common grid.
    pub frequency: WaterFrequency,
    /// Masks left out of the frequency map because their grid differed.
    pub frequency_skipped: usize,
}

impl AnalysisRun {
    /// Results of the images that were analysed.
    pub fn results(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.outcomes.iter().filter_map(ImageOutcome::result)
    }

    /// Number of rejected images.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Failed { .. }))
            .count()
    }
}

// ============================================================================
// Analysis context
// ============================================================================

/// Run context: configuration, extractor, DEM and curve cache.
pub struct Analysis {
    config: Arc<EngineConfig>,
    extractor: WaterExtractor,
    dem: Option<Arc<ElevationRaster>>,
    reference_floor: Option<f64>,
    base_level: Option<f64>,
    curves: Mutex<HashMap<Option<PixelWindow>, Arc<VolumeCurve>>>,
    curves_built: AtomicUsize,
    labels: RunLabels,
}

impl std::fmt::Debug for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analysis")
            .field("extractor", &self.extractor)
            .field("dem", &self.dem.as_ref().map(|d| d.shape()))
            .field("reference_floor", &self.reference_floor)
            .field("base_level", &self.base_level)
            .field("cached_curves", &self.curves.lock().len())
            .field("curves_built", &self.curves_built())
            .finish()
    }
}

impl Analysis {
    /// Create a run context with no DEM.
    pub fn new(config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let labels = RunLabels::new("none", config.water.polygon_policy.as_str());
        Self {
            extractor: WaterExtractor::new(Arc::clone(&config)),
            config,
            dem: None,
            reference_floor: None,
            base_level: None,
            curves: Mutex::new(HashMap::new()),
            curves_built: AtomicUsize::new(0),
            labels,
        }
    }

    /// Measure volumes against this DEM.
    pub fn with_dem(mut self, dem: ElevationRaster, name: impl Into<String>) -> Self {
        self.dem = Some(Arc::new(dem));
        self.labels.dem = name.into();
        self.curves.get_mut().clear();
        self
    }

    /// Known basin-floor elevation below the DEM.
    pub fn with_reference_floor(mut self, elevation: f64) -> Self {
        self.reference_floor = Some(elevation);
        self.curves.get_mut().clear();
        self
    }

    /// Also report the volume at this reference level.
    pub fn with_base_level(mut self, elevation: f64) -> Self {
        self.base_level = Some(elevation);
        self
    }

    /// Cloud probability model for images without a scene-classification band.
    pub fn with_cloud_model(mut self, model: Arc<dyn CloudProbabilityModel>) -> Self {
        self.extractor = self.extractor.with_cloud_model(model);
        self
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of curves built so far.
    pub fn curves_built(&self) -> usize {
        self.curves_built.load(Ordering::Relaxed)
    }

    /// Curve of the whole DEM, built on first use.
    pub fn full_curve(&self) -> Option<Arc<VolumeCurve>> {
        self.curve_for_window(None)
    }

    /// Analyse decoded images.
    pub fn run(&self, images: Vec<RasterImage>) -> AnalysisRun {
        let inputs: Vec<_> = images.into_iter().map(Ok).collect();
        self.run_inputs(inputs)
    }

    /// Load and analyse GeoTIFF images.
    ///
    /// Image ids are the file stems. `dates` maps to images by position;
    /// images past its end, or with an empty entry, get no date.
    pub fn run_files(&self, paths: &[PathBuf], dates: &[Option<NaiveDate>]) -> AnalysisRun {
        let inputs: Vec<_> = paths
            .par_iter()
            .enumerate()
            .map(|(i, path)| {
                let id = image_id(path);
                let date = dates.get(i).copied().flatten();
                read_image(path, id.clone())
                    .map(|image| match date {
                        Some(date) => image.with_date(date),
                        None => image,
                    })
                    .map_err(|e| (id, RunnerError::from(e)))
            })
            .collect();
        self.run_inputs(inputs)
    }

    fn run_inputs(&self, inputs: Vec<Result<RasterImage, (String, RunnerError)>>) -> AnalysisRun {
        info!(images = inputs.len(), dem = %self.labels.dem, "starting analysis");

        let extracted: Vec<Result<(RasterImage, WaterExtraction), (String, RunnerError)>> = inputs
            .into_par_iter()
            .map(|input| {
                let image = input?;
                match self.extract(&image) {
                    Ok(extraction) => Ok((image, extraction)),
                    Err(e) => Err((image.id().to_string(), e)),
                }
            })
            .collect();

        self.prepare_curves(extracted.iter().filter_map(|r| r.as_ref().ok()).map(|(_, x)| &x.polygon));

        let processed: Vec<(ImageOutcome, Option<WaterMask>)> = extracted
            .into_par_iter()
            .map(|item| match item {
                Ok((image, extraction)) => {
                    let (result, mask) = self.measure(&image, extraction);
                    (ImageOutcome::Completed(result), Some(mask))
                }
                Err((id, e)) => (self.failure(id, &e), None),
            })
            .collect();

        let mut frequency = WaterFrequency::new();
        let mut frequency_skipped = 0;
        let mut outcomes = Vec::with_capacity(processed.len());
        for (outcome, mask) in processed {
            if let Some(mask) = mask {
                if let Err(e) = frequency.add(&mask) {
                    warn!(image = outcome.image_id(), error = %e, "mask left out of frequency map");
                    metrics::counter!(metric_defs::FREQUENCY_SKIPPED.name, &self.labels.to_labels())
                        .increment(1);
                    frequency_skipped += 1;
                }
            }
            outcomes.push(outcome);
        }
        metrics::gauge!(metric_defs::FREQUENCY_IMAGES.name, &self.labels.to_labels())
            .set(frequency.images() as f64);

        let run = AnalysisRun {
            outcomes,
            frequency,
            frequency_skipped,
        };
        info!(
            completed = run.results().count(),
            failed = run.failed(),
            frequency_images = run.frequency.images(),
            "analysis finished"
        );
        run
    }

    fn failure(&self, image_id: String, error: &RunnerError) -> ImageOutcome {
        warn!(image = %image_id, error = %error, "image skipped");
        let reason = match error {
            RunnerError::Input(_) => "input",
            RunnerError::Raster(_) => "raster",
            _ => "other",
        };
        metrics::counter!(
            metric_defs::IMAGES_FAILED.name,
            &self.labels.with(&[("reason", reason.to_string())])
        )
        .increment(1);
        ImageOutcome::Failed {
            image_id,
            error: error.to_string(),
        }
    }

    /// Analyse one decoded image.
    ///
    /// Builds the curve the image needs on a cache miss. Concurrent callers
    /// missing on the same window may each build it; [`Analysis::run`]
    /// builds every window once.
    pub fn analyze_image(&self, image: &RasterImage) -> Result<(AnalysisResult, WaterMask), RunnerError> {
        let extraction = self.extract(image)?;
        Ok(self.measure(image, extraction))
    }

    fn extract(&self, image: &RasterImage) -> Result<WaterExtraction, RunnerError> {
        let started = Instant::now();
        let extraction = self.extractor.extract(image)?;
        metrics::histogram!(metric_defs::EXTRACT_TIME.name, &self.labels.to_labels())
            .record(started.elapsed().as_secs_f64());
        Ok(extraction)
    }

    /// Build the curves for every distinct window these polygons need.
    fn prepare_curves<'a>(&self, polygons: impl Iterator<Item = &'a WaterPolygon>) {
        let Some(dem) = self.dem.as_ref() else {
            return;
        };
        let windows: HashSet<Option<PixelWindow>> = polygons.map(|p| self.window_for(dem, p)).collect();
        debug!(windows = windows.len(), "preparing volume curves");
        windows.par_iter().for_each(|window| {
            let _ = self.curve_for_window(*window);
        });
    }

    fn measure(&self, image: &RasterImage, extraction: WaterExtraction) -> (AnalysisResult, WaterMask) {
        let polygon = &extraction.polygon;
        metrics::histogram!(metric_defs::WATER_AREA.name, &self.labels.to_labels()).record(polygon.area_ha);
        if extraction.cloud_strategy.is_degraded() {
            metrics::counter!(metric_defs::CLOUD_DEGRADED.name, &self.labels.to_labels()).increment(1);
        }

        let units = &self.config.units;
        let mut result = AnalysisResult {
            id: image.id().to_string(),
            date: image.date(),
            area_ha: polygon.area_ha,
            component_count: polygon.component_count,
            elevation: None,
            volume_m3: 0.0,
            volume_tmc: 0.0,
            base_level: None,
            base_volume_m3: None,
            base_volume_tmc: None,
            min_elevation: None,
            max_elevation: None,
            cloud: extraction.cloud_strategy.clone(),
            over_range: false,
            reliability: if polygon.is_empty() {
                Reliability::NoWater
            } else {
                Reliability::NoDem
            },
        };

        if let Some(curve) = self.curve_for(polygon) {
            let lookup = curve.lookup_area(polygon.area_ha, self.config.curve.virtual_floor_depth);
            result.volume_m3 = lookup.volume_m3;
            result.volume_tmc = units.to_alternate(lookup.volume_m3);
            result.over_range = lookup.over_range;

            if curve.is_degenerate() {
                if !polygon.is_empty() {
                    result.reliability = Reliability::DemNoData;
                }
            } else {
                result.elevation = Some(lookup.elevation);
                result.min_elevation = Some(curve.min_elevation());
                result.max_elevation = Some(curve.max_elevation());
                if lookup.over_range {
                    result.reliability = Reliability::OverRange;
                    metrics::counter!(metric_defs::VOLUME_OVER_RANGE.name, &self.labels.to_labels())
                        .increment(1);
                } else if !polygon.is_empty() {
                    result.reliability = Reliability::Measured;
                }
            }

            if let Some(level) = self.base_level {
                let volume = curve.volume_at_elevation(level);
                result.base_level = Some(level);
                result.base_volume_m3 = Some(volume);
                result.base_volume_tmc = Some(units.to_alternate(volume));
            }
        }

        metrics::counter!(
            metric_defs::IMAGES_PROCESSED.name,
            &self.labels.with(&[
                ("cloud_strategy", cloud_label(&result.cloud).to_string()),
                ("reliability", result.reliability.as_str().to_string()),
            ])
        )
        .increment(1);
        debug!(
            image = %result.id,
            area_ha = result.area_ha,
            volume_m3 = result.volume_m3,
            reliability = %result.reliability,
            "image analysed"
        );

        (result, extraction.mask)
    }

    /// Curve to measure `polygon` against, `None` without a DEM.
    fn curve_for(&self, polygon: &WaterPolygon) -> Option<Arc<VolumeCurve>> {
        let dem = self.dem.as_ref()?;
        self.curve_for_window(self.window_for(dem, polygon))
    }

    /// DEM crop window for `polygon`, `None` for the full DEM.
    fn window_for(&self, dem: &ElevationRaster, polygon: &WaterPolygon) -> Option<PixelWindow> {
        match self.config.curve.dem_extent {
            DemExtent::Full => None,
            DemExtent::PolygonMargin { margin_m } => {
                let window = polygon
                    .bounds()
                    .and_then(|bounds| dem.window_for(&bounds.expand(margin_m)));
                if window.is_none() && !polygon.is_empty() {
                    warn!(image = %polygon.image_id, "water polygon is outside the DEM, using the full DEM");
                }
                window
            }
        }
    }

    fn curve_for_window(&self, window: Option<PixelWindow>) -> Option<Arc<VolumeCurve>> {
        let dem = self.dem.as_ref()?;
        if let Some(curve) = self.curves.lock().get(&window) {
            metrics::counter!(metric_defs::CURVE_CACHE_HITS.name, &self.labels.to_labels()).increment(1);
            return Some(Arc::clone(curve));
        }

        // Built without holding the lock: the builder itself runs on the pool
        let started = Instant::now();
        let curve = match window {
            None => build_curve(dem, self.reference_floor, &self.config.curve),
            Some(window) => match dem.crop(&window) {
                Ok(cropped) => build_curve(&cropped, self.reference_floor, &self.config.curve),
                Err(e) => {
                    warn!(error = %e, "DEM crop failed, using the full DEM");
                    return self.curve_for_window(None);
                }
            },
        };
        self.curves_built.fetch_add(1, Ordering::Relaxed);
        metrics::histogram!(metric_defs::CURVE_BUILD_TIME.name, &self.labels.to_labels())
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            metric_defs::CURVE_BUILDS.name,
            &self.labels.with(&[("floor", floor_label(curve.floor()).to_string())])
        )
        .increment(1);

        let mut curves = self.curves.lock();
        let curve = curves.entry(window).or_insert_with(|| Arc::new(curve));
        Some(Arc::clone(curve))
    }
}

fn image_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn cloud_label(strategy: &CloudStrategy) -> &'static str {
    match strategy {
        CloudStrategy::SceneClassification => "scene_classification",
        CloudStrategy::Probabilistic => "probabilistic",
        CloudStrategy::Degraded(_) => "degraded",
    }
}

fn floor_label(floor: &FloorModel) -> &'static str {
    match floor {
        FloorModel::Reference { .. } => "reference",
        FloorModel::Synthesized { .. } => "synthesized",
        FloorModel::ZeroAnchor { .. } => "zero_anchor",
        FloorModel::None => "none",
    }
}

/// Parse a comma-separated `YYYY-MM-DD` list. Empty entries stay `None`.
pub fn parse_dates(list: &str) -> Result<Vec<Option<NaiveDate>>, RunnerError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(str::trim)
        .map(|value| {
            if value.is_empty() {
                return Ok(None);
            }
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(Some)
                .map_err(|source| RunnerError::InvalidDate {
                    value: value.to_string(),
                    source,
                })
        })
        .collect()
}
