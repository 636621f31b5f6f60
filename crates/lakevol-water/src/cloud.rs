//! Cloud masking.
//!
//! Two mutually exclusive strategies produce a per-pixel cloud-invalid mask:
//! scene-classification codes when the image has an SCL band, otherwise an
//! optional probability model. The model path never fails; every problem
//! degrades to an all-clear mask and is reported in [`CloudStrategy`].

use crate::bands::BandAssignment;
use crate::error::CloudModelError;
use lakevol_common::CloudConfig;
use lakevol_raster::RasterImage;
use ndarray::{Array2, Array3, ArrayView3};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Per-pixel cloud probability estimator.
///
/// Receives the full band stack scaled into `[0, 1]` as `(band, row, col)`
/// and returns one probability per pixel.
pub trait CloudProbabilityModel: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str {
        "cloud-model"
    }

    /// Per-pixel cloud probabilities with shape `(rows, cols)`.
    fn probabilities(&self, stack: ArrayView3<'_, f32>) -> Result<Array2<f32>, CloudModelError>;
}

/// Default model used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCloudModel;

impl CloudProbabilityModel for NoCloudModel {
    fn name(&self) -> &str {
        "none"
    }

    fn probabilities(&self, _stack: ArrayView3<'_, f32>) -> Result<Array2<f32>, CloudModelError> {
        Err(CloudModelError::Unavailable)
    }
}

/// Strategy that produced a cloud mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "reason", rename_all = "snake_case")]
pub enum CloudStrategy {
    /// Scene-classification codes.
    SceneClassification,
    /// Probability model output above the threshold.
    Probabilistic,
    /// Probability path selected but unusable; mask is all clear.
    Degraded(String),
}

impl CloudStrategy {
    /// Whether the water mask should be cleaned after thresholding.
    ///
    /// Every outcome of the probability path is cleaned, including the
    /// degraded one.
    pub fn needs_cleanup(&self) -> bool {
        !matches!(self, CloudStrategy::SceneClassification)
    }

    /// Whether the model path failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, CloudStrategy::Degraded(_))
    }
}

/// Cloud-invalid mask and the strategy that produced it.
#[derive(Debug, Clone)]
pub struct CloudMask {
    /// True where the pixel is cloud-invalid.
    pub invalid: Array2<bool>,
    /// How the mask was produced.
    pub strategy: CloudStrategy,
}

impl CloudMask {
    /// Number of invalid pixels.
    pub fn invalid_count(&self) -> usize {
        self.invalid.iter().filter(|&&v| v).count()
    }
}

/// Build the cloud-invalid mask for an image.
pub fn cloud_mask(
    image: &RasterImage,
    bands: &BandAssignment,
    config: &CloudConfig,
    model: &dyn CloudProbabilityModel,
) -> CloudMask {
    if let Some(scl) = bands.scl.and_then(|i| image.band(i).ok()) {
        let invalid = scl.mapv(|code| is_invalid_class(code, &config.scl_invalid_classes));
        return CloudMask {
            invalid,
            strategy: CloudStrategy::SceneClassification,
        };
    }

    let shape = image.shape();
    match model_mask(image, config, model) {
        Ok(invalid) => CloudMask {
            invalid,
            strategy: CloudStrategy::Probabilistic,
        },
        Err(reason) => {
            warn!(image = image.id(), model = model.name(), %reason, "cloud mask degraded to all clear");
            CloudMask {
                invalid: Array2::from_elem(shape, false),
                strategy: CloudStrategy::Degraded(reason),
            }
        }
    }
}

fn is_invalid_class(code: f32, classes: &[u8]) -> bool {
    if !code.is_finite() {
        return false;
    }
    let code = code.round();
    (0.0..=255.0).contains(&code) && classes.contains(&(code as u8))
}

/// Run the probability model, returning the degradation reason on any failure.
fn model_mask(
    image: &RasterImage,
    config: &CloudConfig,
    model: &dyn CloudProbabilityModel,
) -> Result<Array2<bool>, String> {
    let count = image.band_count();
    if count < config.min_bands_for_model {
        return Err(format!(
            "{} bands, model needs at least {}",
            count, config.min_bands_for_model
        ));
    }

    let stack = normalize_stack(image.bands());
    let outcome = catch_unwind(AssertUnwindSafe(|| model.probabilities(stack.view())));
    let probabilities = match outcome {
        Ok(Ok(p)) => p,
        Ok(Err(e)) => return Err(e.to_string()),
        Err(_) => return Err("cloud model panicked".to_string()),
    };

    if probabilities.dim() != image.shape() {
        return Err(format!(
            "model returned shape {:?}, expected {:?}",
            probabilities.dim(),
            image.shape()
        ));
    }

    let threshold = config.probability_threshold;
    let invalid = probabilities.mapv(|p| p > threshold);
    debug!(
        image = image.id(),
        cloudy = invalid.iter().filter(|&&v| v).count(),
        "probabilistic cloud mask"
    );
    Ok(invalid)
}

/// Scale reflectance into `[0, 1]` from the observed maximum.
///
/// A maximum above 5000 is treated as 0-10000 reflectance, above 1 as 8-bit
/// digital numbers; otherwise the values are left as they are.
pub fn normalize_stack(stack: &Array3<f32>) -> Array3<f32> {
    let max = stack
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);

    let divisor = if max > 5000.0 {
        10_000.0
    } else if max > 1.0 {
        255.0
    } else {
        1.0
    };
    stack.mapv(|v| v / divisor)
}
