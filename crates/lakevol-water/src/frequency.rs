//! Per-pixel water frequency across an image series.

use crate::error::FrequencyError;
use crate::index::WaterMask;
use lakevol_raster::GeoTransform;
use ndarray::Array2;

/// Running water count per pixel plus the number of masks seen.
///
/// The grid shape is fixed by the first mask. Accumulators built in parallel
/// can be merged in any order with the same result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterFrequency {
    counts: Option<Array2<u32>>,
    transform: Option<GeoTransform>,
    images: u32,
}

impl WaterFrequency {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of masks accumulated.
    pub fn images(&self) -> u32 {
        self.images
    }

    /// Grid shape, once known.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.counts.as_ref().map(|c| c.dim())
    }

    /// Transform of the first accumulated mask.
    pub fn transform(&self) -> Option<&GeoTransform> {
        self.transform.as_ref()
    }

    /// Raw per-pixel water counts.
    pub fn counts(&self) -> Option<&Array2<u32>> {
        self.counts.as_ref()
    }

    /// Add one mask. A mask on a different grid is rejected and not counted.
    pub fn add(&mut self, mask: &WaterMask) -> Result<(), FrequencyError> {
        if self.transform.is_none() {
            self.transform = Some(mask.transform);
        }
        let counts = self.counts.get_or_insert_with(|| Array2::zeros(mask.shape()));
        if counts.dim() != mask.shape() {
            return Err(FrequencyError::ShapeMismatch {
                expected: counts.dim(),
                actual: mask.shape(),
            });
        }

        counts.zip_mut_with(&mask.mask, |count, &water| {
            if water {
                *count += 1;
            }
        });
        self.images += 1;
        Ok(())
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: WaterFrequency) -> Result<(), FrequencyError> {
        let Some(other_counts) = other.counts else {
            return Ok(());
        };
        match &mut self.counts {
            Some(counts) => {
                if counts.dim() != other_counts.dim() {
                    return Err(FrequencyError::ShapeMismatch {
                        expected: counts.dim(),
                        actual: other_counts.dim(),
                    });
                }
                *counts += &other_counts;
            }
            None => {
                self.counts = Some(other_counts);
                self.transform = other.transform;
            }
        }
        self.images += other.images;
        Ok(())
    }

    /// Fraction of images in which each pixel was water.
    pub fn frequency(&self) -> Option<Array2<f32>> {
        let counts = self.counts.as_ref()?;
        if self.images == 0 {
            return None;
        }
        let images = self.images as f32;
        Some(counts.mapv(|c| c as f32 / images))
    }

    /// Frequency as an integer percentage, truncated toward zero.
    pub fn percent(&self) -> Option<Array2<u8>> {
        let counts = self.counts.as_ref()?;
        if self.images == 0 {
            return None;
        }
        let images = u64::from(self.images);
        Some(counts.mapv(|c| (u64::from(c) * 100 / images).min(100) as u8))
    }
}
