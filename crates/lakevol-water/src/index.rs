//! Normalized difference water index and thresholding.

use lakevol_raster::GeoTransform;
use ndarray::{Array2, ArrayView2, Zip};

/// Per-pixel water index, NaN where the pixel was cloud-masked.
#[derive(Debug, Clone)]
pub struct WaterIndexRaster {
    /// Index values in roughly `[-1, 1]`.
    pub values: Array2<f32>,
    /// Grid transform.
    pub transform: GeoTransform,
}

/// Binary water raster carrying its grid transform.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterMask {
    /// True where the pixel is water.
    pub mask: Array2<bool>,
    /// Grid transform.
    pub transform: GeoTransform,
}

impl WaterMask {
    /// Grid shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    /// Number of water pixels.
    pub fn water_pixels(&self) -> usize {
        self.mask.iter().filter(|&&v| v).count()
    }

    /// Whether no pixel is water.
    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&v| v)
    }
}

/// Compute `(green - nir) / (green + nir + epsilon)`.
///
/// Cloud-invalid pixels are NaN.
pub fn water_index(
    green: ArrayView2<'_, f32>,
    nir: ArrayView2<'_, f32>,
    cloud_invalid: &Array2<bool>,
    epsilon: f32,
) -> Array2<f32> {
    let mut out = Array2::from_elem(green.dim(), f32::NAN);
    Zip::from(&mut out)
        .and(&green)
        .and(&nir)
        .and(cloud_invalid)
        .for_each(|out, &g, &n, &cloudy| {
            if !cloudy {
                *out = (g - n) / (g + n + epsilon);
            }
        });
    out
}

/// Threshold an index raster. NaN never counts as water.
pub fn threshold(index: &Array2<f32>, threshold: f32) -> Array2<bool> {
    index.mapv(|v| v >= threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_index_values() {
        let green = arr2(&[[0.3f32, 0.05], [0.2, 0.0]]);
        let nir = arr2(&[[0.1f32, 0.1], [0.2, 0.0]]);
        let clouds = Array2::from_elem((2, 2), false);
        let index = water_index(green.view(), nir.view(), &clouds, 1e-6);

        assert_relative_eq!(index[[0, 0]], 0.5, epsilon = 1e-5);
        assert_relative_eq!(index[[0, 1]], -1.0 / 3.0, epsilon = 1e-5);
        assert_relative_eq!(index[[1, 0]], 0.0);
        // Zero denominator is guarded by epsilon
        assert_eq!(index[[1, 1]], 0.0);
    }

    #[test]
    fn test_cloud_pixels_are_nan_and_never_water() {
        let green = arr2(&[[0.3f32, 0.3]]);
        let nir = arr2(&[[0.1f32, 0.1]]);
        let clouds = arr2(&[[true, false]]);
        let index = water_index(green.view(), nir.view(), &clouds, 1e-6);
        assert!(index[[0, 0]].is_nan());

        let mask = threshold(&index, 0.0);
        assert_eq!(mask, arr2(&[[false, true]]));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let index = arr2(&[[0.0f32, -0.01, 0.2]]);
        assert_eq!(threshold(&index, 0.0), arr2(&[[true, false, true]]));
        assert_eq!(threshold(&index, 0.2), arr2(&[[false, false, true]]));
    }
}
