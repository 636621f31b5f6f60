//! Spectral band detection.

use lakevol_common::BandConfig;
use lakevol_raster::RasterImage;
use serde::Serialize;
use tracing::{debug, warn};

/// How a band assignment was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSource {
    /// Green and NIR were both found in the band labels.
    Labels,
    /// Green and NIR come from the band-count heuristic.
    BandCount,
}

/// Band indices used for water detection in one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BandAssignment {
    /// Zero-based green band index.
    pub green: usize,
    /// Zero-based near-infrared band index.
    pub nir: usize,
    /// Zero-based scene-classification band index, if any.
    pub scl: Option<usize>,
    /// How green and NIR were chosen.
    pub source: BandSource,
    /// Whether out-of-range indices were clamped to `(0, 1)`.
    pub clamped: bool,
}

/// Whether a label matches any of the given tokens.
///
/// Matching is case-insensitive against the whole label and against each of
/// its alphanumeric tokens, so `"B08 (NIR)"` matches `nir` and `b08` while
/// `"B8A"` does not match `b8`.
pub fn label_matches(label: &str, tokens: &[String]) -> bool {
    let lowered = label.trim().to_ascii_lowercase();
    tokens.iter().any(|token| {
        let token = token.to_ascii_lowercase();
        lowered == token
            || lowered
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|part| part == token)
    })
}

fn find_label(labels: &[Option<String>], tokens: &[String], skip: &[usize]) -> Option<usize> {
    labels.iter().enumerate().find_map(|(i, label)| match label {
        Some(label) if !skip.contains(&i) && label_matches(label, tokens) => Some(i),
        _ => None,
    })
}

/// Green/NIR indices implied by the band count alone.
///
/// 4-band products are ordered blue, green, red, NIR. Full 12/13-band
/// products put green at 2 and NIR at 7. Anything else assumes the 4-band order.
pub fn heuristic_indices(band_count: usize) -> (usize, usize) {
    if band_count >= 12 {
        (2, 7)
    } else {
        (1, 3)
    }
}

/// Decide which channels are green, NIR and scene classification.
pub fn select_bands(image: &RasterImage, config: &BandConfig) -> BandAssignment {
    let count = image.band_count();
    let labels = image.band_labels();

    let scl = find_label(labels, &config.scl_labels, &[]);
    let skip: Vec<usize> = scl.into_iter().collect();
    let green = find_label(labels, &config.green_labels, &skip);
    let nir = green.and_then(|g| {
        let mut skip = skip.clone();
        skip.push(g);
        find_label(labels, &config.nir_labels, &skip)
    });

    let (mut green, mut nir, source) = match (green, nir) {
        (Some(green), Some(nir)) => (green, nir, BandSource::Labels),
        _ => {
            let (green, nir) = heuristic_indices(count);
            debug!(
                image = image.id(),
                bands = count,
                green,
                nir,
                "band labels incomplete, using band-count heuristic"
            );
            (green, nir, BandSource::BandCount)
        }
    };

    let mut clamped = false;
    if green >= count || nir >= count {
        warn!(
            image = image.id(),
            bands = count,
            green,
            nir,
            "band indices out of range, clamping to (0, 1)"
        );
        green = 0;
        nir = 1;
        clamped = true;
    }

    BandAssignment {
        green,
        nir,
        scl: scl.filter(|&i| i < count),
        source,
        clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakevol_raster::GeoTransform;
    use ndarray::Array3;

    fn image(bands: usize, labels: &[Option<&str>]) -> RasterImage {
        RasterImage::new("t", Array3::zeros((bands, 2, 2)), GeoTransform::default())
            .with_labels(labels.iter().copied())
    }

    #[test]
    fn test_label_matching() {
        let nir = BandConfig::default().nir_labels;
        assert!(label_matches("NIR", &nir));
        assert!(label_matches("B08 (nir)", &nir));
        assert!(label_matches("b8", &nir));
        assert!(!label_matches("B8A", &nir));
        assert!(!label_matches("red edge", &nir));
    }

    #[test]
    fn test_select_by_labels() {
        let img = image(
            5,
            &[Some("B2"), Some("B3"), Some("B4"), Some("B8"), Some("SCL")],
        );
        let a = select_bands(&img, &BandConfig::default());
        assert_eq!((a.green, a.nir, a.scl), (1, 3, Some(4)));
        assert_eq!(a.source, BandSource::Labels);
        assert!(!a.clamped);
    }

    #[test]
    fn test_b8a_is_not_nir() {
        let img = image(4, &[Some("B3"), Some("B8A"), Some("B4"), Some("B08")]);
        let a = select_bands(&img, &BandConfig::default());
        assert_eq!((a.green, a.nir), (0, 3));
    }

    #[test]
    fn test_heuristic_by_count() {
        let config = BandConfig::default();
        let a = select_bands(&image(4, &[]), &config);
        assert_eq!((a.green, a.nir, a.source), (1, 3, BandSource::BandCount));

        let a = select_bands(&image(13, &[]), &config);
        assert_eq!((a.green, a.nir), (2, 7));

        let a = select_bands(&image(6, &[]), &config);
        assert_eq!((a.green, a.nir), (1, 3));
    }

    #[test]
    fn test_scl_kept_when_pair_falls_back() {
        let img = image(5, &[None, None, Some("scene_classification"), None, None]);
        let a = select_bands(&img, &BandConfig::default());
        assert_eq!(a.source, BandSource::BandCount);
        assert_eq!((a.green, a.nir, a.scl), (1, 3, Some(2)));
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let a = select_bands(&image(3, &[]), &BandConfig::default());
        assert_eq!((a.green, a.nir), (0, 1));
        assert!(a.clamped);
    }
}
