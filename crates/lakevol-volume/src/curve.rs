//! Volume curve construction.
//!
//! The DEM is swept upward in fixed elevation steps. At level `L` the flooded
//! area is the number of valid samples strictly below `L` times the pixel area,
//! and the stored volume is `Σ (L - h) * pixel_area` over those samples. With
//! the samples sorted once and a prefix sum precomputed, each level costs one
//! binary search.
//!
//! DEMs often miss the true basin floor (water surfaces captured at survey
//! time, fill artifacts). Three heuristics, tried in order, extend the curve
//! below the DEM minimum:
//!
//! 1. A supplied reference floor well below the DEM minimum: the volume of a
//!    frustum `cone_factor * first_area * depth` is added to every point.
//! 2. A flat floor artifact, detected as the first level above
//!    `detection_area_ha` that is either a sharp jump or the first wet level:
//!    a floor is synthesized `synthetic_floor_depth` below it.
//! 3. Otherwise a zero anchor just below the DEM minimum.

use crate::error::CurveError;
use lakevol_common::units::{ha_to_m2, m2_to_ha};
use lakevol_common::{CurveConfig, UnitConfig};
use lakevol_raster::{is_geographic_crs, ElevationRaster};
use rayon::prelude::*;
use tracing::{debug, info, warn};

// ============================================================================
// Curve types
// ============================================================================

/// One point of the elevation/area/volume relation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurvePoint {
    /// Water surface elevation (m).
    pub elevation: f64,
    /// Flooded area (ha).
    pub area_ha: f64,
    /// Stored volume (m³).
    pub volume_m3: f64,
}

impl CurvePoint {
    /// Create a point.
    pub const fn new(elevation: f64, area_ha: f64, volume_m3: f64) -> Self {
        Self {
            elevation,
            area_ha,
            volume_m3,
        }
    }

    /// The `(elevation, 0, 0)` anchor.
    pub const fn zero(elevation: f64) -> Self {
        Self::new(elevation, 0.0, 0.0)
    }
}

/// Whether a curve carries data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CurveStatus {
    /// Built from at least one valid sample.
    Built,
    /// No valid DEM samples; every lookup yields zero.
    NoData,
}

/// How the curve was extended below the DEM minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FloorModel {
    /// A supplied reference floor below the DEM minimum.
    Reference {
        /// Reference floor elevation.
        elevation: f64,
        /// Volume added to every swept point (m³).
        offset_m3: f64,
    },
    /// A floor synthesized below a detected floor artifact.
    Synthesized {
        /// Level where the artifact was detected.
        detected_elevation: f64,
        /// Synthesized floor elevation.
        floor_elevation: f64,
        /// Volume added at and above the detected level (m³).
        offset_m3: f64,
    },
    /// Plain zero anchor, no extrapolation.
    ZeroAnchor {
        /// Anchor elevation.
        elevation: f64,
    },
    /// Curve was not swept from a DEM.
    None,
}

impl FloorModel {
    /// Volume added by the floor model.
    pub fn offset_m3(&self) -> f64 {
        match *self {
            FloorModel::Reference { offset_m3, .. } | FloorModel::Synthesized { offset_m3, .. } => offset_m3,
            FloorModel::ZeroAnchor { .. } | FloorModel::None => 0.0,
        }
    }
}

/// One row of the exported curve table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveRow {
    /// Elevation (m).
    pub elevation: f64,
    /// Area (ha).
    pub area_ha: f64,
    /// Volume (m³).
    pub volume_m3: f64,
    /// Volume in the alternate unit (TMC by default).
    pub volume_tmc: f64,
}

/// Monotonic elevation/area/volume curve.
///
/// `points[0]` is the floor anchor. For swept curves `points[1..]` lie on the
/// fixed step grid starting at the DEM minimum. Elevation strictly increases;
/// area and volume never decrease.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VolumeCurve {
    points: Vec<CurvePoint>,
    step: f64,
    min_elevation: f64,
    max_elevation: f64,
    max_volume_m3: f64,
    floor: FloorModel,
    status: CurveStatus,
}

impl VolumeCurve {
    /// All-zero curve for a DEM without valid samples.
    pub fn degenerate(step: f64) -> Self {
        Self {
            points: Vec::new(),
            step,
            min_elevation: 0.0,
            max_elevation: 0.0,
            max_volume_m3: 0.0,
            floor: FloorModel::None,
            status: CurveStatus::NoData,
        }
    }

    /// Build a curve from externally tabulated points.
    ///
    /// Points must be finite, strictly increasing in elevation and
    /// nondecreasing in area and volume. `step` is informational.
    pub fn from_points(points: Vec<CurvePoint>, step: f64) -> Result<Self, CurveError> {
        let (first, last) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(CurveError::Empty),
        };

        for (index, p) in points.iter().enumerate() {
            if !(p.elevation.is_finite() && p.area_ha.is_finite() && p.volume_m3.is_finite()) {
                return Err(CurveError::NotFinite { index });
            }
        }
        for (index, pair) in points.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let reason = if b.elevation <= a.elevation {
                Some("elevation must strictly increase")
            } else if b.area_ha < a.area_ha {
                Some("area decreased")
            } else if b.volume_m3 < a.volume_m3 {
                Some("volume decreased")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(CurveError::NotMonotonic {
                    index: index + 1,
                    reason,
                });
            }
        }

        Ok(Self {
            min_elevation: first.elevation,
            max_elevation: last.elevation,
            max_volume_m3: last.volume_m3,
            points,
            step,
            floor: FloorModel::None,
            status: CurveStatus::Built,
        })
    }

    /// Curve points, anchor first.
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Elevation step of the sweep.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Lowest valid DEM elevation.
    pub fn min_elevation(&self) -> f64 {
        self.min_elevation
    }

    /// Top elevation of the curve.
    ///
    /// For swept curves this is the first level at or above the highest valid
    /// DEM sample, so every sample is counted in `max_area_ha`.
    pub fn max_elevation(&self) -> f64 {
        self.max_elevation
    }

    /// Volume at the top of the curve (m³).
    pub fn max_volume_m3(&self) -> f64 {
        self.max_volume_m3
    }

    /// Area at the top of the curve (ha).
    pub fn max_area_ha(&self) -> f64 {
        self.points.last().map(|p| p.area_ha).unwrap_or(0.0)
    }

    /// Floor model applied.
    pub fn floor(&self) -> &FloorModel {
        &self.floor
    }

    /// Build status.
    pub fn status(&self) -> CurveStatus {
        self.status
    }

    /// Whether the curve has no data.
    pub fn is_degenerate(&self) -> bool {
        self.status == CurveStatus::NoData || self.points.is_empty()
    }

    /// Table rows with the alternate volume unit.
    pub fn rows(&self, units: &UnitConfig) -> Vec<CurveRow> {
        self.points
            .iter()
            .map(|p| CurveRow {
                elevation: p.elevation,
                area_ha: p.area_ha,
                volume_m3: p.volume_m3,
                volume_tmc: units.to_alternate(p.volume_m3),
            })
            .collect()
    }
}

// ============================================================================
// Building
// ============================================================================

/// Build a curve from every valid sample of a DEM.
///
/// `reference_floor` is an optional known basin-floor elevation.
pub fn build_curve(
    dem: &ElevationRaster,
    reference_floor: Option<f64>,
    config: &CurveConfig,
) -> VolumeCurve {
    if let Some(crs) = dem.crs() {
        if is_geographic_crs(crs) {
            warn!(crs, "DEM is in a geographic CRS, pixel areas are not metric");
        }
    }
    let samples: Vec<f64> = dem.valid_samples().map(f64::from).collect();
    build_curve_from_samples(samples, dem.pixel_area(), reference_floor, config)
}

/// Build a curve from raw elevation samples.
///
/// Samples must already be filtered for validity.
pub fn build_curve_from_samples(
    mut samples: Vec<f64>,
    pixel_area_m2: f64,
    reference_floor: Option<f64>,
    config: &CurveConfig,
) -> VolumeCurve {
    samples.retain(|v| v.is_finite());
    if samples.is_empty() {
        warn!("no valid DEM samples, volume curve is empty");
        return VolumeCurve::degenerate(config.step);
    }

    samples.par_sort_unstable_by(f64::total_cmp);
    let swept = sweep(&samples, pixel_area_m2, config.step);
    let min_elevation = samples[0];
    let highest_sample = samples[samples.len() - 1];

    let (anchor, floor, swept) = apply_floor(swept, min_elevation, reference_floor, config);

    let mut points = Vec::with_capacity(swept.len() + 1);
    points.push(anchor);
    points.extend(swept);

    let (max_elevation, max_volume_m3) = points
        .last()
        .map(|p| (p.elevation, p.volume_m3))
        .unwrap_or((highest_sample, 0.0));
    debug!(
        samples = samples.len(),
        levels = points.len() - 1,
        min_elevation,
        highest_sample,
        max_elevation,
        max_volume_m3,
        "volume curve built"
    );

    VolumeCurve {
        points,
        step: config.step,
        min_elevation,
        max_elevation,
        max_volume_m3,
        floor,
        status: CurveStatus::Built,
    }
}

/// Sweep sorted samples at `min + i * step`.
fn sweep(sorted: &[f64], pixel_area_m2: f64, step: f64) -> Vec<CurvePoint> {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let mut prefix = Vec::with_capacity(sorted.len() + 1);
    prefix.push(0.0);
    let mut running = 0.0;
    for &h in sorted {
        running += h;
        prefix.push(running);
    }

    let levels = ((max - min) / step + 1.0).ceil().max(1.0) as usize;
    (0..levels)
        .into_par_iter()
        .map(|i| {
            let level = min + i as f64 * step;
            let below = sorted.partition_point(|&h| h < level);
            let area_m2 = below as f64 * pixel_area_m2;
            let volume_m3 = (level * below as f64 - prefix[below]) * pixel_area_m2;
            CurvePoint::new(level, m2_to_ha(area_m2), volume_m3.max(0.0))
        })
        .collect()
}

fn add_offset(points: &mut [CurvePoint], offset_m3: f64) {
    for p in points {
        p.volume_m3 += offset_m3;
    }
}

/// Pick the anchor and floor model, adjusting swept volumes in place.
fn apply_floor(
    mut swept: Vec<CurvePoint>,
    min_elevation: f64,
    reference_floor: Option<f64>,
    config: &CurveConfig,
) -> (CurvePoint, FloorModel, Vec<CurvePoint>) {
    // 1. Known floor well below the DEM
    if let Some(reference) = reference_floor.filter(|r| *r < min_elevation - config.floor_epsilon) {
        let first_area_m2 = swept
            .iter()
            .find(|p| p.area_ha > 0.0)
            .map(|p| ha_to_m2(p.area_ha))
            .unwrap_or(0.0);
        let offset_m3 = config.cone_factor * first_area_m2 * (min_elevation - reference);
        add_offset(&mut swept, offset_m3);
        info!(reference, offset_m3, "extrapolating to reference floor");
        return (
            CurvePoint::zero(reference),
            FloorModel::Reference {
                elevation: reference,
                offset_m3,
            },
            swept,
        );
    }

    // 2. Flat floor artifact
    if let Some(j) = swept.iter().position(|p| p.area_ha > config.detection_area_ha) {
        let current = swept[j].area_ha;
        let previous = if j == 0 { None } else { Some(swept[j - 1].area_ha) };
        let sharp_jump = previous
            .map(|prev| prev < config.jump_low_area_ha && current > config.jump_high_area_ha)
            .unwrap_or(false);
        let first_wet = previous.map(|prev| prev == 0.0).unwrap_or(true);

        if sharp_jump || first_wet {
            let detected_elevation = swept[j].elevation;
            let floor_elevation = detected_elevation - config.synthetic_floor_depth;
            let offset_m3 = config.cone_factor * ha_to_m2(current) * config.synthetic_floor_depth;
            add_offset(&mut swept[j..], offset_m3);

            let anchor_elevation = if floor_elevation < min_elevation {
                floor_elevation
            } else {
                min_elevation - config.floor_epsilon
            };
            info!(
                detected_elevation,
                floor_elevation,
                offset_m3,
                sharp_jump,
                "synthesized basin floor below DEM artifact"
            );
            return (
                CurvePoint::zero(anchor_elevation),
                FloorModel::Synthesized {
                    detected_elevation,
                    floor_elevation,
                    offset_m3,
                },
                swept,
            );
        }
    }

    // 3. Plain anchor
    let elevation = min_elevation - config.floor_epsilon;
    (CurvePoint::zero(elevation), FloorModel::ZeroAnchor { elevation }, swept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> CurveConfig {
        CurveConfig::default()
    }

    /// Check every swept point against the unadjusted sweep: points at or
    /// above `from` carry `offset`, the rest are untouched. Returns how many
    /// points were shifted.
    fn assert_offset_from(curve: &VolumeCurve, mut samples: Vec<f64>, pixel: f64, from: f64, offset: f64) -> usize {
        samples.sort_by(f64::total_cmp);
        let plain = sweep(&samples, pixel, config().step);
        let swept = &curve.points()[1..];
        assert_eq!(swept.len(), plain.len());

        let mut shifted = 0;
        for (p, q) in swept.iter().zip(&plain) {
            assert_eq!(p.elevation, q.elevation);
            assert_eq!(p.area_ha, q.area_ha);
            if p.elevation >= from - 1e-9 {
                assert_relative_eq!(p.volume_m3, q.volume_m3 + offset, epsilon = 1e-6);
                shifted += 1;
            } else {
                assert_eq!(p.volume_m3, q.volume_m3);
            }
        }
        shifted
    }

    #[test]
    fn test_sweep_counts_strictly_below() {
        // Four 1 m² pixels at 1.0, 1.0, 1.2, 1.5
        let curve = build_curve_from_samples(vec![1.0, 1.0, 1.2, 1.5], 1.0, None, &config());
        let swept = &curve.points()[1..];
        assert_eq!(swept.len(), 6);
        assert_eq!(swept[0].area_ha, 0.0);
        assert_eq!(swept[0].volume_m3, 0.0);
        // L = 1.1: two samples below
        assert_relative_eq!(swept[1].area_ha, 2.0 / 10_000.0);
        assert_relative_eq!(swept[1].volume_m3, 0.2, epsilon = 1e-9);
        // L = 1.5: three samples below (1.5 itself is not)
        assert_relative_eq!(swept[5].elevation, 1.5, epsilon = 1e-9);
        assert_relative_eq!(swept[5].area_ha, 3.0 / 10_000.0);
        assert_relative_eq!(swept[5].volume_m3, 0.5 + 0.5 + 0.3, epsilon = 1e-9);
        assert_relative_eq!(curve.max_volume_m3(), 1.3, epsilon = 1e-9);
    }

    #[test]
    fn test_level_grid() {
        let curve = build_curve_from_samples(vec![10.0, 10.05, 11.0], 1.0, None, &config());
        assert_eq!(curve.min_elevation(), 10.0);
        assert_eq!(curve.max_elevation(), 11.0);
        let swept = &curve.points()[1..];
        assert_eq!(swept.len(), 11);
        for (i, p) in swept.iter().enumerate() {
            assert_relative_eq!(p.elevation, 10.0 + i as f64 * 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_max_elevation_is_top_level() {
        // Highest sample falls between grid levels
        let curve = build_curve_from_samples(vec![10.0, 10.0, 11.05], 100.0, None, &config());
        let top = curve.points()[curve.points().len() - 1];
        assert_relative_eq!(curve.max_elevation(), 11.1, epsilon = 1e-9);
        assert_eq!(curve.max_elevation(), top.elevation);
        assert_relative_eq!(curve.max_volume_m3(), 225.0, epsilon = 1e-9);
        assert_eq!(curve.volume_at_elevation(curve.max_elevation()), curve.max_volume_m3());
        assert!(curve.volume_at_elevation(11.05) < curve.max_volume_m3());
    }

    #[test]
    fn test_single_elevation() {
        let curve = build_curve_from_samples(vec![5.0; 10], 100.0, None, &config());
        assert_eq!(curve.points().len(), 2);
        assert_eq!(curve.max_volume_m3(), 0.0);
        assert_eq!(curve.floor(), &FloorModel::ZeroAnchor { elevation: 5.0 - 0.1 });
    }

    #[test]
    fn test_empty_is_degenerate() {
        let curve = build_curve_from_samples(Vec::new(), 100.0, Some(3.0), &config());
        assert_eq!(curve.status(), CurveStatus::NoData);
        assert!(curve.is_degenerate());
        assert!(curve.points().is_empty());
        assert_eq!(curve.max_volume_m3(), 0.0);
    }

    #[test]
    fn test_reference_floor_offset() {
        // 10,000 pixels of 100 m² at 10 m (100 ha), a strip of higher ground
        let mut samples = vec![10.0; 10_000];
        samples.extend(std::iter::repeat(20.0).take(100));
        let curve = build_curve_from_samples(samples.clone(), 100.0, Some(8.0), &config());

        let expected = 1.0 / 3.0 * 1_000_000.0 * 2.0;
        match curve.floor() {
            FloorModel::Reference { elevation, offset_m3 } => {
                assert_eq!(*elevation, 8.0);
                assert_relative_eq!(*offset_m3, 666_666.666_666_7, epsilon = 1e-3);
            }
            other => panic!("unexpected floor model {:?}", other),
        }
        assert_eq!(curve.points()[0], CurvePoint::zero(8.0));
        assert_relative_eq!(curve.points()[1].volume_m3, expected, epsilon = 1e-6);
        assert_relative_eq!(curve.points()[2].volume_m3, expected + 0.1 * 1_000_000.0, max_relative = 1e-9);

        // Every point from the DEM minimum up carries the offset
        let shifted = assert_offset_from(&curve, samples, 100.0, 10.0, curve.floor().offset_m3());
        assert_eq!(shifted, curve.points().len() - 1);
    }

    #[test]
    fn test_reference_too_close_is_ignored() {
        let curve = build_curve_from_samples(vec![10.0, 12.0], 1.0, Some(9.95), &config());
        assert!(matches!(curve.floor(), FloorModel::ZeroAnchor { .. }));
    }

    #[test]
    fn test_first_wet_level_synthesizes_floor() {
        // 2,000 pixels of 100 m² at 50 m: 20 ha appears at the first wet level
        let mut samples = vec![50.0; 2_000];
        samples.extend(std::iter::repeat(60.0).take(100));
        let curve = build_curve_from_samples(samples.clone(), 100.0, None, &config());

        match *curve.floor() {
            FloorModel::Synthesized {
                detected_elevation,
                floor_elevation,
                offset_m3,
            } => {
                assert_relative_eq!(detected_elevation, 50.1, epsilon = 1e-9);
                assert_relative_eq!(floor_elevation, 45.1, epsilon = 1e-9);
                assert_relative_eq!(offset_m3, 1.0 / 3.0 * 200_000.0 * 5.0, epsilon = 1e-6);
            }
            other => panic!("unexpected floor model {:?}", other),
        }
        assert_relative_eq!(curve.points()[0].elevation, 45.1, epsilon = 1e-9);
        // The level below detection is untouched, everything above is shifted
        assert_eq!(curve.points()[1].volume_m3, 0.0);
        let shifted = assert_offset_from(&curve, samples, 100.0, 50.1, curve.floor().offset_m3());
        assert_eq!(shifted, curve.points().len() - 2);
    }

    #[test]
    fn test_sharp_jump_synthesizes_floor() {
        // 3 ha of deep pixels, then a 60 ha flat at 101 m
        let mut samples = vec![100.0; 300];
        samples.extend(std::iter::repeat(101.0).take(6_000));
        samples.extend(std::iter::repeat(110.0).take(10));
        let curve = build_curve_from_samples(samples.clone(), 100.0, None, &config());

        let detected = match *curve.floor() {
            FloorModel::Synthesized {
                detected_elevation,
                floor_elevation,
                offset_m3,
            } => {
                assert_relative_eq!(detected_elevation, 101.1, epsilon = 1e-9);
                assert_relative_eq!(floor_elevation, 96.1, epsilon = 1e-9);
                assert_relative_eq!(offset_m3, 1.0 / 3.0 * 630_000.0 * 5.0, max_relative = 1e-9);
                detected_elevation
            }
            other => panic!("unexpected floor model {:?}", other),
        };
        // Floor lies below the sweep, so the anchor sits on it
        assert_relative_eq!(curve.points()[0].elevation, 96.1, epsilon = 1e-9);

        // The deep pocket between the DEM minimum and the jump keeps its plain
        // volumes; the flat and everything above it carry the offset
        let pocket = &curve.points()[2..12];
        assert!(pocket.iter().all(|p| p.area_ha == 3.0 && p.volume_m3 > 0.0));
        let shifted = assert_offset_from(&curve, samples, 100.0, detected, curve.floor().offset_m3());
        assert_eq!(shifted, curve.points().len() - 12);
    }

    #[test]
    fn test_gradual_basin_uses_plain_anchor() {
        // Elevation rises 0.05 m per diagonal; area grows smoothly past 10 ha
        let mut samples = Vec::new();
        for r in 0..100 {
            for c in 0..100 {
                samples.push(100.0 + (r + c) as f64 * 0.05);
            }
        }
        let curve = build_curve_from_samples(samples, 100.0, None, &config());
        assert_eq!(curve.floor(), &FloorModel::ZeroAnchor { elevation: 100.0 - 0.1 });
    }

    #[test]
    fn test_monotonic_invariants() {
        let mut samples = Vec::new();
        for r in 0..50 {
            for c in 0..50 {
                let dr = r as f64 - 25.0;
                let dc = c as f64 - 25.0;
                samples.push(200.0 + (dr * dr + dc * dc).sqrt() * 0.3);
            }
        }
        let curve = build_curve_from_samples(samples, 900.0, Some(190.0), &config());
        for pair in curve.points().windows(2) {
            assert!(pair[1].elevation > pair[0].elevation);
            assert!(pair[1].area_ha >= pair[0].area_ha);
            assert!(pair[1].volume_m3 >= pair[0].volume_m3);
        }
    }

    #[test]
    fn test_from_points_validation() {
        assert_eq!(VolumeCurve::from_points(Vec::new(), 1.0), Err(CurveError::Empty));
        let bad = vec![CurvePoint::new(1.0, 0.0, 0.0), CurvePoint::new(1.0, 1.0, 1.0)];
        assert!(matches!(
            VolumeCurve::from_points(bad, 1.0),
            Err(CurveError::NotMonotonic { index: 1, .. })
        ));
        let bad = vec![CurvePoint::new(1.0, 2.0, 0.0), CurvePoint::new(2.0, 1.0, 1.0)];
        assert!(matches!(
            VolumeCurve::from_points(bad, 1.0),
            Err(CurveError::NotMonotonic { reason: "area decreased", .. })
        ));
    }

    #[test]
    fn test_table_rows() {
        let curve = build_curve_from_samples(vec![10.0, 10.0, 11.0], 1.0, None, &config());
        let rows = curve.rows(&UnitConfig::default());
        assert_eq!(rows.len(), curve.points().len());
        // L = 10.1 with two pixels below: 0.2 m³
        assert_relative_eq!(rows[2].volume_m3, 0.2, epsilon = 1e-9);
        assert_relative_eq!(rows[2].volume_tmc * 28_316_846.592, 0.2, epsilon = 1e-9);
    }
}
