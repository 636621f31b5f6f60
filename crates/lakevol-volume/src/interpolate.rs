//! Curve inversion: elevation to volume and area to elevation/volume.

use crate::curve::{CurvePoint, CurveStatus, VolumeCurve};
use tracing::warn;

/// Result of looking up an observed area on a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaLookup {
    /// Interpolated water surface elevation (m).
    pub elevation: f64,
    /// Interpolated volume (m³).
    pub volume_m3: f64,
    /// The area exceeded the curve and the result was clamped to its top.
    pub over_range: bool,
    /// Status of the curve used.
    pub status: CurveStatus,
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl VolumeCurve {
    /// Volume stored at a water surface elevation.
    ///
    /// Zero at or below the first curve point, the maximum volume at or above
    /// [`max_elevation`](VolumeCurve::max_elevation), linear in between.
    pub fn volume_at_elevation(&self, elevation: f64) -> f64 {
        let first = match self.points().first() {
            Some(first) if !self.is_degenerate() => *first,
            _ => return 0.0,
        };
        let points = self.points();

        if elevation.is_nan() || elevation <= first.elevation {
            return 0.0;
        }
        if elevation >= self.max_elevation() {
            return self.max_volume_m3();
        }

        let j = points.partition_point(|p| p.elevation < elevation);
        let (lo, hi) = (points[j - 1], points[j]);
        let t = (elevation - lo.elevation) / (hi.elevation - lo.elevation);
        lerp(lo.volume_m3, hi.volume_m3, t)
    }

    /// Elevation and volume at which the curve reaches `area_ha`.
    ///
    /// Uses the first point whose area reaches the target, so flat stretches of
    /// the curve resolve to their lowest elevation. Below the first point's
    /// area a virtual `(area 0, volume 0)` point sits `virtual_floor_depth`
    /// below the first elevation. Above the largest area the result is clamped
    /// to `(max_elevation, max_volume)` and flagged as over range.
    pub fn lookup_area(&self, area_ha: f64, virtual_floor_depth: f64) -> AreaLookup {
        let points = self.points();
        let first = match points.first() {
            Some(first) if !self.is_degenerate() => *first,
            _ => {
                return AreaLookup {
                    elevation: 0.0,
                    volume_m3: 0.0,
                    over_range: false,
                    status: CurveStatus::NoData,
                }
            }
        };
        let target = if area_ha.is_nan() { 0.0 } else { area_ha.max(0.0) };

        let max_area = self.max_area_ha();
        if target > max_area {
            warn!(
                area_ha = target,
                max_area_ha = max_area,
                "observed area exceeds the volume curve, clamping to its top"
            );
            return AreaLookup {
                elevation: self.max_elevation(),
                volume_m3: self.max_volume_m3(),
                over_range: true,
                status: self.status(),
            };
        }

        let j = points.partition_point(|p| p.area_ha < target);
        let hit = points[j];
        let (elevation, volume_m3) = if hit.area_ha == target {
            (hit.elevation, hit.volume_m3)
        } else {
            let lo = if j == 0 {
                CurvePoint::zero(first.elevation - virtual_floor_depth)
            } else {
                points[j - 1]
            };
            let t = (target - lo.area_ha) / (hit.area_ha - lo.area_ha);
            (lerp(lo.elevation, hit.elevation, t), lerp(lo.volume_m3, hit.volume_m3, t))
        };

        AreaLookup {
            elevation,
            volume_m3,
            over_range: false,
            status: self.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::build_curve_from_samples;
    use approx::assert_relative_eq;
    use lakevol_common::CurveConfig;

    fn table() -> VolumeCurve {
        VolumeCurve::from_points(
            vec![
                CurvePoint::new(99.0, 0.0, 0.0),
                CurvePoint::new(100.0, 2.0, 10_000.0),
                CurvePoint::new(101.0, 4.0, 40_000.0),
                CurvePoint::new(102.0, 4.0, 80_000.0),
                CurvePoint::new(103.0, 10.0, 150_000.0),
            ],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_volume_at_elevation() {
        let curve = table();
        assert_eq!(curve.volume_at_elevation(90.0), 0.0);
        assert_eq!(curve.volume_at_elevation(99.0), 0.0);
        assert_relative_eq!(curve.volume_at_elevation(100.5), 25_000.0);
        assert_eq!(curve.volume_at_elevation(103.0), 150_000.0);
        assert_eq!(curve.volume_at_elevation(500.0), 150_000.0);
    }

    #[test]
    fn test_over_range_pair_matches_elevation_lookup() {
        let curve = build_curve_from_samples(vec![10.0, 10.0, 11.05], 100.0, None, &CurveConfig::default());
        let hit = curve.lookup_area(1.0, 1.0);
        assert!(hit.over_range);
        assert_eq!(hit.elevation, curve.max_elevation());
        assert_eq!(curve.volume_at_elevation(hit.elevation), hit.volume_m3);
    }

    #[test]
    fn test_lookup_exact_and_interpolated() {
        let curve = table();
        let hit = curve.lookup_area(2.0, 1.0);
        assert_eq!((hit.elevation, hit.volume_m3, hit.over_range), (100.0, 10_000.0, false));

        let mid = curve.lookup_area(3.0, 1.0);
        assert_relative_eq!(mid.elevation, 100.5);
        assert_relative_eq!(mid.volume_m3, 25_000.0);
    }

    #[test]
    fn test_plateau_resolves_lowest() {
        let hit = table().lookup_area(4.0, 1.0);
        assert_eq!(hit.elevation, 101.0);
        assert_eq!(hit.volume_m3, 40_000.0);
    }

    #[test]
    fn test_over_range_clamps() {
        let hit = table().lookup_area(12.0, 1.0);
        assert!(hit.over_range);
        assert_eq!(hit.elevation, 103.0);
        assert_eq!(hit.volume_m3, 150_000.0);
        assert_eq!(hit.status, CurveStatus::Built);
    }

    #[test]
    fn test_virtual_floor_below_first_area() {
        let curve = VolumeCurve::from_points(
            vec![CurvePoint::new(50.0, 4.0, 8_000.0), CurvePoint::new(51.0, 8.0, 20_000.0)],
            1.0,
        )
        .unwrap();
        let hit = curve.lookup_area(1.0, 1.0);
        assert_relative_eq!(hit.elevation, 49.25);
        assert_relative_eq!(hit.volume_m3, 2_000.0);
    }

    #[test]
    fn test_zero_area_hits_anchor() {
        let hit = table().lookup_area(0.0, 1.0);
        assert_eq!((hit.elevation, hit.volume_m3), (99.0, 0.0));
    }

    #[test]
    fn test_degenerate_curve() {
        let curve = VolumeCurve::degenerate(0.1);
        assert_eq!(curve.volume_at_elevation(10.0), 0.0);
        let hit = curve.lookup_area(5.0, 1.0);
        assert_eq!(hit.status, CurveStatus::NoData);
        assert_eq!((hit.elevation, hit.volume_m3, hit.over_range), (0.0, 0.0, false));
    }

    #[test]
    fn test_round_trip_on_swept_curve() {
        let mut samples = Vec::new();
        for r in 0..60 {
            for c in 0..60 {
                let dr = r as f64 - 30.0;
                let dc = c as f64 - 30.0;
                samples.push(300.0 + (dr * dr + dc * dc).sqrt() * 0.2);
            }
        }
        let config = CurveConfig::default();
        let curve = build_curve_from_samples(samples, 400.0, None, &config);

        let points = curve.points();
        for (i, p) in points.iter().enumerate() {
            // First occurrence of each area only
            if i > 0 && points[i - 1].area_ha == p.area_ha {
                continue;
            }
            let hit = curve.lookup_area(p.area_ha, config.virtual_floor_depth);
            assert_relative_eq!(hit.volume_m3, p.volume_m3, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_clamp_law_on_swept_curve() {
        let samples: Vec<f64> = (0..1_000).map(|i| 20.0 + (i % 97) as f64 * 0.13).collect();
        let curve = build_curve_from_samples(samples, 25.0, Some(15.0), &CurveConfig::default());
        let first = curve.points()[0].elevation;
        let last = curve.points()[curve.points().len() - 1].elevation;

        assert_eq!(curve.volume_at_elevation(first), 0.0);
        assert_eq!(curve.volume_at_elevation(first - 3.0), 0.0);
        assert_eq!(curve.volume_at_elevation(last), curve.max_volume_m3());
        assert_eq!(curve.volume_at_elevation(last + 3.0), curve.max_volume_m3());
    }
}
