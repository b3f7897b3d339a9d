//! Arc-length sampling of a river centerline into a discretised path.

use bevy::math::Vec2;
use thiserror::Error;

use crate::{centerline::RiverCenterlineModel, course_config::BankSolverConfig};

/// Z distance covered by one Euler integration step.
const INTEGRATION_STEP: f64 = 1.0;

/// One sample of the river path. `center` stores world `(x, z)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub center: Vec2,
    pub tangent: Vec2,
    /// Unit vector perpendicular to `tangent`, pointing at the right bank.
    pub normal: Vec2,
    pub bank_dist: f32,
    pub arc_length: f32,
    /// Signed lateral offset of the suggested travel line.
    pub boat_x_offset: f32,
}

impl PathPoint {
    #[inline]
    pub fn z(&self) -> f32 {
        self.center.y
    }

    /// World position at a signed lateral `offset` from the centerline.
    #[inline]
    pub fn lateral(&self, offset: f32) -> Vec2 {
        self.center + self.normal * offset
    }

    fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.tangent.is_finite()
            && self.normal.is_finite()
            && self.bank_dist.is_finite()
            && self.arc_length.is_finite()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("centerline model produced a non-finite value at z={z}")]
    NonFinite { z: f32 },
    #[error("sampling step must be positive and finite, got {step}")]
    InvalidStep { step: f32 },
}

/// Sample the channel at `z` for travel in the sign of `direction`.
///
/// Bank distances are refined per side, then symmetrised by shifting the
/// center so both banks sit `bank_dist` away along the normal.
pub fn sample_at(
    model: &dyn RiverCenterlineModel,
    z: f32,
    direction: f32,
    solver: &BankSolverConfig,
) -> Result<PathPoint, GeometryError> {
    let center = Vec2::new(model.center_x(z), z);
    let slope = model.slope(z);
    let width = model.width(z);
    if !center.is_finite() || !slope.is_finite() || !width.is_finite() {
        return Err(GeometryError::NonFinite { z });
    }

    let sign = if direction < 0.0 { -1.0 } else { 1.0 };
    let tangent = (Vec2::new(slope, 1.0) * sign).normalize();
    let normal = Vec2::new(tangent.y, -tangent.x);

    let right = solve_bank_distance(model, center, normal, 1.0, width, solver);
    let left = solve_bank_distance(model, center, normal, -1.0, width, solver);

    let point = PathPoint {
        center: center + normal * (0.5 * (right - left)),
        tangent,
        normal,
        bank_dist: (0.5 * (left + right)).max(0.0),
        arc_length: 0.0,
        boat_x_offset: 0.0,
    };
    if !point.is_finite() {
        return Err(GeometryError::NonFinite { z });
    }
    Ok(point)
}

fn solve_bank_distance(
    model: &dyn RiverCenterlineModel,
    center: Vec2,
    normal: Vec2,
    side: f32,
    width: f32,
    solver: &BankSolverConfig,
) -> f32 {
    let mut dist = 0.5 * width;
    for _ in 0..solver.iterations {
        let candidate = center + normal * (side * dist);
        let outward = side * normal.x.signum();
        let bank_x = model.center_x(candidate.y) + outward * 0.5 * model.width(candidate.y);
        let residual = bank_x - candidate.x;
        if residual.abs() <= solver.tolerance || normal.x.abs() <= f32::EPSILON {
            break;
        }
        dist += residual / (side * normal.x);
    }
    dist
}

/// Walk the centerline from `z_start` to `z_end` (either direction) and emit
/// a point every `step` units of arc length, starting with arc length zero.
pub fn sample_river(
    model: &dyn RiverCenterlineModel,
    z_start: f32,
    z_end: f32,
    step: f32,
    solver: &BankSolverConfig,
) -> Result<Vec<PathPoint>, GeometryError> {
    if !(step > 0.0) || !step.is_finite() {
        return Err(GeometryError::InvalidStep { step });
    }
    if !z_start.is_finite() {
        return Err(GeometryError::NonFinite { z: z_start });
    }
    if !z_end.is_finite() {
        return Err(GeometryError::NonFinite { z: z_end });
    }

    let direction = if z_end >= z_start { 1.0 } else { -1.0 };
    let span = (z_end as f64 - z_start as f64).abs();
    let step = step as f64;

    let mut points = vec![sample_at(model, z_start, direction as f32, solver)?];
    let mut travelled = 0.0f64;
    let mut arc = 0.0f64;
    let mut emitted = 1u64;

    while travelled < span {
        let dz = (span - travelled).min(INTEGRATION_STEP);
        let z = z_start as f64 + direction * travelled;
        let slope = model.slope(z as f32) as f64;
        if !slope.is_finite() {
            return Err(GeometryError::NonFinite { z: z as f32 });
        }
        let ds = (1.0 + slope * slope).sqrt() * dz;

        let mut target = emitted as f64 * step;
        while arc + ds >= target {
            let fraction = (target - arc) / ds;
            let sample_z = z + direction * fraction * dz;
            let mut point = sample_at(model, sample_z as f32, direction as f32, solver)?;
            point.arc_length = target as f32;
            points.push(point);
            emitted += 1;
            target = emitted as f64 * step;
        }

        arc += ds;
        travelled += dz;
    }

    tracing::debug!(
        target: "river_course::geometry",
        points = points.len(),
        arc_length = arc,
        z_start,
        z_end,
        "geometry.river_sampled"
    );
    Ok(points)
}

#[inline]
fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
fn mix_vec(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a * (1.0 - t) + b * t
}

/// Linear blend of every numeric field. `t = 0` yields `a`, `t = 1` yields `b`.
pub fn interpolate_path_point(a: &PathPoint, b: &PathPoint, t: f32) -> PathPoint {
    PathPoint {
        center: mix_vec(a.center, b.center, t),
        tangent: mix_vec(a.tangent, b.tangent, t),
        normal: mix_vec(a.normal, b.normal, t),
        bank_dist: mix(a.bank_dist, b.bank_dist, t),
        arc_length: mix(a.arc_length, b.arc_length, t),
        boat_x_offset: mix(a.boat_x_offset, b.boat_x_offset, t),
    }
}

/// Resolve a fractional index, clamping to the ends of the path.
pub fn get_path_point(points: &[PathPoint], index: f32) -> Option<PathPoint> {
    let last = points.len().checked_sub(1)?;
    let clamped = if index.is_nan() {
        0.0
    } else {
        index.clamp(0.0, last as f32)
    };
    let lo = (clamped.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let t = clamped - lo as f32;
    if lo == hi || t <= 0.0 {
        return Some(points[lo]);
    }
    Some(interpolate_path_point(&points[lo], &points[hi], t))
}

/// Fractional index at which `selector` reaches `value`.
///
/// The selected sequence may be ascending or descending but must be
/// monotonic. Values beyond either end clamp to that end.
pub fn binary_search_path<F>(points: &[PathPoint], value: f32, selector: F) -> f32
where
    F: Fn(&PathPoint) -> f32,
{
    if points.len() < 2 {
        return 0.0;
    }
    let last = points.len() - 1;
    let ascending = selector(&points[last]) >= selector(&points[0]);
    let key = |point: &PathPoint| {
        if ascending {
            selector(point)
        } else {
            -selector(point)
        }
    };
    let target = if ascending { value } else { -value };

    if !(target > key(&points[0])) {
        return 0.0;
    }
    if target >= key(&points[last]) {
        return last as f32;
    }

    let (mut lo, mut hi) = (0usize, last);
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if key(&points[mid]) <= target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let a = key(&points[lo]);
    let b = key(&points[hi]);
    let t = if b > a { (target - a) / (b - a) } else { 0.0 };
    lo as f32 + t.clamp(0.0, 1.0)
}

/// Arc-length selector for [`binary_search_path`].
pub fn arc_length_of(point: &PathPoint) -> f32 {
    point.arc_length
}

/// World-Z selector for [`binary_search_path`].
pub fn world_z_of(point: &PathPoint) -> f32 {
    point.center.y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centerline::{MeanderingRiver, StraightChannel};

    fn solver() -> BankSolverConfig {
        BankSolverConfig::default()
    }

    #[test]
    fn straight_channel_yields_uniform_samples() {
        let channel = StraightChannel::new(0.0, 50.0);
        let points = sample_river(&channel, 0.0, 1000.0, 10.0, &solver()).unwrap();
        assert_eq!(points.len(), 101);
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.arc_length, i as f32 * 10.0);
            assert_eq!(point.bank_dist, 25.0);
            assert_eq!(point.center, Vec2::new(0.0, i as f32 * 10.0));
        }
    }

    #[test]
    fn reverse_sampling_walks_down_in_z() {
        let channel = StraightChannel::new(4.0, 30.0);
        let points = sample_river(&channel, 500.0, 0.0, 25.0, &solver()).unwrap();
        assert_eq!(points.len(), 21);
        assert_eq!(points[0].z(), 500.0);
        assert_eq!(points[20].z(), 0.0);
        assert_eq!(points[0].tangent, Vec2::new(0.0, -1.0));
        assert!(points.windows(2).all(|w| w[1].arc_length > w[0].arc_length));
        assert!(points.windows(2).all(|w| w[1].z() < w[0].z()));
    }

    #[test]
    fn frames_are_orthonormal_on_a_winding_river() {
        let river = MeanderingRiver::new(11);
        for i in 0..400 {
            let z = i as f32 * 5.1;
            let point = sample_at(&river, z, 1.0, &solver()).unwrap();
            assert!((point.tangent.length() - 1.0).abs() < 1e-6);
            assert!((point.normal.length() - 1.0).abs() < 1e-6);
            assert!(point.tangent.dot(point.normal).abs() < 1e-6);
            assert!(point.bank_dist > 0.0);
        }
    }

    #[test]
    fn arc_length_steps_track_requested_spacing() {
        let river = MeanderingRiver::new(2);
        let points = sample_river(&river, 0.0, 1500.0, 4.0, &solver()).unwrap();
        assert!(points.len() > 300);
        for pair in points.windows(2) {
            let delta = pair[1].arc_length - pair[0].arc_length;
            assert!((delta - 4.0).abs() < 1e-3);
            let chord = pair[1].center.distance(pair[0].center);
            // Symmetrisation shifts centers sideways, so only loosely bound it.
            assert!(chord > 0.0 && chord < 12.0, "chord {chord}");
        }
    }

    #[test]
    fn banks_are_symmetric_after_refinement() {
        let river = MeanderingRiver::new(21);
        let cfg = BankSolverConfig {
            iterations: 12,
            tolerance: 1e-4,
        };
        for z in [50.0f32, 333.0, 812.0] {
            let point = sample_at(&river, z, 1.0, &cfg).unwrap();
            for side in [-1.0f32, 1.0] {
                let bank = point.lateral(side * point.bank_dist);
                let expected = river.center_x(bank.y) + side * 0.5 * river.width(bank.y);
                assert!(
                    (bank.x - expected).abs() < 0.75,
                    "bank miss {} at z={z}",
                    bank.x - expected
                );
            }
        }
    }

    #[test]
    fn non_finite_model_fails_at_construction() {
        struct Broken;
        impl RiverCenterlineModel for Broken {
            fn center_x(&self, z: f32) -> f32 {
                if z > 40.0 {
                    f32::NAN
                } else {
                    0.0
                }
            }
            fn width(&self, _z: f32) -> f32 {
                20.0
            }
            fn slope(&self, _z: f32) -> f32 {
                0.0
            }
            fn terrain_height(&self, _x: f32, _z: f32) -> f32 {
                0.0
            }
        }
        let err = sample_river(&Broken, 0.0, 100.0, 5.0, &solver()).unwrap_err();
        assert!(matches!(err, GeometryError::NonFinite { .. }));

        let err = sample_river(&Broken, 0.0, 10.0, 0.0, &solver()).unwrap_err();
        assert_eq!(err, GeometryError::InvalidStep { step: 0.0 });
    }

    #[test]
    fn interpolation_hits_endpoints_exactly() {
        let river = MeanderingRiver::new(8);
        let points = sample_river(&river, 0.0, 100.0, 3.0, &solver()).unwrap();
        let (a, b) = (points[4], points[5]);
        assert_eq!(interpolate_path_point(&a, &b, 0.0), a);
        assert_eq!(interpolate_path_point(&a, &b, 1.0), b);
        let mid = interpolate_path_point(&a, &b, 0.5);
        assert!((mid.arc_length - 0.5 * (a.arc_length + b.arc_length)).abs() < 1e-4);
    }

    #[test]
    fn path_point_lookup_clamps_and_blends() {
        let channel = StraightChannel::new(0.0, 20.0);
        let points = sample_river(&channel, 0.0, 100.0, 10.0, &solver()).unwrap();
        assert_eq!(get_path_point(&points, -3.0), Some(points[0]));
        assert_eq!(get_path_point(&points, 99.0), Some(points[10]));
        let blended = get_path_point(&points, 2.5).unwrap();
        assert_eq!(blended.arc_length, 25.0);
        assert!(get_path_point(&[], 1.0).is_none());
    }

    #[test]
    fn binary_search_inverts_monotonic_selectors() {
        let river = MeanderingRiver::new(4);
        let points = sample_river(&river, 0.0, 800.0, 7.0, &solver()).unwrap();
        for (i, point) in points.iter().enumerate() {
            let found = binary_search_path(&points, point.arc_length, arc_length_of);
            assert!((found - i as f32).abs() < 1e-4, "index {i} -> {found}");
        }

        let reversed = sample_river(&river, 800.0, 0.0, 7.0, &solver()).unwrap();
        let z = reversed[10].z();
        let found = binary_search_path(&reversed, z, world_z_of);
        assert!((found - 10.0).abs() < 1e-3);

        let halfway = binary_search_path(&points, 3.5, arc_length_of);
        assert!((halfway - 0.5).abs() < 1e-5);
    }

    #[test]
    fn binary_search_handles_degenerate_inputs() {
        assert_eq!(binary_search_path(&[], 5.0, arc_length_of), 0.0);
        let channel = StraightChannel::new(0.0, 20.0);
        let single = vec![sample_at(&channel, 0.0, 1.0, &solver()).unwrap()];
        assert_eq!(binary_search_path(&single, 5.0, arc_length_of), 0.0);
    }
}
