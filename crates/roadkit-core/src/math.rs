//! Small vector helpers shared by the geometry crates

use glam::Vec3;

/// Two points closer than this are considered the same sample.
pub const POINT_EPSILON: f32 = 1e-4;

/// Project a vector onto the ground (XZ) plane.
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Ground-plane left direction for a travel direction.
///
/// Returns `Vec3::ZERO` when `forward` is vertical or zero, which callers
/// treat as a degenerate sample.
pub fn left_of(forward: Vec3) -> Vec3 {
    Vec3::Y.cross(flatten(forward)).normalize_or_zero()
}

/// Horizontal distance between two points.
pub fn distance_xz(a: Vec3, b: Vec3) -> f32 {
    flatten(a - b).length()
}

/// Intersect two rays' supporting lines in the XZ plane.
///
/// Returns the intersection on the first line with its height interpolated
/// between the two origins, or `None` when the lines are (nearly) parallel.
pub fn intersect_lines_xz(p1: Vec3, d1: Vec3, p2: Vec3, d2: Vec3) -> Option<Vec3> {
    let denom = d1.x * d2.z - d1.z * d2.x;
    if denom.abs() < 1e-6 {
        return None;
    }
    let dx = p2.x - p1.x;
    let dz = p2.z - p1.z;
    let s = (dx * d2.z - dz * d2.x) / denom;
    let hit = p1 + d1 * s;
    let total = distance_xz(p1, p2);
    let along = if total > POINT_EPSILON {
        (distance_xz(p1, hit) / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Some(Vec3::new(hit.x, p1.y + (p2.y - p1.y) * along, hit.z))
}

/// Closest point on segment `a..b` to `p` in the XZ plane.
///
/// Returns `(horizontal distance, parameter along the segment)`.
pub fn closest_on_segment_xz(p: Vec3, a: Vec3, b: Vec3) -> (f32, f32) {
    let ab = flatten(b - a);
    let len_sq = ab.length_squared();
    let t = if len_sq > 0.0 {
        (flatten(p - a).dot(ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = a + (b - a) * t;
    (distance_xz(p, closest), t)
}

/// Inverse of `a + (b - a) * t`, unclamped; zero when `a == b`.
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    let d = b - a;
    if d.abs() <= f32::EPSILON {
        0.0
    } else {
        (v - a) / d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_is_perpendicular_in_ground_plane() {
        let left = left_of(Vec3::new(1.0, 0.3, 0.0));
        assert!((left - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
        assert_eq!(left_of(Vec3::Y), Vec3::ZERO);
    }

    #[test]
    fn test_crossing_lines_intersect() {
        let hit = intersect_lines_xz(
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(5.0, 2.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
        )
        .unwrap();
        assert!((hit.x - 5.0).abs() < 1e-5);
        assert!(hit.z.abs() < 1e-5);
    }

    #[test]
    fn test_parallel_lines_do_not_intersect() {
        assert!(intersect_lines_xz(Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::X).is_none());
    }

    #[test]
    fn test_closest_point_clamps_to_segment() {
        let (d, t) = closest_on_segment_xz(Vec3::new(-3.0, 0.0, 4.0), Vec3::ZERO, Vec3::X);
        assert_eq!(t, 0.0);
        assert!((d - 5.0).abs() < 1e-5);
    }
}
