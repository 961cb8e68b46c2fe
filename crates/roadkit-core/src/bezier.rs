//! Pure cubic Bézier math.
//!
//! A road segment is the cubic between two anchors, using each anchor's
//! tangent offset as the inner control handle. Everything here works on
//! plain `Vec3`s so it can be tested without a curve.

use glam::Vec3;

/// Chord samples per world unit when estimating segment length.
const LENGTH_SAMPLES_PER_UNIT: f32 = 1.0;
const MIN_LENGTH_SAMPLES: usize = 8;
const MAX_LENGTH_SAMPLES: usize = 2048;

/// One cubic Bézier span: `start`, two control points, `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierSegment {
    pub start: Vec3,
    pub control_start: Vec3,
    pub control_end: Vec3,
    pub end: Vec3,
}

/// Evaluate a cubic Bézier at `t`.
///
/// Exact at the endpoints: `t == 0` yields `p0` and `t == 1` yields `p3`
/// bit-for-bit.
pub fn cubic_bezier(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    if t <= 0.0 {
        return p0;
    }
    if t >= 1.0 {
        return p3;
    }
    let u = 1.0 - t;
    let uu = u * u;
    let tt = t * t;
    p0 * (uu * u) + p1 * (3.0 * uu * t) + p2 * (3.0 * u * tt) + p3 * (tt * t)
}

/// First derivative of a cubic Bézier at `t`.
pub fn cubic_bezier_derivative(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    let u = 1.0 - t;
    (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t)
}

impl BezierSegment {
    pub fn new(start: Vec3, control_start: Vec3, control_end: Vec3, end: Vec3) -> Self {
        Self {
            start,
            control_start,
            control_end,
            end,
        }
    }

    pub fn point(&self, t: f32) -> Vec3 {
        cubic_bezier(self.start, self.control_start, self.control_end, self.end, t)
    }

    pub fn derivative(&self, t: f32) -> Vec3 {
        cubic_bezier_derivative(self.start, self.control_start, self.control_end, self.end, t)
    }

    /// Unit travel direction at `t`.
    ///
    /// Falls back to the chord when the derivative vanishes (a handle
    /// collapsed onto its anchor at an endpoint).
    pub fn direction(&self, t: f32) -> Vec3 {
        let d = self.derivative(t);
        if d.length_squared() > 1e-12 {
            return d.normalize();
        }
        let eps = 1e-3;
        let (a, b) = if t < 0.5 {
            (self.point(t), self.point(t + eps))
        } else {
            (self.point(t - eps), self.point(t))
        };
        let chord = b - a;
        if chord.length_squared() > 1e-12 {
            chord.normalize()
        } else {
            (self.end - self.start).normalize_or_zero()
        }
    }

    /// Number of chord samples used to estimate this segment's length,
    /// proportional to the distance between its endpoints.
    pub fn length_sample_count(&self) -> usize {
        let chord = (self.end - self.start).length();
        ((chord * LENGTH_SAMPLES_PER_UNIT).ceil() as usize).clamp(MIN_LENGTH_SAMPLES, MAX_LENGTH_SAMPLES)
    }

    /// Polyline estimate of the arc length.
    pub fn estimate_length(&self) -> f32 {
        let samples = self.length_sample_count();
        let mut length = 0.0;
        let mut prev = self.start;
        for j in 1..=samples {
            let pos = self.point(j as f32 / samples as f32);
            length += (pos - prev).length();
            prev = pos;
        }
        length
    }

    /// Parameter of the point on the curve nearest to `target`.
    ///
    /// Coarse scan followed by ternary refinement around the best sample.
    pub fn nearest_t(&self, target: Vec3) -> f32 {
        let coarse = self.length_sample_count().max(32);
        let mut best_t = 0.0;
        let mut best_d = f32::MAX;
        for j in 0..=coarse {
            let t = j as f32 / coarse as f32;
            let d = self.point(t).distance_squared(target);
            if d < best_d {
                best_d = d;
                best_t = t;
            }
        }

        let step = 1.0 / coarse as f32;
        let mut lo = (best_t - step).max(0.0);
        let mut hi = (best_t + step).min(1.0);
        for _ in 0..40 {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            if self.point(m1).distance_squared(target) < self.point(m2).distance_squared(target) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        (lo + hi) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight(length: f32) -> BezierSegment {
        BezierSegment::new(
            Vec3::ZERO,
            Vec3::new(length / 3.0, 0.0, 0.0),
            Vec3::new(2.0 * length / 3.0, 0.0, 0.0),
            Vec3::new(length, 0.0, 0.0),
        )
    }

    #[test]
    fn test_endpoints_are_exact() {
        let seg = BezierSegment::new(
            Vec3::new(0.1, 0.2, 0.3),
            Vec3::new(4.0, 1.0, -2.0),
            Vec3::new(7.0, -1.0, 9.0),
            Vec3::new(10.7, 3.3, 1.9),
        );
        assert_eq!(seg.point(0.0), seg.start);
        assert_eq!(seg.point(1.0), seg.end);
    }

    #[test]
    fn test_straight_length_matches_chord() {
        let seg = straight(20.0);
        assert!((seg.estimate_length() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_arc_is_longer_than_chord() {
        let seg = BezierSegment::new(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        assert!(seg.estimate_length() > 10.0 + 1.0);
    }

    #[test]
    fn test_nearest_t_finds_projection() {
        let seg = straight(10.0);
        let t = seg.nearest_t(Vec3::new(2.5, 4.0, 1.0));
        assert!((t - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_direction_survives_collapsed_handles() {
        let seg = BezierSegment::new(Vec3::ZERO, Vec3::ZERO, Vec3::X * 5.0, Vec3::X * 5.0);
        let d = seg.direction(0.0);
        assert!((d - Vec3::X).length() < 1e-3);
    }
}
