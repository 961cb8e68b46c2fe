//! Piecewise cubic curves: resampling and structural edits.
//!
//! Segment `i` runs from point `i` to point `i + 1`, using the start
//! point's right tangent and the end point's left tangent as the inner
//! control handles. Cyclic curves keep an explicit closing point whose
//! position is forced onto the first point each regeneration.
//!
//! Structural edits (`split`, `insert_point`, `remove_point`) only touch the
//! point list. Callers owning index spans run the matching
//! [`IndexSpan`](roadkit_core::IndexSpan) fix-up afterwards.

use glam::Vec3;
use roadkit_core::math::{intersect_lines_xz, POINT_EPSILON};
use roadkit_core::{BezierSegment, PointId, Result, RoadError};
use roadkit_terrain::HeightProbe;
use serde::{Deserialize, Serialize};

use crate::point::AnchorPoint;

/// Samples per segment are `length * detail_level / SAMPLE_DIVISOR`.
const SAMPLE_DIVISOR: f32 = 10.0;
const MIN_SEGMENT_SAMPLES: usize = 3;
const SEAM_T_EPSILON: f32 = 1e-6;

const SPLIT_NUDGE: f32 = 2.0;
const SPLIT_NUDGE_LARGE: f32 = 5.0;

const INSERT_T_MIN: f32 = 0.01;
const INSERT_T_MAX: f32 = 0.99;
const INSERT_FALLBACK_TANGENT: f32 = 2.0;
const INSERT_NEIGHBOUR_LERP: f32 = 0.8;

/// One resampled point along a curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub position: Vec3,
    /// Unit travel direction
    pub forward: Vec3,
    pub segment: usize,
    /// Bézier parameter within `segment`
    pub t: f32,
    /// Arc length from the first sample
    pub distance: f32,
    /// Force-inserted at a lane/prefab/terrain boundary
    pub seam: bool,
}

impl CurveSample {
    /// Continuous segment position, comparable with
    /// [`IndexSpan::start_position`](roadkit_core::IndexSpan::start_position).
    pub fn curve_position(&self) -> f32 {
        self.segment as f32 + self.t
    }
}

/// Output of [`Curve::resample`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResampledCurve {
    pub samples: Vec<CurveSample>,
    /// Index into `samples` of each segment's `t = 0` sample
    pub segment_starts: Vec<usize>,
    pub total_length: f32,
}

impl ResampledCurve {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.samples.iter().map(|s| s.position).collect()
    }

    pub fn is_segment_start(&self, sample_index: usize) -> bool {
        self.segment_starts.binary_search(&sample_index).is_ok()
    }

    /// Arc length at `(segment, fraction)`, interpolated between the
    /// surrounding samples. Seams were inserted exactly, so seam lookups
    /// return the sample's own distance.
    pub fn distance_at(&self, segment: usize, fraction: f32) -> f32 {
        let (Some(first), Some(last)) = (self.samples.first(), self.samples.last()) else {
            return 0.0;
        };
        let key = segment as f32 + fraction.clamp(0.0, 1.0);
        if key <= first.curve_position() {
            return first.distance;
        }
        let idx = self.samples.partition_point(|s| s.curve_position() <= key);
        if idx >= self.samples.len() {
            return last.distance;
        }
        let a = &self.samples[idx - 1];
        let b = &self.samples[idx];
        let span = b.curve_position() - a.curve_position();
        if span <= f32::EPSILON {
            return a.distance;
        }
        a.distance + (b.distance - a.distance) * ((key - a.curve_position()) / span)
    }
}

/// An ordered list of anchor points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve {
    #[serde(default)]
    pub cyclic: bool,
    pub points: Vec<AnchorPoint>,
}

impl Curve {
    pub fn new(points: Vec<AnchorPoint>) -> Self {
        Self {
            points,
            cyclic: false,
        }
    }

    /// Straight polyline through `positions` with tangents at a third of
    /// each neighbouring chord.
    pub fn from_positions(positions: &[Vec3]) -> Self {
        let mut curve = Self::default();
        for &p in positions {
            curve.push_point(p);
        }
        curve
    }

    pub fn is_valid(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    pub fn segment(&self, index: usize) -> Option<BezierSegment> {
        let a = self.points.get(index)?;
        let b = self.points.get(index + 1)?;
        Some(BezierSegment::new(
            a.position,
            a.position + a.right_tangent,
            b.position + b.left_tangent,
            b.position,
        ))
    }

    /// Sample the curve for extrusion.
    ///
    /// Each segment gets `max(3, round(length * detail_level / 10))` evenly
    /// parameterised samples, plus every seam `(segment, fraction)` inserted
    /// exactly. Consecutive samples closer than `POINT_EPSILON` collapse into
    /// one. Anchors land exactly on the `t = 0` sample of their outgoing
    /// segment and the final sample.
    pub fn resample(&self, detail_level: f32, seams: &[(usize, f32)]) -> ResampledCurve {
        let segments = self.segment_count();
        let mut out = ResampledCurve::default();
        if segments == 0 {
            return out;
        }
        let detail = if detail_level.is_finite() && detail_level > 0.0 {
            detail_level
        } else {
            1.0
        };

        let mut forced: Vec<Vec<f32>> = vec![Vec::new(); segments];
        for &(segment, fraction) in seams {
            if !fraction.is_finite() || segment >= segments {
                continue;
            }
            let fraction = fraction.clamp(0.0, 1.0);
            if fraction >= 1.0 && segment + 1 < segments {
                forced[segment + 1].push(0.0);
            } else {
                forced[segment].push(fraction);
            }
        }

        let mut distance = 0.0;
        let mut prev: Option<Vec3> = None;
        for (segment, seam_ts) in forced.iter().enumerate() {
            let Some(bezier) = self.segment(segment) else {
                continue;
            };
            let length = bezier.estimate_length();
            let count = ((length * detail / SAMPLE_DIVISOR).round() as usize).max(MIN_SEGMENT_SAMPLES);

            let mut ts: Vec<(f32, bool)> = (0..count).map(|j| (j as f32 / count as f32, false)).collect();
            if segment + 1 == segments {
                ts.push((1.0, false));
            }
            ts.extend(seam_ts.iter().map(|&t| (t, true)));
            ts.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut merged: Vec<(f32, bool)> = Vec::with_capacity(ts.len());
            for (t, seam) in ts {
                match merged.last_mut() {
                    Some(last) if (t - last.0).abs() <= SEAM_T_EPSILON => last.1 |= seam,
                    _ => merged.push((t, seam)),
                }
            }

            let mut start_recorded = false;
            for (t, seam) in merged {
                let position = bezier.point(t);
                if let Some(p) = prev {
                    let step = (position - p).length();
                    if step <= POINT_EPSILON {
                        if let Some(last) = out.samples.last_mut() {
                            last.seam |= seam;
                        }
                        if !start_recorded {
                            out.segment_starts.push(out.samples.len() - 1);
                            start_recorded = true;
                        }
                        continue;
                    }
                    distance += step;
                }
                if !start_recorded {
                    out.segment_starts.push(out.samples.len());
                    start_recorded = true;
                }
                out.samples.push(CurveSample {
                    position,
                    forward: bezier.direction(t),
                    segment,
                    t,
                    distance,
                    seam,
                });
                prev = Some(position);
            }
        }
        out.total_length = distance;
        out
    }

    /// Split at interior point `point_index`.
    ///
    /// `self` keeps points `0..=point_index`; the returned curve starts with
    /// a copy of the split point (fresh id) followed by the rest. The two
    /// copies are pushed apart along the local tangent so neither curve ends
    /// in a zero-length segment.
    pub fn split(&mut self, point_index: usize, large_movement: bool) -> Result<Curve> {
        if self.cyclic {
            return Err(RoadError::InvalidTopology("cannot split a cyclic curve".into()));
        }
        let n = self.points.len();
        if point_index == 0 || point_index + 1 >= n {
            return Err(RoadError::InvalidTopology(format!(
                "point {} is not an interior point of a {}-point curve",
                point_index, n
            )));
        }

        let nudge = if large_movement { SPLIT_NUDGE_LARGE } else { SPLIT_NUDGE };
        let dir = self.tangent_direction(point_index);

        let mut tail = self.points.split_off(point_index + 1);
        let mut duplicate = self.points[point_index].clone();
        duplicate.id = PointId::new();
        duplicate.position += dir * nudge * 0.5;
        if let Some(last) = self.points.last_mut() {
            last.position -= dir * nudge * 0.5;
        }
        tail.insert(0, duplicate);
        Ok(Curve::new(tail))
    }

    /// Insert a point on `segment` at the curve position nearest `target`.
    ///
    /// Returns the new point's index and the segment parameter it was
    /// inserted at, for index span fix-ups.
    pub fn insert_point(&mut self, segment: usize, target: Vec3) -> Result<(usize, f32)> {
        let bezier = self.segment(segment).ok_or(RoadError::IndexOutOfRange {
            index: segment,
            len: self.segment_count(),
        })?;
        let t = bezier.nearest_t(target).clamp(INSERT_T_MIN, INSERT_T_MAX);
        let position = bezier.point(t);

        let (left, right) = insert_tangents(&self.points[segment], &self.points[segment + 1], position, t);

        let prev = &mut self.points[segment];
        prev.right_tangent = prev
            .right_tangent
            .lerp((position - prev.position) / 3.0, INSERT_NEIGHBOUR_LERP);
        let next = &mut self.points[segment + 1];
        next.left_tangent = next
            .left_tangent
            .lerp((position - next.position) / 3.0, INSERT_NEIGHBOUR_LERP);

        self.points
            .insert(segment + 1, AnchorPoint::with_tangents(position, left, right));
        Ok((segment + 1, t))
    }

    /// Remove the point at `index`. Refuses to leave fewer than two points.
    pub fn remove_point(&mut self, index: usize) -> Result<AnchorPoint> {
        let n = self.points.len();
        if index >= n {
            return Err(RoadError::IndexOutOfRange { index, len: n });
        }
        if n <= 2 {
            return Err(RoadError::InvalidTopology(
                "a curve needs at least two points".into(),
            ));
        }
        Ok(self.points.remove(index))
    }

    /// Force the first point onto the last one on cyclic curves.
    pub fn enforce_cyclic(&mut self) {
        if !self.cyclic || self.points.len() < 2 {
            return;
        }
        if let Some(last) = self.points.last().map(|p| p.position) {
            self.points[0].position = last;
        }
    }

    /// Drop every anchor onto the ground below it, plus `offset`.
    /// Returns how many anchors found ground.
    pub fn snap_to_terrain<P: HeightProbe + ?Sized>(&mut self, probe: &P, probe_height: f32, offset: f32) -> usize {
        let mut snapped = 0;
        for point in &mut self.points {
            let origin = point.position + Vec3::Y * probe_height;
            if let Some(h) = probe.probe_down(origin).filter(|h| h.is_finite()) {
                point.position.y = h + offset;
                snapped += 1;
            }
        }
        snapped
    }

    /// Continue the curve past its last point. Returns the new index.
    pub fn push_point(&mut self, position: Vec3) -> usize {
        let tangent = self
            .points
            .last()
            .map(|last| (position - last.position) / 3.0)
            .unwrap_or(Vec3::ZERO);
        if let Some(last) = self.points.last_mut() {
            if last.right_tangent == Vec3::ZERO {
                last.right_tangent = tangent;
            }
        }
        self.points.push(AnchorPoint::with_tangents(position, -tangent, tangent));
        self.points.len() - 1
    }

    /// Continue the curve before its first point. Every existing index
    /// shifts up by one.
    pub fn prepend_point(&mut self, position: Vec3) {
        let tangent = self
            .points
            .first()
            .map(|first| (first.position - position) / 3.0)
            .unwrap_or(Vec3::ZERO);
        if let Some(first) = self.points.first_mut() {
            if first.left_tangent == Vec3::ZERO {
                first.left_tangent = -tangent;
            }
        }
        self.points.insert(0, AnchorPoint::with_tangents(position, -tangent, tangent));
    }

    fn tangent_direction(&self, index: usize) -> Vec3 {
        let p = &self.points[index];
        let handles = p.right_tangent - p.left_tangent;
        if handles.length_squared() > 1e-12 {
            return handles.normalize();
        }
        let prev = self.points[index.saturating_sub(1)].position;
        let next = self.points[(index + 1).min(self.points.len() - 1)].position;
        (next - prev).normalize_or_zero()
    }
}

/// Tangents for a point inserted at `position` (parameter `t`) between
/// `prev` and `next`.
///
/// When the neighbours' handle rays meet in the ground plane the direction
/// follows the quadratic through that meeting point; otherwise a fixed
/// length along the chord.
fn insert_tangents(prev: &AnchorPoint, next: &AnchorPoint, position: Vec3, t: f32) -> (Vec3, Vec3) {
    let chord = next.position - prev.position;
    let solved = if prev.right_tangent.length_squared() > 1e-12 && next.left_tangent.length_squared() > 1e-12 {
        intersect_lines_xz(prev.position, prev.right_tangent, next.position, next.left_tangent)
            .and_then(|hit| {
                let a = prev.position.lerp(hit, t);
                let b = hit.lerp(next.position, t);
                (b - a).try_normalize()
            })
            .filter(|dir| dir.dot(chord) > 0.0)
    } else {
        None
    };

    match solved {
        Some(dir) => {
            let back = (position - prev.position).length() / 3.0;
            let ahead = (next.position - position).length() / 3.0;
            (-dir * back, dir * ahead)
        }
        None => {
            let dir = chord.normalize_or_zero();
            (-dir * INSERT_FALLBACK_TANGENT, dir * INSERT_FALLBACK_TANGENT)
        }
    }
}
