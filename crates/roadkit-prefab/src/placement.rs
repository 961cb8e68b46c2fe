//! Where objects go along a curve.
//!
//! Placement walks the curve's arc length inside the line's span. Each
//! object cycles through three phases: after its start point the main
//! (middle) point is pending until half the footprint is covered, then the
//! end point until the full footprint is covered, then the walk waits for
//! the spacing threshold before the next start. Spacing is measured
//! start-to-start and never shorter than the footprint.

use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use roadkit_core::math::left_of;
use roadkit_core::{IndexSpan, ParamCurve};
use roadkit_road::ResampledCurve;
use serde::{Deserialize, Serialize};

const DISTANCE_EPSILON: f32 = 1e-4;

/// Start-to-start distance between objects. Every variant is raised to at
/// least the footprint so objects never overlap: a fixed distance or a
/// random draw below it places objects edge to edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Spacing {
    Fixed { distance: f32 },
    /// Uniform draw from `[min, max]`, bounds in either order
    Random { min: f32, max: f32 },
    /// Objects touch edge to edge
    #[default]
    FillGap,
}

/// What happens to the last object when the curve runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndMode {
    /// Only objects that fit entirely
    #[default]
    Never,
    /// Objects whose middle is before the end, cut at the end
    Round,
    /// Any started object, cut at the end
    Always,
}

/// What the lateral offset curve is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetBasis {
    /// Progress along the whole host curve
    #[default]
    Centerline,
    /// Progress within the line's own span
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectionMode {
    /// Face along the direction of travel
    #[default]
    Travel,
    /// Face across the curve
    Perpendicular,
    /// Absolute yaw in degrees, ignoring the curve
    Fixed { yaw: f32 },
}

/// One placed object along the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRecord {
    pub start_point: Vec3,
    pub end_point: Vec3,
    pub main_point: Vec3,
    /// Arc length where the object starts
    pub start_time: f32,
    /// Arc length where the object ends
    pub end_time: f32,
    pub lateral_offset: f32,
}

impl PlacementRecord {
    pub fn main_time(&self) -> f32 {
        (self.start_time + self.end_time) * 0.5
    }
}

/// Position and frame at an arc length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFrame {
    pub position: Vec3,
    pub forward: Vec3,
    pub left: Vec3,
}

/// Arc-length lookup over a resampled curve.
#[derive(Debug, Clone, Default)]
pub struct CurveWindow {
    distances: Vec<f32>,
    positions: Vec<Vec3>,
    forwards: Vec<Vec3>,
    total_length: f32,
}

impl CurveWindow {
    pub fn new(curve: &ResampledCurve) -> Self {
        Self {
            distances: curve.samples.iter().map(|s| s.distance).collect(),
            positions: curve.samples.iter().map(|s| s.position).collect(),
            forwards: curve.samples.iter().map(|s| s.forward).collect(),
            total_length: curve.total_length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    /// Frame at `distance`, clamped to the curve.
    pub fn frame_at(&self, distance: f32) -> PathFrame {
        let n = self.distances.len();
        if n == 0 {
            return PathFrame {
                position: Vec3::ZERO,
                forward: Vec3::Z,
                left: Vec3::NEG_X,
            };
        }
        let idx = self.distances.partition_point(|d| *d <= distance);
        let (position, forward) = if idx == 0 {
            (self.positions[0], self.forwards[0])
        } else if idx >= n {
            (self.positions[n - 1], self.forwards[n - 1])
        } else {
            let (d0, d1) = (self.distances[idx - 1], self.distances[idx]);
            let f = if d1 - d0 > f32::EPSILON { (distance - d0) / (d1 - d0) } else { 0.0 };
            (
                self.positions[idx - 1].lerp(self.positions[idx], f),
                self.forwards[idx - 1]
                    .lerp(self.forwards[idx], f)
                    .try_normalize()
                    .unwrap_or(self.forwards[idx]),
            )
        };
        let mut left = left_of(forward);
        if left == Vec3::ZERO {
            left = Vec3::NEG_X;
        }
        PathFrame {
            position,
            forward,
            left,
        }
    }
}

/// Placement parameters of a prefab line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementSettings {
    pub spacing: Spacing,
    pub end_mode: EndMode,
    pub lateral_offset: ParamCurve,
    pub offset_basis: OffsetBasis,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            spacing: Spacing::FillGap,
            end_mode: EndMode::Never,
            lateral_offset: ParamCurve::default(),
            offset_basis: OffsetBasis::Centerline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    ReadyForNextStart { at: f32 },
    MainPointPending { start: f32 },
    EndPointPending { start: f32, main: f32 },
}

/// Compute placements of objects `footprint` long along `window`, inside
/// `span` of the host curve.
pub fn compute_placements(
    curve: &ResampledCurve,
    window: &CurveWindow,
    span: &IndexSpan,
    settings: &PlacementSettings,
    footprint: f32,
    rng: &mut ChaCha8Rng,
) -> Vec<PlacementRecord> {
    let mut records = Vec::new();
    if window.is_empty() || !footprint.is_finite() || footprint <= DISTANCE_EPSILON {
        log::debug!("prefab footprint {} cannot be placed", footprint);
        return records;
    }
    let begin = curve.distance_at(span.start_index, span.start_offset);
    let end = curve.distance_at(span.end_index, span.end_offset);
    if end - begin <= DISTANCE_EPSILON {
        return records;
    }

    let offset_at = |distance: f32| {
        let progress = match settings.offset_basis {
            OffsetBasis::Centerline if window.total_length() > f32::EPSILON => distance / window.total_length(),
            OffsetBasis::Centerline => 0.0,
            OffsetBasis::Interval => (distance - begin) / (end - begin),
        };
        settings.lateral_offset.evaluate(progress)
    };
    let point_at = |distance: f32| {
        let frame = window.frame_at(distance);
        frame.position + frame.left * offset_at(distance)
    };
    let mut emit = |start: f32, main: f32, stop: f32| {
        records.push(PlacementRecord {
            start_point: point_at(start),
            end_point: point_at(stop),
            main_point: point_at(main),
            start_time: start,
            end_time: stop,
            lateral_offset: offset_at(main),
        });
    };

    let mut phase = Phase::ReadyForNextStart { at: begin };
    loop {
        phase = match phase {
            Phase::ReadyForNextStart { at } => {
                if at >= end - DISTANCE_EPSILON {
                    break;
                }
                Phase::MainPointPending { start: at }
            }
            Phase::MainPointPending { start } => {
                let main = start + footprint * 0.5;
                if main > end + DISTANCE_EPSILON {
                    if settings.end_mode == EndMode::Always {
                        emit(start, (start + end) * 0.5, end);
                    }
                    break;
                }
                Phase::EndPointPending { start, main }
            }
            Phase::EndPointPending { start, main } => {
                let stop = start + footprint;
                if stop > end + DISTANCE_EPSILON {
                    if settings.end_mode != EndMode::Never {
                        emit(start, main, end);
                    }
                    break;
                }
                emit(start, main, stop.min(end));
                Phase::ReadyForNextStart {
                    at: start + next_spacing(&settings.spacing, footprint, rng),
                }
            }
        };
    }
    records
}

fn next_spacing(spacing: &Spacing, footprint: f32, rng: &mut ChaCha8Rng) -> f32 {
    let step = match *spacing {
        Spacing::Fixed { distance } => distance,
        Spacing::Random { min, max } => {
            let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
            if hi - lo > f32::EPSILON {
                rng.gen_range(lo..=hi)
            } else {
                lo
            }
        }
        Spacing::FillGap => footprint,
    };
    if step.is_finite() {
        step.max(footprint)
    } else {
        footprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use roadkit_road::{AnchorPoint, Curve};

    fn straight(length: f32) -> ResampledCurve {
        Curve::new(vec![
            AnchorPoint::new(Vec3::ZERO),
            AnchorPoint::new(Vec3::new(length, 0.0, 0.0)),
        ])
        .resample(10.0, &[])
    }

    fn place(curve: &ResampledCurve, settings: &PlacementSettings, footprint: f32, seed: u64) -> Vec<PlacementRecord> {
        let window = CurveWindow::new(curve);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        compute_placements(curve, &window, &IndexSpan::new(0, 0), settings, footprint, &mut rng)
    }

    #[test]
    fn test_fill_gap_covers_fifty_units() {
        let curve = straight(50.0);
        let records = place(&curve, &PlacementSettings::default(), 5.0, 0);
        assert_eq!(records.len(), 10);
        for (i, r) in records.iter().enumerate() {
            assert!((r.start_time - i as f32 * 5.0).abs() < 1e-3);
            assert!((r.end_time - r.start_time - 5.0).abs() < 1e-3);
        }
        for w in records.windows(2) {
            assert!((w[1].start_time - w[0].end_time).abs() < 1e-3);
        }
        assert!((records[9].end_time - 50.0).abs() < 1e-3);
        assert!((records[0].main_point - Vec3::new(2.5, 0.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_end_modes() {
        let settings = |end_mode| PlacementSettings {
            end_mode,
            ..Default::default()
        };
        // third object: main point past the end
        let short = straight(12.0);
        assert_eq!(place(&short, &settings(EndMode::Never), 5.0, 0).len(), 2);
        assert_eq!(place(&short, &settings(EndMode::Round), 5.0, 0).len(), 2);
        let always = place(&short, &settings(EndMode::Always), 5.0, 0);
        assert_eq!(always.len(), 3);
        assert!((always[2].end_time - 12.0).abs() < 1e-3);

        // third object: main point fits, end does not
        let longer = straight(13.0);
        assert_eq!(place(&longer, &settings(EndMode::Never), 5.0, 0).len(), 2);
        let round = place(&longer, &settings(EndMode::Round), 5.0, 0);
        assert_eq!(round.len(), 3);
        assert!((round[2].end_time - 13.0).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_spacing_is_start_to_start() {
        let settings = PlacementSettings {
            spacing: Spacing::Fixed { distance: 10.0 },
            ..Default::default()
        };
        let records = place(&straight(50.0), &settings, 2.0, 0);
        assert_eq!(records.len(), 5);
        assert!((records[4].start_time - 40.0).abs() < 1e-3);

        // spacing below the footprint is raised to it
        let tight = PlacementSettings {
            spacing: Spacing::Fixed { distance: 1.0 },
            ..Default::default()
        };
        let records = place(&straight(20.0), &tight, 4.0, 0);
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_random_spacing_is_seeded_and_bounded() {
        let settings = PlacementSettings {
            spacing: Spacing::Random { min: 3.0, max: 7.0 },
            ..Default::default()
        };
        let curve = straight(100.0);
        let a = place(&curve, &settings, 2.0, 42);
        let b = place(&curve, &settings, 2.0, 42);
        assert_eq!(a, b);
        for w in a.windows(2) {
            let step = w[1].start_time - w[0].start_time;
            assert!((3.0 - 1e-3..=7.0 + 1e-3).contains(&step), "step {}", step);
        }
    }

    #[test]
    fn test_random_spacing_below_footprint_touches() {
        let settings = PlacementSettings {
            spacing: Spacing::Random { min: 1.0, max: 2.0 },
            ..Default::default()
        };
        let records = place(&straight(30.0), &settings, 5.0, 3);
        assert_eq!(records.len(), 6);
        for w in records.windows(2) {
            assert!((w[1].start_time - w[0].end_time).abs() < 1e-3);
        }
    }

    #[test]
    fn test_lateral_offset_follows_left() {
        let settings = PlacementSettings {
            lateral_offset: ParamCurve::constant(2.0),
            ..Default::default()
        };
        let records = place(&straight(10.0), &settings, 5.0, 0);
        assert_eq!(records[0].lateral_offset, 2.0);
        assert!((records[0].start_point - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-4);
    }

    #[test]
    fn test_interval_basis_uses_span_progress() {
        let curve = straight(40.0);
        let window = CurveWindow::new(&curve);
        let settings = PlacementSettings {
            lateral_offset: ParamCurve::linear(0.0, 4.0),
            offset_basis: OffsetBasis::Interval,
            ..Default::default()
        };
        let span = IndexSpan::new(0, 0).with_offsets(0.5, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let records = compute_placements(&curve, &window, &span, &settings, 10.0, &mut rng);
        assert_eq!(records.len(), 2);
        assert!(records[0].start_time >= 19.0);
        // first object's middle is a quarter into the interval
        assert!((records[0].lateral_offset - 1.0).abs() < 0.2);
    }
}
