//! Lane stack extrusion.
//!
//! Two passes over a resampled curve:
//! 1. For every sample, find the lanes covering it, evaluate their widths
//!    and lay them out as a stack centered on the curve. Lanes listed
//!    first sit furthest left. Lanes ignored for width calculation ride
//!    outside the nearest stack edge and only feed the carving footprint.
//! 2. For every lane and LOD level, pick the retained samples and
//!    triangulate consecutive vertex pairs as quads.
//!
//! Each lane vertex pair is `(right edge, left edge)`; with `a, b` the
//! previous pair and `c, d` the current one the quad is `[a, c, b]`,
//! `[b, c, d]`, which faces up for a curve travelling in the ground plane.

use glam::{Vec2, Vec3};
use roadkit_core::math::{left_of, POINT_EPSILON};
use roadkit_core::{ContentHash, IndexSpan, Result, RoadError};
use roadkit_terrain::CarveSample;

use crate::curve::ResampledCurve;
use crate::lane::Lane;
use crate::lod::{LodGroup, LodSettings};
use crate::mesh::{ColliderMesh, MeshBuffers};

const PROGRESS_EPSILON: f32 = 1e-6;

/// Cross-section extent of the road at one curve sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootprintSample {
    pub position: Vec3,
    pub segment: usize,
    pub t: f32,
    /// Half of the summed widths of stacked lanes
    pub half_width: f32,
    /// Widest side of the lanes riding outside the stack
    pub extra_width: f32,
}

/// Generated geometry of one lane.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneMesh {
    /// Index into the road's lane list
    pub lane: usize,
    /// One mesh per LOD level, most detailed first
    pub lods: Vec<MeshBuffers>,
    /// Where the lane's progress first reaches one half
    pub center_point: Option<Vec3>,
}

/// Everything extrusion produces for one road.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadMesh {
    pub lanes: Vec<LaneMesh>,
    pub collider: ColliderMesh,
    pub lod_group: LodGroup,
    pub footprint: Vec<FootprintSample>,
}

impl RoadMesh {
    pub fn lane(&self, lane: usize) -> Option<&LaneMesh> {
        self.lanes.iter().find(|m| m.lane == lane)
    }

    /// LOD 0 of every lane.
    pub fn surfaces(&self) -> impl Iterator<Item = &MeshBuffers> {
        self.lanes.iter().filter_map(|m| m.lods.first())
    }

    /// Footprint samples inside `span` (all when `None`) for carving.
    pub fn carve_samples(&self, span: Option<&IndexSpan>) -> Vec<CarveSample> {
        self.footprint
            .iter()
            .filter(|f| span.map_or(true, |s| s.contains(f.segment as f32 + f.t)))
            .map(|f| CarveSample {
                position: f.position,
                half_width: f.half_width,
                extra_width: f.extra_width,
            })
            .collect()
    }

    pub fn fingerprint(&self) -> ContentHash {
        let mut hasher = ContentHash::builder();
        for lane in &self.lanes {
            hasher.u32s(&[lane.lane as u32, lane.lods.len() as u32]);
            for lod in &lane.lods {
                hasher.bytes(lod.fingerprint().as_bytes());
            }
        }
        hasher.finish()
    }
}

/// Where a lane starts and ends along the curve.
#[derive(Debug, Clone, Copy)]
struct LaneWindow {
    start_distance: f32,
    length: f32,
    max_width: f32,
}

/// One emitted vertex pair of a lane.
#[derive(Debug, Clone, Copy)]
struct PairRecord {
    right: Vec3,
    left: Vec3,
    u: (f32, f32),
    v: f32,
    /// Segment start or seam: kept at every LOD
    pinned: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct StackSlot {
    progress: f32,
    width: f32,
    /// Lateral offset of the lane center along `left`
    center: f32,
    /// Vertical offset accumulated across the stack up to this lane
    height: f32,
}

/// Extrude `lanes` along `curve`.
///
/// Fails with `MissingAsset` when a lane that would produce geometry has no
/// material; in that case nothing is emitted.
pub fn extrude_lanes(curve: &ResampledCurve, lanes: &[Lane], lod: &LodSettings) -> Result<RoadMesh> {
    for (i, lane) in lanes.iter().enumerate() {
        if !lane.is_flat() && lane.materials.is_empty() {
            return Err(RoadError::MissingAsset(format!(
                "lane {} '{}' has no material",
                i, lane.name
            )));
        }
    }

    let windows: Vec<Option<LaneWindow>> = lanes
        .iter()
        .enumerate()
        .map(|(i, lane)| lane_window(curve, lane, i))
        .collect();

    let mut records: Vec<Vec<PairRecord>> = vec![Vec::new(); lanes.len()];
    let mut centers: Vec<Option<Vec3>> = vec![None; lanes.len()];
    let mut last_center: Vec<Option<(f32, Vec3)>> = vec![None; lanes.len()];
    let mut footprint = Vec::with_capacity(curve.len());

    for (i, sample) in curve.samples.iter().enumerate() {
        let left = left_of(sample.forward);
        if left == Vec3::ZERO {
            log::debug!("skipping sample {} with vertical or zero direction", i);
            continue;
        }

        let slots = stack_sample(curve, i, lanes, &windows);
        let half_width = slots.half_width;
        footprint.push(FootprintSample {
            position: sample.position,
            segment: sample.segment,
            t: sample.t,
            half_width,
            extra_width: slots.extra_width,
        });

        let pinned = sample.seam || curve.is_segment_start(i);
        for (k, slot) in slots.slots.iter().enumerate() {
            let (Some(slot), Some(window)) = (slot, windows[k]) else {
                continue;
            };
            if is_seam_sliver(curve, i, slot.progress) {
                log::debug!("skipping sliver sample {} of lane {}", i, k);
                continue;
            }
            let lane = &lanes[k];
            let center = sample.position + left * slot.center + Vec3::Y * slot.height;
            let half = left * (slot.width * 0.5);

            if centers[k].is_none() && slot.progress >= 0.5 {
                centers[k] = Some(match last_center[k] {
                    Some((p, prev)) if p < 0.5 && slot.progress - p > PROGRESS_EPSILON => {
                        prev.lerp(center, (0.5 - p) / (slot.progress - p))
                    }
                    _ => center,
                });
            }
            last_center[k] = Some((slot.progress, center));

            records[k].push(PairRecord {
                right: center - half,
                left: center + half,
                u: lane.uv.u_pair(slot.width, window.max_width),
                v: sample.distance * lane.uv.tiling,
                pinned,
            });
        }
    }

    let mut mesh = RoadMesh {
        footprint,
        ..Default::default()
    };
    for (k, lane_records) in records.iter().enumerate() {
        if lane_records.len() < 2 {
            if windows[k].is_some() {
                log::debug!("lane {} covers fewer than two samples", k);
            }
            continue;
        }
        let lods = (0..lod.level_count())
            .map(|level| build_lod(lane_records, lod.stride(level)))
            .collect();
        mesh.lanes.push(LaneMesh {
            lane: k,
            lods,
            center_point: centers[k],
        });
    }

    let mut bounds: Option<(Vec3, Vec3)> = None;
    for surface in mesh.lanes.iter().filter_map(|m| m.lods.first()) {
        mesh.collider.append(surface);
        if let Some((lo, hi)) = surface.bounds() {
            bounds = Some(match bounds {
                Some((a, b)) => (a.min(lo), b.max(hi)),
                None => (lo, hi),
            });
        }
    }
    let size = bounds.map_or(0.0, |(lo, hi)| (hi - lo).length());
    mesh.lod_group = lod.build_group(size);
    Ok(mesh)
}

fn lane_window(curve: &ResampledCurve, lane: &Lane, index: usize) -> Option<LaneWindow> {
    if lane.is_flat() {
        log::debug!("lane {} has no width or offset", index);
        return None;
    }
    let start_distance = curve.distance_at(lane.span.start_index, lane.span.start_offset);
    let end_distance = curve.distance_at(lane.span.end_index, lane.span.end_offset);
    let length = end_distance - start_distance;
    if !length.is_finite() || length <= POINT_EPSILON {
        log::debug!("lane {} spans no length", index);
        return None;
    }
    Some(LaneWindow {
        start_distance,
        length,
        max_width: lane.max_width(),
    })
}

struct Stack {
    slots: Vec<Option<StackSlot>>,
    half_width: f32,
    extra_width: f32,
}

fn stack_sample(curve: &ResampledCurve, index: usize, lanes: &[Lane], windows: &[Option<LaneWindow>]) -> Stack {
    let sample = &curve.samples[index];
    let position = sample.curve_position();

    let mut slots: Vec<Option<StackSlot>> = lanes
        .iter()
        .zip(windows)
        .map(|(lane, window)| {
            let window = window.as_ref()?;
            if !lane.span.contains(position) {
                return None;
            }
            let progress = ((sample.distance - window.start_distance) / window.length).clamp(0.0, 1.0);
            if !progress.is_finite() {
                return None;
            }
            Some(StackSlot {
                progress,
                width: lane.width_at(progress),
                center: 0.0,
                height: lane.y_offset_at(progress),
            })
        })
        .collect();

    let total: f32 = lanes
        .iter()
        .zip(&slots)
        .filter(|(lane, _)| !lane.ignore_for_width_calculation)
        .filter_map(|(_, slot)| slot.map(|s| s.width))
        .sum();
    let half_width = total * 0.5;

    // Stacked lanes, left to right; remember which edge each rider hugs.
    // Vertical offsets add up the same way, riders starting from the edge
    // they hug.
    let mut cumulative = 0.0;
    let mut lift = 0.0;
    let mut left_edge_lift = None;
    let mut left_riders = Vec::new();
    let mut right_riders = Vec::new();
    for (k, lane) in lanes.iter().enumerate() {
        let Some(slot) = slots[k].as_mut() else {
            continue;
        };
        if lane.ignore_for_width_calculation {
            if cumulative <= half_width {
                left_riders.push(k);
            } else {
                right_riders.push(k);
            }
            continue;
        }
        slot.center = half_width - cumulative - slot.width * 0.5;
        cumulative += slot.width;
        lift += slot.height;
        slot.height = lift;
        if left_edge_lift.is_none() {
            left_edge_lift = Some(lift);
        }
    }

    let mut extra_left = 0.0;
    let mut rider_lift = left_edge_lift.unwrap_or(0.0);
    for &k in left_riders.iter().rev() {
        if let Some(slot) = slots[k].as_mut() {
            slot.center = half_width + extra_left + slot.width * 0.5;
            extra_left += slot.width;
            rider_lift += slot.height;
            slot.height = rider_lift;
        }
    }
    let mut extra_right = 0.0;
    let mut rider_lift = lift;
    for &k in &right_riders {
        if let Some(slot) = slots[k].as_mut() {
            slot.center = -(half_width + extra_right + slot.width * 0.5);
            extra_right += slot.width;
            rider_lift += slot.height;
            slot.height = rider_lift;
        }
    }

    Stack {
        slots,
        half_width,
        extra_width: f32::max(extra_left, extra_right),
    }
}

/// A lane boundary sample sitting on a duplicate of its neighbour would
/// only produce a zero-area quad.
fn is_seam_sliver(curve: &ResampledCurve, index: usize, progress: f32) -> bool {
    let here = curve.samples[index].distance;
    if progress <= PROGRESS_EPSILON {
        if let Some(next) = curve.samples.get(index + 1) {
            return next.distance - here <= POINT_EPSILON;
        }
    }
    if progress >= 1.0 - PROGRESS_EPSILON && index > 0 {
        return here - curve.samples[index - 1].distance <= POINT_EPSILON;
    }
    false
}

fn build_lod(records: &[PairRecord], stride: usize) -> MeshBuffers {
    let last = records.len() - 1;
    let mut mesh = MeshBuffers::new();
    let mut previous: Option<(u32, u32)> = None;
    for (j, record) in records.iter().enumerate() {
        let keep = j == 0 || j == last || record.pinned || j % stride == 0;
        if !keep {
            continue;
        }
        let c = mesh.push_vertex(record.right, Vec2::new(record.u.1, record.v));
        let d = mesh.push_vertex(record.left, Vec2::new(record.u.0, record.v));
        if let Some((a, b)) = previous {
            mesh.push_triangle(a, c, b);
            mesh.push_triangle(b, c, d);
        }
        previous = Some((c, d));
    }
    mesh.recalculate_normals();
    mesh.recalculate_tangents();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use crate::point::AnchorPoint;
    use roadkit_core::ParamCurve;

    fn straight(length: f32) -> Curve {
        Curve::new(vec![
            AnchorPoint::new(Vec3::ZERO),
            AnchorPoint::new(Vec3::new(length, 0.0, 0.0)),
        ])
    }

    fn lane(width: f32) -> Lane {
        Lane::new("lane", IndexSpan::new(0, 0), ParamCurve::constant(width))
    }

    #[test]
    fn test_single_lane_scenario() {
        let resampled = straight(20.0).resample(10.0, &[]);
        let count = resampled.len();
        assert!(count >= 20);

        let mesh = extrude_lanes(&resampled, &[lane(4.0)], &LodSettings::default()).unwrap();
        let lod0 = &mesh.lanes[0].lods[0];
        assert_eq!(lod0.vertex_count(), count * 2);
        assert_eq!(lod0.triangle_count(), (count - 1) * 2);

        let center = mesh.lanes[0].center_point.unwrap();
        assert!((center - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-3);

        // left edge of a road travelling +X is at -Z
        assert!((lod0.vertices[1] - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-5);
        assert!((lod0.vertices[0] - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
        assert!(lod0.normals.iter().all(|n| n.y > 0.99));
    }

    #[test]
    fn test_stacked_widths_sum_to_footprint() {
        let resampled = straight(30.0).resample(5.0, &[]);
        let mut shoulder = lane(1.5);
        shoulder.ignore_for_width_calculation = true;
        let lanes = vec![
            shoulder,
            lane(3.0),
            Lane::new("taper", IndexSpan::new(0, 0), ParamCurve::linear(1.0, 3.0)),
        ];
        let mesh = extrude_lanes(&resampled, &lanes, &LodSettings::default()).unwrap();

        for (f, s) in mesh.footprint.iter().zip(&resampled.samples) {
            let progress = s.distance / resampled.total_length;
            let expected = 3.0 + lanes[2].width_at(progress);
            assert!((f.half_width * 2.0 - expected).abs() < 1e-3);
            assert!((f.extra_width - 1.5).abs() < 1e-6);
        }

        // first stacked lane hugs the left edge, the shoulder sits beyond it
        let first = &mesh.lane(1).unwrap().lods[0];
        let shoulder = &mesh.lane(0).unwrap().lods[0];
        let half = mesh.footprint[0].half_width;
        assert!((first.vertices[1].z + half).abs() < 1e-4);
        assert!((shoulder.vertices[0].z + half).abs() < 1e-4);
        assert!((shoulder.vertices[1].z + half + 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_vertical_offsets_accumulate_across_stack() {
        let resampled = straight(10.0).resample(10.0, &[]);
        let mut kerb = lane(0.5);
        kerb.ignore_for_width_calculation = true;
        kerb.y_offset = ParamCurve::constant(0.1);
        let mut raised = lane(3.0);
        raised.y_offset = ParamCurve::constant(0.2);
        let mut step = lane(3.0);
        step.y_offset = ParamCurve::constant(0.3);
        let lanes = vec![kerb, raised, step, lane(3.0)];
        let mesh = extrude_lanes(&resampled, &lanes, &LodSettings::default()).unwrap();

        let height = |k: usize| mesh.lane(k).unwrap().lods[0].vertices[0].y;
        assert!((height(1) - 0.2).abs() < 1e-5);
        assert!((height(2) - 0.5).abs() < 1e-5);
        assert!((height(3) - 0.5).abs() < 1e-5);
        // the kerb rides on top of the left edge lane
        assert!((height(0) - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_lod_keeps_ends_and_seams() {
        let curve = Curve::from_positions(&[Vec3::ZERO, Vec3::new(40.0, 0.0, 0.0), Vec3::new(80.0, 0.0, 10.0)]);
        let mut partial = lane(3.0);
        partial.span = IndexSpan::new(0, 1).with_offsets(0.25, 0.5);
        let seams: Vec<(usize, f32)> = partial.span.seams().to_vec();
        let resampled = curve.resample(10.0, &seams);

        let lod = LodSettings {
            strides: vec![1, 7],
            screen_heights: Vec::new(),
        };
        let mesh = extrude_lanes(&resampled, &[partial.clone()], &lod).unwrap();
        let lane_mesh = &mesh.lanes[0];
        let (full, reduced) = (&lane_mesh.lods[0], &lane_mesh.lods[1]);
        assert!(reduced.vertex_count() < full.vertex_count());
        assert_eq!(reduced.vertices.first(), full.vertices.first());
        assert_eq!(reduced.vertices.last(), full.vertices.last());

        // the lane starts exactly at its seam
        let start = curve.segment(0).unwrap().point(0.25);
        let first_center = (full.vertices[0] + full.vertices[1]) * 0.5;
        assert!((first_center - start).length() < 1e-4);

        // the segment start at point 1 survives the stride
        let anchor = curve.points[1].position;
        assert!(reduced
            .vertices
            .chunks(2)
            .any(|p| ((p[0] + p[1]) * 0.5 - anchor).length() < 1e-4));
    }

    #[test]
    fn test_flat_and_empty_lanes_are_skipped() {
        let resampled = straight(10.0).resample(10.0, &[]);
        let mut empty = lane(3.0);
        empty.span = IndexSpan::new(0, 0).with_offsets(0.5, 0.5);
        let lanes = vec![lane(0.0), empty, lane(2.0)];
        let mesh = extrude_lanes(&resampled, &lanes, &LodSettings::default()).unwrap();
        assert_eq!(mesh.lanes.len(), 1);
        assert_eq!(mesh.lanes[0].lane, 2);
    }

    #[test]
    fn test_missing_material_aborts() {
        let resampled = straight(10.0).resample(10.0, &[]);
        let mut bare = lane(3.0);
        bare.materials.clear();
        assert!(matches!(
            extrude_lanes(&resampled, &[bare], &LodSettings::default()),
            Err(RoadError::MissingAsset(_))
        ));
    }

    #[test]
    fn test_uv_follows_distance() {
        let resampled = straight(8.0).resample(10.0, &[]);
        let mut l = lane(2.0);
        l.uv.tiling = 0.5;
        let mesh = extrude_lanes(&resampled, &[l], &LodSettings::default()).unwrap();
        let lod0 = &mesh.lanes[0].lods[0];
        let last = lod0.uvs.len() - 1;
        assert!((lod0.uvs[last].y - 4.0).abs() < 1e-4);
        assert_eq!(lod0.uvs[0].x, 1.0);
        assert_eq!(lod0.uvs[1].x, 0.0);
    }

    #[test]
    fn test_extrusion_is_deterministic() {
        let curve = Curve::from_positions(&[Vec3::ZERO, Vec3::new(15.0, 1.0, 5.0), Vec3::new(30.0, 0.0, 0.0)]);
        let lanes = vec![lane(3.0), lane(3.0)];
        let a = extrude_lanes(&curve.resample(8.0, &[]), &lanes, &LodSettings::default()).unwrap();
        let b = extrude_lanes(&curve.resample(8.0, &[]), &lanes, &LodSettings::default()).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.carve_samples(None).len(), a.footprint.len());
    }
}
