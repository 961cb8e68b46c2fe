//! Prefab lines: instancing and deforming prefab meshes at their placements.
//!
//! Bent objects are spun about Y within the rotation arc, then stretched
//! along the curve so their mesh spans exactly `[start_time, end_time]`;
//! rigid objects are rotated about Y and dropped at the main point. Either
//! can then be bent onto the terrain.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roadkit_core::parallel::{transform_in_place, transform_vertices, VertexTransform};
use roadkit_core::{ContentHash, IndexSpan, Result, RoadError};
use roadkit_road::{MeshBuffers, ResampledCurve};
use roadkit_terrain::{conform_vertices, ConformSettings, HeightProbe};
use serde::{Deserialize, Serialize};

use crate::library::PrefabLibrary;
use crate::placement::{compute_placements, CurveWindow, DirectionMode, PlacementRecord, PlacementSettings};

/// An authored line of prefabs along a curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabLine {
    pub prefab: String,
    /// Random yaw range in degrees, centered on the facing direction
    #[serde(default)]
    pub rotation_arc: f32,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    /// Per-axis random scale amplitude as a fraction of `scale`
    #[serde(default)]
    pub scale_jitter: Vec3,
    /// Stretch each object along the curve
    #[serde(default = "default_true")]
    pub bend_to_curve: bool,
    /// Along-path length; defaults to the scaled mesh extent
    #[serde(default)]
    pub footprint: Option<f32>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub span: IndexSpan,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub direction: DirectionMode,
    #[serde(default)]
    pub conform: Option<ConformSettings>,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

fn default_true() -> bool {
    true
}

impl PrefabLine {
    pub fn new(prefab: impl Into<String>, span: IndexSpan) -> Self {
        Self {
            prefab: prefab.into(),
            span,
            placement: PlacementSettings::default(),
            direction: DirectionMode::Travel,
            rotation_arc: 0.0,
            scale: Vec3::ONE,
            scale_jitter: Vec3::ZERO,
            bend_to_curve: true,
            footprint: None,
            conform: None,
            seed: 0,
        }
    }
}

/// One instanced prefab.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub record: PlacementRecord,
    /// Yaw in radians; for bent objects, the spin applied before bending
    pub yaw: f32,
    pub scale: Vec3,
    pub mesh: MeshBuffers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefabLineOutput {
    pub objects: Vec<PlacedObject>,
}

impl PrefabLineOutput {
    pub fn records(&self) -> impl Iterator<Item = &PlacementRecord> {
        self.objects.iter().map(|o| &o.record)
    }

    pub fn fingerprint(&self) -> ContentHash {
        let mut hasher = ContentHash::builder();
        for object in &self.objects {
            hasher.bytes(object.mesh.fingerprint().as_bytes());
        }
        hasher.finish()
    }
}

/// Maps a mesh's along-path axis onto an arc-length interval.
pub struct CurveBend<'a> {
    window: &'a CurveWindow,
    start_time: f32,
    end_time: f32,
    along_min: f32,
    along_extent: f32,
    lateral_offset: f32,
    scale: Vec3,
    /// Along-path axis is local X instead of local Z
    perpendicular: bool,
}

impl VertexTransform for CurveBend<'_> {
    fn apply(&self, _world: Vec3, local: Vec3) -> Vec3 {
        // Local +X maps to the path's left in travel mode; in perpendicular
        // mode X runs along the path and +Z points right.
        let (along, across) = if self.perpendicular {
            (local.x, -local.z * self.scale.z)
        } else {
            (local.z, local.x * self.scale.x)
        };
        let f = ((along - self.along_min) / self.along_extent).clamp(0.0, 1.0);
        let frame = self
            .window
            .frame_at(self.start_time + (self.end_time - self.start_time) * f);
        frame.position + frame.left * (across + self.lateral_offset) + Vec3::Y * (local.y * self.scale.y)
    }
}

/// Scale, yaw and translate to the main point.
pub struct RigidPlacement {
    origin: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl VertexTransform for RigidPlacement {
    fn apply(&self, _world: Vec3, local: Vec3) -> Vec3 {
        self.origin + self.rotation * (local * self.scale)
    }
}

/// Place and deform every object of `line`.
///
/// Fails with `MissingAsset` when the prefab is unknown or has no
/// vertices. Without a probe, terrain conforming is skipped.
pub fn generate_prefab_line(
    curve: &ResampledCurve,
    line: &PrefabLine,
    library: &PrefabLibrary,
    probe: Option<&dyn HeightProbe>,
) -> Result<PrefabLineOutput> {
    let prefab = library.get(&line.prefab)?;
    let (lo, hi) = prefab
        .bounds()
        .ok_or_else(|| RoadError::MissingAsset(format!("prefab '{}' has no vertices", line.prefab)))?;

    let perpendicular = line.direction == DirectionMode::Perpendicular;
    let along_axis = |lo: Vec3, hi: Vec3| if perpendicular { (lo.x, hi.x - lo.x) } else { (lo.z, hi.z - lo.z) };
    let (_, along_extent) = along_axis(lo, hi);
    let along_scale = if perpendicular { line.scale.x } else { line.scale.z };
    let footprint = line.footprint.unwrap_or(along_extent * along_scale.abs());

    let mut rng = ChaCha8Rng::seed_from_u64(line.seed);
    let window = CurveWindow::new(curve);
    let records = compute_placements(curve, &window, &line.span, &line.placement, footprint, &mut rng);

    let bend = line.bend_to_curve
        && along_extent > f32::EPSILON
        && !matches!(line.direction, DirectionMode::Fixed { .. });

    let mut output = PrefabLineOutput::default();
    for record in records {
        let scale = line.scale * (Vec3::ONE + line.scale_jitter * jitter(&mut rng));
        let spin = arc_offset(line, &mut rng);
        let (yaw, world) = if bend {
            let local = spun(&prefab.vertices, spin, (lo + hi) * 0.5);
            let (along_min, along_extent) = match vertex_bounds(&local) {
                Some((a, b)) if along_axis(a, b).1 > f32::EPSILON => along_axis(a, b),
                _ => along_axis(lo, hi),
            };
            let transform = CurveBend {
                window: &window,
                start_time: record.start_time,
                end_time: record.end_time,
                along_min,
                along_extent,
                lateral_offset: record.lateral_offset,
                scale,
                perpendicular,
            };
            (spin, transform_vertices(&transform, &local, &[]))
        } else {
            let yaw = base_yaw(line, &window, &record) + spin;
            let transform = RigidPlacement {
                origin: record.main_point,
                rotation: Quat::from_rotation_y(yaw),
                scale,
            };
            (yaw, transform_vertices(&transform, &prefab.vertices, &[]))
        };
        let world = match (line.conform, probe) {
            (Some(settings), Some(probe)) => conform_vertices(probe, &world, &prefab.vertices, settings),
            _ => world,
        };
        output.objects.push(PlacedObject {
            record,
            yaw,
            scale,
            mesh: prefab.to_buffers(world),
        });
    }
    log::debug!("placed {} '{}' objects", output.objects.len(), line.prefab);
    Ok(output)
}

/// Per-axis factor in `[-1, 1]`.
fn jitter(rng: &mut ChaCha8Rng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
        rng.gen_range(-1.0..=1.0),
    )
}

/// Random yaw inside the rotation arc, zero without an arc.
fn arc_offset(line: &PrefabLine, rng: &mut ChaCha8Rng) -> f32 {
    let arc = line.rotation_arc.abs().to_radians();
    if arc > f32::EPSILON {
        rng.gen_range(-arc * 0.5..=arc * 0.5)
    } else {
        0.0
    }
}

fn base_yaw(line: &PrefabLine, window: &CurveWindow, record: &PlacementRecord) -> f32 {
    let forward = window.frame_at(record.main_time()).forward;
    let heading = forward.x.atan2(forward.z);
    match line.direction {
        DirectionMode::Travel => heading,
        DirectionMode::Perpendicular => heading + std::f32::consts::FRAC_PI_2,
        DirectionMode::Fixed { yaw } => yaw.to_radians(),
    }
}

/// Local vertices rotated by `yaw` about the vertical axis through `pivot`.
fn spun(vertices: &[Vec3], yaw: f32, pivot: Vec3) -> Vec<Vec3> {
    let mut local = vertices.to_vec();
    if yaw != 0.0 {
        let rotation = Quat::from_rotation_y(yaw);
        let pivot = Vec3::new(pivot.x, 0.0, pivot.z);
        transform_in_place(&|w: Vec3, _l: Vec3| pivot + rotation * (w - pivot), &mut local);
    }
    local
}

fn vertex_bounds(vertices: &[Vec3]) -> Option<(Vec3, Vec3)> {
    vertices.iter().fold(None, |acc, &v| {
        Some(acc.map_or((v, v), |(lo, hi): (Vec3, Vec3)| (lo.min(v), hi.max(v))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::PrefabMesh;
    use roadkit_road::{AnchorPoint, Curve};
    use roadkit_terrain::ConformMode;

    fn straight(length: f32) -> ResampledCurve {
        Curve::new(vec![
            AnchorPoint::new(Vec3::ZERO),
            AnchorPoint::new(Vec3::new(length, 0.0, 0.0)),
        ])
        .resample(10.0, &[])
    }

    fn library() -> PrefabLibrary {
        let mut library = PrefabLibrary::new();
        library.insert("block", PrefabMesh::cuboid(Vec3::new(1.0, 1.0, 2.0)));
        library
    }

    #[test]
    fn test_bent_blocks_span_their_interval() {
        let line = PrefabLine::new("block", IndexSpan::new(0, 0));
        let out = generate_prefab_line(&straight(10.0), &line, &library(), None).unwrap();
        assert_eq!(out.objects.len(), 5);

        for (i, object) in out.objects.iter().enumerate() {
            let (lo, hi) = object.mesh.bounds().unwrap();
            assert!((lo.x - i as f32 * 2.0).abs() < 1e-3);
            assert!((hi.x - (i as f32 * 2.0 + 2.0)).abs() < 1e-3);
            // local X maps to the left of travel (-Z)
            assert!((lo.z + 0.5).abs() < 1e-3 && (hi.z - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_fixed_direction_is_rigid() {
        let mut line = PrefabLine::new("block", IndexSpan::new(0, 0));
        line.direction = DirectionMode::Fixed { yaw: 0.0 };
        line.scale = Vec3::new(2.0, 1.0, 1.0);
        let out = generate_prefab_line(&straight(10.0), &line, &library(), None).unwrap();
        let first = &out.objects[0];
        assert_eq!(first.yaw, 0.0);
        let (lo, hi) = first.mesh.bounds().unwrap();
        let main = first.record.main_point;
        assert!((lo - (main + Vec3::new(-1.0, 0.0, -1.0))).length() < 1e-4);
        assert!((hi - (main + Vec3::new(1.0, 1.0, 1.0))).length() < 1e-4);
    }

    #[test]
    fn test_rigid_objects_face_travel() {
        let mut line = PrefabLine::new("block", IndexSpan::new(0, 0));
        line.bend_to_curve = false;
        let out = generate_prefab_line(&straight(10.0), &line, &library(), None).unwrap();
        let first = &out.objects[0];
        assert!((first.yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        // the 2-unit long axis now runs along X
        let (lo, hi) = first.mesh.bounds().unwrap();
        assert!((hi.x - lo.x - 2.0).abs() < 1e-4);
    }

    struct Plateau;

    impl HeightProbe for Plateau {
        fn probe_down(&self, origin: Vec3) -> Option<f32> {
            (origin.y >= 3.0).then_some(3.0)
        }
    }

    #[test]
    fn test_conform_moves_bottom_onto_ground() {
        let mut line = PrefabLine::new("block", IndexSpan::new(0, 0));
        line.conform = Some(ConformSettings {
            mode: ConformMode::OnlyBottom,
            offset: 0.0,
            ..Default::default()
        });
        let out = generate_prefab_line(&straight(4.0), &line, &library(), Some(&Plateau)).unwrap();
        let (lo, hi) = out.objects[0].mesh.bounds().unwrap();
        // the top stays put, the bottom lands on the plateau
        assert!((lo.y - 1.0).abs() < 1e-4);
        assert_eq!(hi.y, 3.0);
        let bottoms = out.objects[0].mesh.vertices.iter().filter(|v| v.y == 3.0).count();
        assert!(bottoms > 0);
    }

    #[test]
    fn test_random_rotation_is_reproducible() {
        let mut line = PrefabLine::new("block", IndexSpan::new(0, 0));
        line.bend_to_curve = false;
        line.rotation_arc = 90.0;
        line.scale_jitter = Vec3::splat(0.2);
        line.seed = 7;
        let a = generate_prefab_line(&straight(20.0), &line, &library(), None).unwrap();
        let b = generate_prefab_line(&straight(20.0), &line, &library(), None).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        for object in &a.objects {
            let offset = object.yaw - std::f32::consts::FRAC_PI_2;
            assert!(offset.abs() <= std::f32::consts::FRAC_PI_4 + 1e-5);
        }
    }

    #[test]
    fn test_rotation_arc_spins_bent_objects() {
        let mut line = PrefabLine::new("block", IndexSpan::new(0, 0));
        line.seed = 7;
        let straight_on = generate_prefab_line(&straight(10.0), &line, &library(), None).unwrap();
        line.rotation_arc = 90.0;
        let spun = generate_prefab_line(&straight(10.0), &line, &library(), None).unwrap();
        assert_ne!(straight_on.fingerprint(), spun.fingerprint());
        assert_eq!(spun.objects.len(), straight_on.objects.len());

        assert!(spun.objects.iter().any(|o| o.yaw.abs() > 1e-3));
        for object in &spun.objects {
            assert!(object.yaw.abs() <= std::f32::consts::FRAC_PI_4 + 1e-5);
            // still stretched over exactly its interval
            let (lo, hi) = object.mesh.bounds().unwrap();
            assert!((lo.x - object.record.start_time).abs() < 1e-3);
            assert!((hi.x - object.record.end_time).abs() < 1e-3);
        }
    }

    #[test]
    fn test_unknown_prefab_fails() {
        let line = PrefabLine::new("lamp", IndexSpan::new(0, 0));
        assert!(matches!(
            generate_prefab_line(&straight(10.0), &line, &library(), None),
            Err(RoadError::MissingAsset(_))
        ));
    }
}
