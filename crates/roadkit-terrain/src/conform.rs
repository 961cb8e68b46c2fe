//! Mesh-to-terrain bending.
//!
//! Each vertex is probed straight down from `probe_height` above it and
//! moved onto the ground (plus `offset`). A vertex whose probe hits nothing
//! keeps its height.

use glam::Vec3;
use roadkit_core::parallel::{transform_vertices, VertexTransform};
use serde::{Deserialize, Serialize};

use crate::terrain::HeightProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformMode {
    /// Every vertex follows the ground
    #[default]
    Full,
    /// Only vertices near the bottom of the local mesh follow the ground
    OnlyBottom,
    /// The bottom follows the ground, the top keeps its height and
    /// everything between stretches along the local vertical axis
    BridgePillar,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConformSettings {
    pub mode: ConformMode,
    /// Added to the probed ground height
    pub offset: f32,
    /// Probes start this far above the vertex
    pub probe_height: f32,
    /// `OnlyBottom` bends vertices within this distance of the lowest local y
    pub bottom_threshold: f32,
}

impl Default for ConformSettings {
    fn default() -> Self {
        Self {
            mode: ConformMode::Full,
            offset: 0.02,
            probe_height: 100.0,
            bottom_threshold: 0.01,
        }
    }
}

/// Stateless per-vertex terrain bend.
pub struct ConformTransform<'a, P: HeightProbe + ?Sized> {
    probe: &'a P,
    settings: ConformSettings,
    min_local_y: f32,
    max_local_y: f32,
}

impl<'a, P: HeightProbe + ?Sized> ConformTransform<'a, P> {
    /// Build a transform for a mesh whose local vertical extent is
    /// `min_local_y..=max_local_y`.
    pub fn new(probe: &'a P, settings: ConformSettings, min_local_y: f32, max_local_y: f32) -> Self {
        Self {
            probe,
            settings,
            min_local_y,
            max_local_y,
        }
    }

    fn ground(&self, world: Vec3) -> Option<f32> {
        let origin = world + Vec3::Y * self.settings.probe_height;
        self.probe
            .probe_down(origin)
            .filter(|h| h.is_finite())
            .map(|h| h + self.settings.offset)
    }
}

impl<P: HeightProbe + ?Sized> VertexTransform for ConformTransform<'_, P> {
    fn apply(&self, world: Vec3, local: Vec3) -> Vec3 {
        match self.settings.mode {
            ConformMode::Full => match self.ground(world) {
                Some(h) => Vec3::new(world.x, h, world.z),
                None => world,
            },
            ConformMode::OnlyBottom => {
                if local.y - self.min_local_y > self.settings.bottom_threshold {
                    return world;
                }
                match self.ground(world) {
                    Some(h) => Vec3::new(world.x, h, world.z),
                    None => world,
                }
            }
            ConformMode::BridgePillar => {
                let Some(h) = self.ground(world) else {
                    return world;
                };
                let extent = self.max_local_y - self.min_local_y;
                if extent <= f32::EPSILON {
                    return Vec3::new(world.x, h, world.z);
                }
                let t = ((local.y - self.min_local_y) / extent).clamp(0.0, 1.0);
                Vec3::new(world.x, h + (world.y - h) * t, world.z)
            }
        }
    }
}

/// Bend a vertex buffer onto the terrain.
///
/// `local` holds the pre-placement positions used for the vertical extent
/// (`OnlyBottom`, `BridgePillar`); pass an empty slice to use `world`.
pub fn conform_vertices<P: HeightProbe + ?Sized>(
    probe: &P,
    world: &[Vec3],
    local: &[Vec3],
    settings: ConformSettings,
) -> Vec<Vec3> {
    let reference = if local.is_empty() { world } else { local };
    let (min_y, max_y) = reference
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.y), hi.max(v.y)));
    if min_y > max_y {
        return Vec::new();
    }
    let transform = ConformTransform::new(probe, settings, min_y, max_y);
    transform_vertices(&transform, world, local)
}
