//! Terrain collaborator interfaces and the grid-backed terrain

use glam::{Vec2, Vec3};
use roadkit_core::{Result, RoadError};
use serde::{Deserialize, Serialize};

use crate::heightmap::Heightmap;

/// World placement of a height grid.
///
/// The grid covers `origin.x..origin.x + size.x` and
/// `origin.z..origin.z + size.z`; a normalized height `h` maps to world
/// `origin.y + h * size.y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainBounds {
    pub origin: Vec3,
    pub size: Vec3,
}

impl TerrainBounds {
    pub fn new(origin: Vec3, size: Vec3) -> Self {
        Self { origin, size }
    }

    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x >= self.origin.x
            && x <= self.origin.x + self.size.x
            && z >= self.origin.z
            && z <= self.origin.z + self.size.z
    }

    pub fn to_world_height(&self, normalized: f32) -> f32 {
        self.origin.y + normalized * self.size.y
    }

    pub fn to_normalized_height(&self, world: f32) -> f32 {
        if self.size.y.abs() <= f32::EPSILON {
            0.0
        } else {
            (world - self.origin.y) / self.size.y
        }
    }
}

/// Downward height query used to bend geometry onto the ground.
///
/// Implementors must not report hits on generated road, intersection or
/// prefab-line surfaces; only the ground those are conformed to.
pub trait HeightProbe: Sync {
    /// Height of the first surface hit by a ray cast straight down from
    /// `origin`, or `None` when nothing is below it.
    fn probe_down(&self, origin: Vec3) -> Option<f32>;
}

/// Read/write access to a terrain's height grid.
pub trait TerrainSurface {
    fn heightmap(&self) -> &Heightmap;
    fn set_heightmap(&mut self, heightmap: Heightmap) -> Result<()>;
    fn bounds(&self) -> TerrainBounds;

    fn resolution(&self) -> (u32, u32) {
        let hm = self.heightmap();
        (hm.width, hm.depth)
    }
}

/// A height grid terrain that remembers the last committed state.
///
/// Carving always starts from `original`, so re-running a deformation with
/// no intervening edit reproduces the same grid.
#[derive(Debug, Clone)]
pub struct GridTerrain {
    current: Heightmap,
    original: Heightmap,
    bounds: TerrainBounds,
}

impl GridTerrain {
    pub fn new(heightmap: Heightmap, bounds: TerrainBounds) -> Self {
        Self {
            original: heightmap.clone(),
            current: heightmap,
            bounds,
        }
    }

    pub fn original(&self) -> &Heightmap {
        &self.original
    }

    #[cfg(test)]
    pub(crate) fn current_mut(&mut self) -> &mut Heightmap {
        &mut self.current
    }

    /// Size of one grid cell in world units along X and Z.
    pub fn cell_size(&self) -> Vec2 {
        Vec2::new(
            self.bounds.size.x / (self.current.width - 1) as f32,
            self.bounds.size.z / (self.current.depth - 1) as f32,
        )
    }

    /// Continuous grid coordinates of a world XZ position.
    pub fn world_to_grid(&self, x: f32, z: f32) -> Vec2 {
        let cell = self.cell_size();
        Vec2::new(
            (x - self.bounds.origin.x) / cell.x,
            (z - self.bounds.origin.z) / cell.y,
        )
    }

    /// World XZ position of grid sample `(gx, gz)`; `y` is zero.
    pub fn grid_to_world(&self, gx: u32, gz: u32) -> Vec3 {
        let cell = self.cell_size();
        Vec3::new(
            self.bounds.origin.x + gx as f32 * cell.x,
            0.0,
            self.bounds.origin.z + gz as f32 * cell.y,
        )
    }

    /// World height at XZ, `None` outside the terrain.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        self.sample_world(&self.current, x, z)
    }

    /// World height of the committed grid at XZ.
    pub fn original_height_at(&self, x: f32, z: f32) -> Option<f32> {
        self.sample_world(&self.original, x, z)
    }

    /// Probe that only sees the committed grid, ignoring uncommitted carving.
    pub fn committed(&self) -> CommittedGround<'_> {
        CommittedGround(self)
    }

    fn sample_world(&self, heightmap: &Heightmap, x: f32, z: f32) -> Option<f32> {
        if !self.bounds.contains_xz(x, z) {
            return None;
        }
        let u = (x - self.bounds.origin.x) / self.bounds.size.x;
        let v = (z - self.bounds.origin.z) / self.bounds.size.z;
        Some(self.bounds.to_world_height(heightmap.sample(u, v)))
    }
}

impl HeightProbe for GridTerrain {
    fn probe_down(&self, origin: Vec3) -> Option<f32> {
        self.height_at(origin.x, origin.z).filter(|h| *h <= origin.y)
    }
}

/// See [`GridTerrain::committed`].
#[derive(Debug, Clone, Copy)]
pub struct CommittedGround<'a>(&'a GridTerrain);

impl HeightProbe for CommittedGround<'_> {
    fn probe_down(&self, origin: Vec3) -> Option<f32> {
        self.0
            .original_height_at(origin.x, origin.z)
            .filter(|h| *h <= origin.y)
    }
}

impl TerrainSurface for GridTerrain {
    fn heightmap(&self) -> &Heightmap {
        &self.current
    }

    fn set_heightmap(&mut self, heightmap: Heightmap) -> Result<()> {
        if heightmap.width != self.current.width || heightmap.depth != self.current.depth {
            return Err(RoadError::ConfigError(format!(
                "heightmap resolution {}x{} does not match terrain {}x{}",
                heightmap.width, heightmap.depth, self.current.width, self.current.depth
            )));
        }
        self.current = heightmap;
        Ok(())
    }

    fn bounds(&self) -> TerrainBounds {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain() -> GridTerrain {
        GridTerrain::new(
            Heightmap::flat(11, 11, 0.5).unwrap(),
            TerrainBounds::new(Vec3::new(-50.0, -10.0, -50.0), Vec3::new(100.0, 40.0, 100.0)),
        )
    }

    #[test]
    fn test_world_height_sampling() {
        let t = terrain();
        let h = t.height_at(0.0, 0.0).unwrap();
        assert!((h - 10.0).abs() < 1e-4);
        assert!(t.height_at(60.0, 0.0).is_none());
    }

    #[test]
    fn test_probe_misses_from_below() {
        let t = terrain();
        assert_eq!(t.probe_down(Vec3::new(0.0, 100.0, 0.0)), Some(10.0));
        assert_eq!(t.probe_down(Vec3::new(0.0, 5.0, 0.0)), None);
    }

    #[test]
    fn test_grid_world_conversion() {
        let t = terrain();
        assert_eq!(t.cell_size(), Vec2::new(10.0, 10.0));
        let p = t.grid_to_world(5, 5);
        assert_eq!(p, Vec3::ZERO);
        assert_eq!(t.world_to_grid(p.x, p.z), Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_committed_ground_ignores_edits() {
        let mut t = terrain();
        t.current_mut().set(1, 1, 0.9);
        assert_eq!(t.original().get(1, 1), 0.5);

        let probe = Vec3::new(-40.0, 100.0, -40.0);
        assert!((t.committed().probe_down(probe).unwrap() - 10.0).abs() < 1e-4);
        assert!((t.probe_down(probe).unwrap() - 26.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_heightmap_checks_resolution() {
        let mut t = terrain();
        assert!(t.set_heightmap(Heightmap::flat(4, 4, 0.0).unwrap()).is_err());
    }
}
