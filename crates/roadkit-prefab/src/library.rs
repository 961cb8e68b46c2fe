//! Source meshes for prefab lines

use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use roadkit_core::{Result, RoadError};
use roadkit_road::MeshBuffers;
use serde::{Deserialize, Serialize};

/// A prefab's mesh in its local space: X across, Y up, Z along the path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrefabMesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u32>,
}

impl PrefabMesh {
    /// Axis-aligned box centered on the origin in X and Z, resting on y = 0.
    pub fn cuboid(size: Vec3) -> Self {
        let h = Vec3::new(size.x * 0.5, 0.0, size.z * 0.5);
        let lo = Vec3::new(-h.x, 0.0, -h.z);
        let hi = Vec3::new(h.x, size.y, h.z);
        let corner = |x: bool, y: bool, z: bool| {
            Vec3::new(
                if x { hi.x } else { lo.x },
                if y { hi.y } else { lo.y },
                if z { hi.z } else { lo.z },
            )
        };

        let mut mesh = Self::default();
        // four corners per face, counter-clockwise seen from outside
        let faces = [
            [corner(false, true, false), corner(false, true, true), corner(true, true, true), corner(true, true, false)],
            [corner(false, false, false), corner(true, false, false), corner(true, false, true), corner(false, false, true)],
            [corner(true, false, false), corner(true, true, false), corner(true, true, true), corner(true, false, true)],
            [corner(false, false, false), corner(false, false, true), corner(false, true, true), corner(false, true, false)],
            [corner(false, false, true), corner(true, false, true), corner(true, true, true), corner(false, true, true)],
            [corner(false, false, false), corner(false, true, false), corner(true, true, false), corner(true, false, false)],
        ];
        for quad in faces {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend_from_slice(&quad);
            mesh.uvs.extend_from_slice(&[
                Vec2::new(0.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
            ]);
            mesh.triangles
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }

    /// Turn placed vertex positions into mesh buffers with this prefab's
    /// UVs and triangles.
    pub fn to_buffers(&self, vertices: Vec<Vec3>) -> MeshBuffers {
        let mut mesh = MeshBuffers {
            vertices,
            uvs: self.uvs.clone(),
            triangles: self.triangles.clone(),
            ..Default::default()
        };
        if mesh.uvs.len() != mesh.vertices.len() {
            mesh.uvs = vec![Vec2::ZERO; mesh.vertices.len()];
        }
        mesh.recalculate_normals();
        mesh.recalculate_tangents();
        mesh
    }
}

/// Authored prefab description as stored in project files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PrefabDef {
    Box { size: Vec3 },
}

impl PrefabDef {
    pub fn build(&self) -> PrefabMesh {
        match self {
            PrefabDef::Box { size } => PrefabMesh::cuboid(*size),
        }
    }
}

/// Named prefab meshes available to prefab lines.
#[derive(Debug, Clone, Default)]
pub struct PrefabLibrary {
    meshes: BTreeMap<String, PrefabMesh>,
}

impl PrefabLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, mesh: PrefabMesh) {
        self.meshes.insert(name.into(), mesh);
    }

    pub fn get(&self, name: &str) -> Result<&PrefabMesh> {
        self.meshes
            .get(name)
            .ok_or_else(|| RoadError::MissingAsset(format!("prefab '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_faces_point_outward() {
        let mesh = PrefabMesh::cuboid(Vec3::new(2.0, 1.0, 4.0));
        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-1.0, 0.0, -2.0));
        assert_eq!(hi, Vec3::new(1.0, 1.0, 2.0));

        let center = Vec3::new(0.0, 0.5, 0.0);
        for tri in mesh.triangles.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.vertices[tri[i] as usize]);
            let normal = (b - a).cross(c - a);
            let mid = (a + b + c) / 3.0;
            assert!(normal.dot(mid - center) > 0.0);
        }
    }

    #[test]
    fn test_missing_prefab_is_an_asset_error() {
        let mut library = PrefabLibrary::new();
        library.insert("post", PrefabMesh::cuboid(Vec3::ONE));
        assert!(library.get("post").is_ok());
        assert!(matches!(library.get("lamp"), Err(RoadError::MissingAsset(_))));
    }

    #[test]
    fn test_prefab_def_from_toml() {
        let def: PrefabDef = toml::from_str("shape = \"box\"\nsize = [0.2, 1.0, 2.0]").unwrap();
        assert_eq!(def.build().vertices.len(), 24);
    }
}
