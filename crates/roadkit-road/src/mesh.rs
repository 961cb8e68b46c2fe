//! Generated mesh buffers and the road collider

use glam::{Vec2, Vec3, Vec4};
use roadkit_core::ContentHash;

/// Vertex, UV and index buffers for one lane at one LOD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffers {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle list, counter-clockwise seen from the front face
    pub triangles: Vec<u32>,
    pub normals: Vec<Vec3>,
    /// xyz tangent, w handedness (±1)
    pub tangents: Vec<Vec4>,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.uvs.clear();
        self.triangles.clear();
        self.normals.clear();
        self.tangents.clear();
    }

    /// Append a vertex; returns its index.
    pub fn push_vertex(&mut self, position: Vec3, uv: Vec2) -> u32 {
        self.vertices.push(position);
        self.uvs.push(uv);
        (self.vertices.len() - 1) as u32
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.triangles.extend_from_slice(&[a, b, c]);
    }

    /// Area-weighted vertex normals.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let face = (self.vertices[b] - self.vertices[a]).cross(self.vertices[c] - self.vertices[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
            .collect();
    }

    /// UV-derived tangents. Requires normals.
    pub fn recalculate_tangents(&mut self) {
        let count = self.vertices.len();
        let mut tan = vec![Vec3::ZERO; count];
        let mut bitan = vec![Vec3::ZERO; count];
        for tri in self.triangles.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let e1 = self.vertices[b] - self.vertices[a];
            let e2 = self.vertices[c] - self.vertices[a];
            let d1 = self.uvs[b] - self.uvs[a];
            let d2 = self.uvs[c] - self.uvs[a];
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() <= 1e-12 {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (e1 * d2.y - e2 * d1.y) * r;
            let tdir = (e2 * d1.x - e1 * d2.x) * r;
            for i in [a, b, c] {
                tan[i] += sdir;
                bitan[i] += tdir;
            }
        }

        if self.normals.len() != count {
            self.recalculate_normals();
        }
        self.tangents = (0..count)
            .map(|i| {
                let n = self.normals[i];
                let t = (tan[i] - n * n.dot(tan[i]))
                    .try_normalize()
                    .unwrap_or_else(|| n.any_orthonormal_vector());
                let w = if n.cross(t).dot(bitan[i]) < 0.0 { -1.0 } else { 1.0 };
                t.extend(w)
            })
            .collect();
    }

    /// Axis-aligned bounds, `None` when empty.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
        )
    }

    /// Content fingerprint of every buffer.
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::builder()
            .vec3s(&self.vertices)
            .vec2s(&self.uvs)
            .u32s(&self.triangles)
            .vec3s(&self.normals)
            .vec4s(&self.tangents)
            .finish()
    }
}

/// Triangle soup for physics, merged from every lane's LOD 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColliderMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl ColliderMesh {
    pub fn append(&mut self, mesh: &MeshBuffers) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&mesh.vertices);
        self.triangles.extend(
            mesh.triangles
                .chunks_exact(3)
                .map(|t| [base + t[0], base + t[1], base + t[2]]),
        );
    }

    pub fn flat_indices(&self) -> Vec<u32> {
        self.triangles.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit quad in the ground plane facing up.
    fn quad() -> MeshBuffers {
        let mut m = MeshBuffers::new();
        let a = m.push_vertex(Vec3::new(0.0, 0.0, 1.0), Vec2::new(1.0, 0.0));
        let b = m.push_vertex(Vec3::new(0.0, 0.0, 0.0), Vec2::new(0.0, 0.0));
        let c = m.push_vertex(Vec3::new(1.0, 0.0, 1.0), Vec2::new(1.0, 1.0));
        let d = m.push_vertex(Vec3::new(1.0, 0.0, 0.0), Vec2::new(0.0, 1.0));
        m.push_triangle(a, c, b);
        m.push_triangle(b, c, d);
        m
    }

    #[test]
    fn test_normals_face_up() {
        let mut m = quad();
        m.recalculate_normals();
        assert!(m.normals.iter().all(|n| (*n - Vec3::Y).length() < 1e-6));
    }

    #[test]
    fn test_tangents_are_unit_and_handed() {
        let mut m = quad();
        m.recalculate_normals();
        m.recalculate_tangents();
        assert_eq!(m.tangents.len(), 4);
        for t in &m.tangents {
            assert!((t.truncate().length() - 1.0).abs() < 1e-5);
            assert!(t.w == 1.0 || t.w == -1.0);
        }
    }

    #[test]
    fn test_collider_offsets_indices() {
        let m = quad();
        let mut collider = ColliderMesh::default();
        collider.append(&m);
        collider.append(&m);
        assert_eq!(collider.vertices.len(), 8);
        assert_eq!(collider.triangles[2], [4, 6, 5]);
        assert_eq!(collider.flat_indices().len(), 12);
    }

    #[test]
    fn test_fingerprint_changes_with_geometry() {
        let a = quad();
        let mut b = quad();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.vertices[0].y = 0.1;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
