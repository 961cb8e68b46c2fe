//! Road surface footprint rasterisation.
//!
//! Terrain cells that lie directly under a generated road or intersection
//! surface snap to that surface's height instead of the falloff formula.
//! The footprint answers "what is the surface height above this XZ
//! position" by bucketing triangles in a coarse XZ grid.

use glam::{Vec2, Vec3};
use std::collections::HashMap;

const DEFAULT_BUCKET_SIZE: f32 = 4.0;

/// Triangles projected to the ground plane, queryable by XZ position.
#[derive(Debug, Clone)]
pub struct SurfaceFootprint {
    bucket_size: f32,
    triangles: Vec<[Vec3; 3]>,
    buckets: HashMap<(i32, i32), Vec<usize>>,
}

impl Default for SurfaceFootprint {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SIZE)
    }
}

impl SurfaceFootprint {
    pub fn new(bucket_size: f32) -> Self {
        Self {
            bucket_size: bucket_size.max(0.1),
            triangles: Vec::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Add an indexed triangle mesh. Out-of-range indices are ignored.
    pub fn add_mesh(&mut self, vertices: &[Vec3], triangles: &[u32]) {
        for tri in triangles.chunks_exact(3) {
            let fetch = |i: u32| vertices.get(i as usize).copied();
            let (Some(a), Some(b), Some(c)) = (fetch(tri[0]), fetch(tri[1]), fetch(tri[2])) else {
                continue;
            };
            if triangle_area_xz(a, b, c).abs() <= 1e-8 {
                continue;
            }
            let index = self.triangles.len();
            self.triangles.push([a, b, c]);

            let min_x = a.x.min(b.x).min(c.x);
            let max_x = a.x.max(b.x).max(c.x);
            let min_z = a.z.min(b.z).min(c.z);
            let max_z = a.z.max(b.z).max(c.z);
            let (bx0, bz0) = self.bucket_of(min_x, min_z);
            let (bx1, bz1) = self.bucket_of(max_x, max_z);
            for bx in bx0..=bx1 {
                for bz in bz0..=bz1 {
                    self.buckets.entry((bx, bz)).or_default().push(index);
                }
            }
        }
    }

    /// Highest surface height directly above/below `(x, z)`.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let bucket = self.buckets.get(&self.bucket_of(x, z))?;
        let p = Vec2::new(x, z);
        bucket
            .iter()
            .filter_map(|&i| {
                let [a, b, c] = self.triangles[i];
                barycentric_xz(p, a, b, c).map(|(u, v, w)| a.y * u + b.y * v + c.y * w)
            })
            .reduce(f32::max)
    }

    fn bucket_of(&self, x: f32, z: f32) -> (i32, i32) {
        (
            (x / self.bucket_size).floor() as i32,
            (z / self.bucket_size).floor() as i32,
        )
    }
}

fn triangle_area_xz(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    (b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)
}

fn barycentric_xz(p: Vec2, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    let area = triangle_area_xz(a, b, c);
    if area.abs() <= 1e-8 {
        return None;
    }
    let pa = Vec3::new(p.x, 0.0, p.y);
    let u = triangle_area_xz(pa, b, c) / area;
    let v = triangle_area_xz(a, pa, c) / area;
    let w = 1.0 - u - v;
    const EDGE: f32 = -1e-5;
    (u >= EDGE && v >= EDGE && w >= EDGE).then_some((u, v, w))
}
