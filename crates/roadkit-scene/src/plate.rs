//! A flat disc intersection joining road ends.
//!
//! Stands in for full intersection geometry: the node is a polygon fan
//! centered on the mean of its connected road ends. It is enough to carry
//! the connection contract and to give terrain carving a surface to snap to.

use glam::{Vec2, Vec3};
use roadkit_core::{ObjectId, Result};
use roadkit_road::{ConnectionEnd, ConnectionRecord, Intersection, LaneRange, MeshBuffers};
use std::collections::BTreeMap;

const PLATE_SIDES: u32 = 16;

pub struct PlateIntersection {
    id: ObjectId,
    radius: f32,
    connections: BTreeMap<(ObjectId, ConnectionEnd), ConnectionRecord>,
    surface: Option<MeshBuffers>,
}

impl PlateIntersection {
    pub fn new(id: ObjectId, radius: f32) -> Self {
        Self {
            id,
            radius: radius.max(0.0),
            connections: BTreeMap::new(),
            surface: None,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn center(&self) -> Option<Vec3> {
        if self.connections.is_empty() {
            return None;
        }
        let sum: Vec3 = self.connections.values().map(|r| r.position).sum();
        Some(sum / self.connections.len() as f32)
    }

    fn build_surface(&self, center: Vec3) -> MeshBuffers {
        let mut mesh = MeshBuffers::new();
        let hub = mesh.push_vertex(center, Vec2::splat(0.5));
        for i in 0..PLATE_SIDES {
            let angle = i as f32 / PLATE_SIDES as f32 * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            mesh.push_vertex(
                center + Vec3::new(cos, 0.0, sin) * self.radius,
                Vec2::new(0.5 + cos * 0.5, 0.5 + sin * 0.5),
            );
        }
        for i in 0..PLATE_SIDES {
            let a = hub + 1 + i;
            let b = hub + 1 + (i + 1) % PLATE_SIDES;
            mesh.push_triangle(hub, b, a);
        }
        mesh.recalculate_normals();
        mesh.recalculate_tangents();
        mesh
    }
}

impl Intersection for PlateIntersection {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn regenerate(&mut self, update_terrain: bool, update_details: bool) -> Result<()> {
        self.surface = match self.center() {
            Some(center) if self.radius > f32::EPSILON => Some(self.build_surface(center)),
            _ => None,
        };
        log::debug!(
            "plate {} regenerated with {} connections (terrain: {}, details: {})",
            self.id,
            self.connections.len(),
            update_terrain,
            update_details
        );
        Ok(())
    }

    fn connect(&mut self, road: ObjectId, record: ConnectionRecord) {
        self.connections.insert((road, record.end), record);
    }

    fn disconnect(&mut self, road: ObjectId, end: ConnectionEnd) {
        self.connections.remove(&(road, end));
    }

    fn connected_lanes(&self, road: ObjectId) -> Vec<LaneRange> {
        self.connections
            .iter()
            .find(|((r, _), _)| *r == road)
            .map(|(_, record)| record.main_lanes.clone())
            .unwrap_or_default()
    }

    fn connections(&self) -> Vec<(ObjectId, ConnectionEnd)> {
        self.connections.keys().copied().collect()
    }

    fn surface(&self) -> Option<&MeshBuffers> {
        self.surface.as_ref()
    }
}
