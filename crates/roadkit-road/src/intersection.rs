//! Connection contract between roads and intersection nodes.
//!
//! Intersection geometry lives outside the road core. A road only hands an
//! intersection a [`ConnectionRecord`] when one of its ends is attached,
//! asks it to regenerate when that end moves, and reads back which of its
//! lanes the intersection continues.

use glam::Vec3;
use roadkit_core::{ObjectId, PointId, Result};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::lane::Lane;
use crate::mesh::MeshBuffers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEnd {
    Start,
    End,
}

/// What an intersection needs to know about an attached road end.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub point: PointId,
    pub position: Vec3,
    /// Unit direction pointing from the intersection into the road
    pub tangent: Vec3,
    pub end: ConnectionEnd,
    /// Runs of lanes marked as main road parts, continued through the node
    pub main_lanes: Vec<LaneRange>,
}

/// Inclusive range of indices into a road's lane list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneRange {
    pub start_index: usize,
    pub end_index: usize,
}

impl LaneRange {
    pub fn contains(&self, lane: usize) -> bool {
        (self.start_index..=self.end_index).contains(&lane)
    }
}

/// An intersection node as seen from the road core.
pub trait Intersection {
    fn id(&self) -> ObjectId;

    /// Rebuild the node's own geometry.
    fn regenerate(&mut self, update_terrain: bool, update_details: bool) -> Result<()>;

    fn connect(&mut self, road: ObjectId, record: ConnectionRecord);

    fn disconnect(&mut self, road: ObjectId, end: ConnectionEnd);

    /// Lanes of `road` continued through this node, main-road lanes only.
    fn connected_lanes(&self, road: ObjectId) -> Vec<LaneRange>;

    /// Connections currently attached, as `(road, end)`.
    fn connections(&self) -> Vec<(ObjectId, ConnectionEnd)>;

    /// Surface that terrain under the node should snap to.
    fn surface(&self) -> Option<&MeshBuffers> {
        None
    }
}

/// Build the record for attaching `end` of a road with `curve` and `lanes`.
/// `None` on curves with fewer than two points.
pub fn connection_record(curve: &Curve, lanes: &[Lane], end: ConnectionEnd) -> Option<ConnectionRecord> {
    if !curve.is_valid() {
        return None;
    }
    let (point, segment, t, sign) = match end {
        ConnectionEnd::Start => (curve.points.first()?, 0, 0.0, 1.0),
        ConnectionEnd::End => (curve.points.last()?, curve.segment_count() - 1, 1.0, -1.0),
    };
    let tangent = curve.segment(segment)?.direction(t) * sign;
    Some(ConnectionRecord {
        point: point.id,
        position: point.position,
        tangent,
        end,
        main_lanes: main_lane_indices(lanes),
    })
}

/// Contiguous runs of lanes marked as main road parts, in stack order.
pub fn main_lane_indices(lanes: &[Lane]) -> Vec<LaneRange> {
    let mut runs: Vec<LaneRange> = Vec::new();
    for (index, lane) in lanes.iter().enumerate() {
        if !lane.main_road_part {
            continue;
        }
        match runs.last_mut() {
            Some(run) if run.end_index + 1 == index => run.end_index = index,
            _ => runs.push(LaneRange {
                start_index: index,
                end_index: index,
            }),
        }
    }
    runs
}
