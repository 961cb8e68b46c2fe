//! Roadkit Road - Curves, lanes and road mesh extrusion
//!
//! Provides anchor points and piecewise cubic curves with their structural
//! edits, the lane model, lane-stack extrusion into multi-LOD mesh buffers,
//! and the connection contract for intersection nodes. Outputs plain
//! vertex/UV/index buffers; nothing here renders.

pub mod curve;
pub mod extrude;
pub mod intersection;
pub mod lane;
pub mod lod;
pub mod mesh;
pub mod point;

pub use curve::{Curve, CurveSample, ResampledCurve};
pub use extrude::{extrude_lanes, FootprintSample, LaneMesh, RoadMesh};
pub use intersection::{
    connection_record, main_lane_indices, ConnectionEnd, ConnectionRecord, Intersection, LaneRange,
};
pub use lane::{Lane, UvSettings};
pub use lod::{LodGroup, LodLevel, LodSettings};
pub use mesh::{ColliderMesh, MeshBuffers};
pub use point::{AnchorPoint, Handle};
