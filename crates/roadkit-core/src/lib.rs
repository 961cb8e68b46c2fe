//! Roadkit Core - Foundational types for the Roadkit road generator
//!
//! This crate provides the types every other Roadkit crate depends on:
//! - `PointId`, `ObjectId` - Stable identifiers for anchors and road objects
//! - `ContentHash` - SHA-256 fingerprints of generated buffers
//! - `bezier` - Cubic Bézier segment math
//! - `ParamCurve` - Keyframed scalar curves (lane width, offsets)
//! - `IndexSpan` - Segment ranges and their fix-ups on structural edits
//! - `parallel` - Data-parallel per-vertex transforms
//! - Error types and Result alias

pub mod bezier;
mod error;
mod hash;
mod id;
pub mod math;
pub mod parallel;
mod param_curve;
mod span;

pub use bezier::BezierSegment;
pub use error::{Result, RoadError};
pub use hash::ContentHash;
pub use id::{ObjectId, PointId};
pub use param_curve::{CurveKey, ParamCurve};
pub use span::{IndexSpan, SplitSide};

pub use glam::{Vec2, Vec3, Vec4};
