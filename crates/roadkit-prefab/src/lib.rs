//! Roadkit Prefab - Objects placed along road curves
//!
//! Walks a resampled curve to place fixed-footprint objects (fences,
//! barriers, posts), then instances their meshes either stretched along
//! the curve or rigidly rotated, optionally bent onto the terrain.

pub mod library;
pub mod line;
pub mod placement;

pub use library::{PrefabDef, PrefabLibrary, PrefabMesh};
pub use line::{generate_prefab_line, CurveBend, PlacedObject, PrefabLine, PrefabLineOutput, RigidPlacement};
pub use placement::{
    compute_placements, CurveWindow, DirectionMode, EndMode, OffsetBasis, PathFrame, PlacementRecord,
    PlacementSettings, Spacing,
};
