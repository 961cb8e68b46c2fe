//! Roadkit Terrain - Height grid terrain and road/terrain conforming
//!
//! Provides the height grid with PNG I/O, the terrain collaborator traits
//! (`HeightProbe`, `TerrainSurface`), closest-wins heightmap carving with
//! falloff and smoothing, and bending of generated meshes onto the ground.
//! Nothing here knows about roads; callers hand in sample paths and meshes.

pub mod carve;
pub mod conform;
pub mod footprint;
pub mod heightmap;
pub mod smooth;
pub mod terrain;

pub use carve::{CarveReport, CarveSample, CarveSession, CarveSettings};
pub use conform::{conform_vertices, ConformMode, ConformSettings, ConformTransform};
pub use footprint::SurfaceFootprint;
pub use heightmap::Heightmap;
pub use terrain::{CommittedGround, GridTerrain, HeightProbe, TerrainBounds, TerrainSurface};
