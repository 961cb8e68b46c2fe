//! TOML project file format definitions (`*.roads.toml`)

use glam::Vec3;
use roadkit_core::IndexSpan;
use roadkit_prefab::{PrefabDef, PrefabLine};
use roadkit_road::{ConnectionEnd, Curve, Lane};
use roadkit_terrain::{CarveSettings, ConformSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete project file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub project: ProjectMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<TerrainDef>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefabs: BTreeMap<String, PrefabDef>,

    #[serde(default)]
    pub roads: Vec<RoadDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intersections: Vec<IntersectionDef>,
}

/// Project metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_resolution() -> [u32; 2] {
    [129, 129]
}

fn default_terrain_size() -> Vec3 {
    Vec3::new(256.0, 64.0, 256.0)
}

/// Height grid the project's roads sit on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainDef {
    /// Grayscale PNG, relative to the project file. A flat grid of
    /// `resolution` at `base_height` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heightmap: Option<String>,
    #[serde(default = "default_resolution")]
    pub resolution: [u32; 2],
    /// Normalized height of a generated flat grid
    #[serde(default)]
    pub base_height: f32,
    #[serde(default)]
    pub origin: Vec3,
    #[serde(default = "default_terrain_size")]
    pub size: Vec3,
}

impl Default for TerrainDef {
    fn default() -> Self {
        Self {
            heightmap: None,
            resolution: default_resolution(),
            base_height: 0.0,
            origin: Vec3::ZERO,
            size: default_terrain_size(),
        }
    }
}

/// A sub-range of a road carved with its own settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainInterval {
    pub span: IndexSpan,
    #[serde(default)]
    pub settings: CarveSettings,
}

/// Authored parameters of one road
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadDef {
    pub name: String,

    /// Carve the terrain along this road on terrain passes
    #[serde(default)]
    pub deform_terrain: bool,

    /// Overrides the configured detail level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<f32>,

    pub curve: Curve,

    /// Used for the whole road when there are no intervals
    #[serde(default)]
    pub carve: CarveSettings,

    /// Bend the road mesh onto the terrain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conform: Option<ConformSettings>,

    #[serde(default)]
    pub lanes: Vec<Lane>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefab_lines: Vec<PrefabLine>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub terrain_intervals: Vec<TerrainInterval>,
}

impl RoadDef {
    pub fn new(name: impl Into<String>, curve: Curve) -> Self {
        Self {
            name: name.into(),
            deform_terrain: false,
            detail_level: None,
            curve,
            carve: CarveSettings::default(),
            conform: None,
            lanes: Vec::new(),
            prefab_lines: Vec::new(),
            terrain_intervals: Vec::new(),
        }
    }

    /// Every index span on this road: lanes, prefab lines, terrain intervals.
    pub fn spans_mut(&mut self) -> impl Iterator<Item = &mut IndexSpan> {
        self.lanes
            .iter_mut()
            .map(|l| &mut l.span)
            .chain(self.prefab_lines.iter_mut().map(|p| &mut p.span))
            .chain(self.terrain_intervals.iter_mut().map(|t| &mut t.span))
    }

    pub fn spans(&self) -> impl Iterator<Item = &IndexSpan> {
        self.lanes
            .iter()
            .map(|l| &l.span)
            .chain(self.prefab_lines.iter().map(|p| &p.span))
            .chain(self.terrain_intervals.iter().map(|t| &t.span))
    }

    /// Fractional boundaries the resampler has to hit exactly.
    pub fn seams(&self) -> Vec<(usize, f32)> {
        self.spans().flat_map(|s| s.seams()).collect()
    }
}

/// A road end attached to an intersection, by road name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDef {
    pub road: String,
    pub end: ConnectionEnd,
}

/// A plate intersection joining road ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionDef {
    pub name: String,
    #[serde(default = "default_plate_radius")]
    pub radius: f32,
    #[serde(default)]
    pub connections: Vec<ConnectionDef>,
}

fn default_plate_radius() -> f32 {
    6.0
}

impl ProjectFile {
    /// Create an empty project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project: ProjectMetadata {
                name: name.into(),
                version: default_version(),
                description: None,
            },
            terrain: None,
            prefabs: BTreeMap::new(),
            roads: Vec::new(),
            intersections: Vec::new(),
        }
    }
}
