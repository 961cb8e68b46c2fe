//! Roadkit Scene - Road networks and TOML project files
//!
//! This crate ties the generators together: road objects and the network
//! that regenerates them, the edit session used by interactive hosts,
//! layered configuration, and loading and saving projects in TOML format.

pub mod config;
mod format;
mod loader;
pub mod network;
pub mod plate;
mod road_object;
mod saver;
pub mod session;

pub use config::RoadkitConfig;
pub use format::{
    ConnectionDef, IntersectionDef, ProjectFile, ProjectMetadata, RoadDef, TerrainDef, TerrainInterval,
};
pub use loader::{load_project, load_project_string};
pub use network::{
    DetailSink, IntersectionEntry, RegenerationSummary, RemoveOutcome, RoadNetwork, SplitOutcome,
};
pub use plate::PlateIntersection;
pub use road_object::{GeneratedRoad, RegenContext, RoadObject, SpanOwner};
pub use saver::{network_to_project_file, save_project, save_project_string};
pub use session::{EditOutcome, EditSession, EditTool, Selection, UndoEntry};
