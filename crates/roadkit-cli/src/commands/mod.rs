//! CLI command implementations

pub mod build;
pub mod edit;
pub mod init;
pub mod inspect;

use anyhow::{Context, Result};
use roadkit_core::ObjectId;
use roadkit_scene::{load_project, RoadNetwork, RoadkitConfig};

/// Load a project with the layered configuration.
pub fn open_project(path: &str) -> Result<RoadNetwork> {
    let config = RoadkitConfig::load().context("Failed to load configuration")?;
    log::debug!("configuration: {:?}", config);
    load_project(path, config).with_context(|| format!("Failed to load project: {}", path))
}

pub fn road_by_name(network: &RoadNetwork, name: &str) -> Result<ObjectId> {
    network
        .find_road(name)
        .with_context(|| format!("Road '{}' not found", name))
}
