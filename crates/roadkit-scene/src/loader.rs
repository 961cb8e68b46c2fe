//! Project loading from TOML files

use crate::config::RoadkitConfig;
use crate::format::{ProjectFile, TerrainDef};
use crate::network::RoadNetwork;
use roadkit_core::{Result, RoadError};
use roadkit_terrain::{GridTerrain, Heightmap, TerrainBounds};
use std::fs;
use std::path::Path;

/// Load a project from a `.roads.toml` file. Heightmap paths resolve
/// relative to the file's directory.
pub fn load_project<P: AsRef<Path>>(path: P, config: RoadkitConfig) -> Result<RoadNetwork> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_project_string(&content, base_dir, config)
}

/// Load a project from a TOML string
pub fn load_project_string(content: &str, base_dir: &Path, config: RoadkitConfig) -> Result<RoadNetwork> {
    let file: ProjectFile = toml::from_str(content)?;
    let mut network = RoadNetwork::new(file.project.name.clone(), config);
    network.project = file.project;

    if let Some(def) = file.terrain {
        let terrain = build_terrain(&def, base_dir)?;
        network.set_terrain(terrain, def);
    }

    for (name, def) in file.prefabs {
        network.add_prefab(name, def);
    }

    for road in file.roads {
        if network.find_road(&road.name).is_some() {
            return Err(RoadError::InvalidTopology(format!("duplicate road name '{}'", road.name)));
        }
        network.add_road(road);
    }

    for def in file.intersections {
        let node = network.add_intersection(def.name.clone(), def.radius);
        for connection in &def.connections {
            let road = network.find_road(&connection.road).ok_or_else(|| {
                RoadError::NotFound(format!(
                    "road '{}' referenced by intersection '{}'",
                    connection.road, def.name
                ))
            })?;
            network.connect(road, connection.end, node)?;
        }
    }

    log::info!(
        "loaded project '{}': {} roads, {} prefabs",
        network.project.name,
        network.road_count(),
        network.library().len()
    );
    Ok(network)
}

fn build_terrain(def: &TerrainDef, base_dir: &Path) -> Result<GridTerrain> {
    let heightmap = match &def.heightmap {
        Some(file) => Heightmap::from_png(&base_dir.join(file))?,
        None => Heightmap::flat(def.resolution[0], def.resolution[1], def.base_height)?,
    };
    Ok(GridTerrain::new(heightmap, TerrainBounds::new(def.origin, def.size)))
}
