//! Project saving to TOML files

use crate::format::{ConnectionDef, IntersectionDef, ProjectFile};
use crate::network::RoadNetwork;
use roadkit_core::Result;
use std::fs;
use std::path::Path;

/// Save a network to a project file
pub fn save_project<P: AsRef<Path>>(path: P, network: &RoadNetwork) -> Result<()> {
    let content = save_project_string(network)?;
    fs::write(path, content)?;
    Ok(())
}

/// Save a network to a TOML string
pub fn save_project_string(network: &RoadNetwork) -> Result<String> {
    let project = network_to_project_file(network);
    let content = toml::to_string_pretty(&project)?;
    Ok(content)
}

/// Convert a network back to its authored form. Roads and intersections
/// are written in name order.
pub fn network_to_project_file(network: &RoadNetwork) -> ProjectFile {
    let mut roads: Vec<_> = network.roads().map(|r| r.def.clone()).collect();
    roads.sort_by(|a, b| a.name.cmp(&b.name));

    let mut intersections: Vec<IntersectionDef> = network
        .intersections()
        .map(|entry| IntersectionDef {
            name: entry.name.clone(),
            radius: entry.radius,
            connections: entry
                .node
                .connections()
                .into_iter()
                .filter_map(|(road, end)| {
                    network.road(road).map(|r| ConnectionDef {
                        road: r.name().to_string(),
                        end,
                    })
                })
                .collect(),
        })
        .collect();
    intersections.sort_by(|a, b| a.name.cmp(&b.name));
    for def in &mut intersections {
        def.connections.sort_by(|a, b| (&a.road, a.end).cmp(&(&b.road, b.end)));
    }

    ProjectFile {
        project: network.project.clone(),
        terrain: network.terrain_def().cloned(),
        prefabs: network.prefab_defs().clone(),
        roads,
        intersections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoadkitConfig;
    use crate::format::RoadDef;
    use crate::loader::{load_project, load_project_string};
    use glam::Vec3;
    use roadkit_core::{IndexSpan, ParamCurve};
    use roadkit_prefab::{PrefabDef, PrefabLine};
    use roadkit_road::{ConnectionEnd, Curve, Lane};

    fn network() -> RoadNetwork {
        let mut network = RoadNetwork::new("saved", RoadkitConfig::default());
        network.add_prefab("post", PrefabDef::Box { size: Vec3::new(0.2, 1.0, 0.2) });

        let mut road = RoadDef::new(
            "main",
            Curve::from_positions(&[Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 5.0)]),
        );
        road.deform_terrain = true;
        road.lanes.push(Lane::new("lane", IndexSpan::new(0, 1), ParamCurve::constant(3.5)));
        road.prefab_lines.push(PrefabLine::new("post", IndexSpan::new(1, 1)));
        let road = network.add_road(road);

        let node = network.add_intersection("end", 5.0);
        network.connect(road, ConnectionEnd::End, node).unwrap();
        network
    }

    #[test]
    fn test_save_project_string() {
        let toml_str = save_project_string(&network()).unwrap();
        assert!(toml_str.contains("saved"));
        assert!(toml_str.contains("main"));
        assert!(toml_str.contains("[prefabs.post]"));
    }

    #[test]
    fn test_roundtrip() {
        let original = network();
        let saved = save_project_string(&original).unwrap();
        let loaded = load_project_string(&saved, Path::new("."), RoadkitConfig::default()).unwrap();

        let a = original.road(original.find_road("main").unwrap()).unwrap();
        let b = loaded.road(loaded.find_road("main").unwrap()).unwrap();
        assert_eq!(a.def.lanes, b.def.lanes);
        assert_eq!(a.def.prefab_lines, b.def.prefab_lines);
        assert_eq!(a.curve().point_count(), b.curve().point_count());
        assert_eq!(b.curve().points[2].position, Vec3::new(20.0, 0.0, 5.0));

        let node = loaded.find_intersection("end").unwrap();
        assert_eq!(b.connection(ConnectionEnd::End), Some(node));
    }

    #[test]
    fn test_save_to_file() {
        let dir = std::env::temp_dir().join(format!("roadkit_save_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("project.roads.toml");

        save_project(&path, &network()).unwrap();
        let loaded = load_project(&path, RoadkitConfig::default()).unwrap();
        assert_eq!(loaded.project.name, "saved");
        assert_eq!(loaded.road_count(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
