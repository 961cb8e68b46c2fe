//! Structural edits applied to a project file in place

use anyhow::{Context, Result};
use glam::Vec3;
use roadkit_scene::{save_project, RemoveOutcome, RoadNetwork};

use super::{open_project, road_by_name};

fn save(path: &str, network: &RoadNetwork) -> Result<()> {
    save_project(path, network).with_context(|| format!("Failed to save project: {}", path))
}

pub fn split(project: &str, road: &str, point: usize, large: bool) -> Result<()> {
    let mut network = open_project(project)?;
    let id = road_by_name(&network, road)?;
    let outcome = network
        .split_segment(id, point, large)
        .with_context(|| format!("Cannot split '{}' at point {}", road, point))?;
    let tail = network.road(outcome.new_road).map(|r| r.name().to_string()).unwrap_or_default();
    save(project, &network)?;
    println!("Split '{}' at point {}; new road '{}'", road, point, tail);
    Ok(())
}

pub fn insert(project: &str, road: &str, segment: usize, at: [f32; 3]) -> Result<()> {
    let mut network = open_project(project)?;
    let id = road_by_name(&network, road)?;
    let index = network
        .insert_point(id, segment, Vec3::from_array(at))
        .with_context(|| format!("Cannot insert into segment {} of '{}'", segment, road))?;
    save(project, &network)?;
    println!("Inserted point {} into '{}'", index, road);
    Ok(())
}

pub fn remove(project: &str, road: &str, point: usize) -> Result<()> {
    let mut network = open_project(project)?;
    let id = road_by_name(&network, road)?;
    let outcome = network
        .remove_point(id, point)
        .with_context(|| format!("Cannot remove point {} of '{}'", point, road))?;
    save(project, &network)?;
    match outcome {
        RemoveOutcome::Removed(_) => println!("Removed point {} of '{}'", point, road),
        RemoveOutcome::RoadDeleted => println!("'{}' had two points left and was deleted", road),
    }
    Ok(())
}

pub fn snap(project: &str, road: Option<&str>) -> Result<()> {
    let mut network = open_project(project)?;
    if network.terrain().is_none() {
        anyhow::bail!("Project has no terrain to snap to");
    }
    let ids = match road {
        Some(name) => vec![road_by_name(&network, name)?],
        None => network.roads().map(|r| r.id).collect(),
    };
    let mut snapped = 0;
    for id in ids {
        snapped += network.snap_points_to_terrain(id)?;
    }
    save(project, &network)?;
    println!("Snapped {} points", snapped);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadkit_scene::{load_project, ProjectFile, RoadDef, RoadkitConfig, TerrainDef};
    use roadkit_road::Curve;
    use std::path::PathBuf;

    fn temp_project() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roadkit_edit_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.roads.toml");

        let mut project = ProjectFile::new("edit");
        project.terrain = Some(TerrainDef {
            resolution: [33, 33],
            base_height: 0.5,
            origin: Vec3::new(-50.0, -10.0, -50.0),
            size: Vec3::new(100.0, 20.0, 100.0),
            ..Default::default()
        });
        project.roads.push(RoadDef::new(
            "main",
            Curve::from_positions(&[Vec3::new(0.0, 4.0, 0.0), Vec3::new(10.0, 4.0, 0.0), Vec3::new(20.0, 4.0, 0.0)]),
        ));
        std::fs::write(&path, toml::to_string_pretty(&project).unwrap()).unwrap();
        path
    }

    fn reload(path: &PathBuf) -> RoadNetwork {
        load_project(path, RoadkitConfig::default()).unwrap()
    }

    #[test]
    fn test_split_and_remove_persist() {
        let path = temp_project();
        let project = path.to_string_lossy().to_string();

        split(&project, "main", 1, false).unwrap();
        let network = reload(&path);
        assert_eq!(network.road_count(), 2);
        assert!(network.find_road("main-2").is_some());

        remove(&project, "main-2", 1).unwrap();
        assert_eq!(reload(&path).road_count(), 1);

        assert!(remove(&project, "missing", 0).is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_insert_and_snap_persist() {
        let path = temp_project();
        let project = path.to_string_lossy().to_string();

        insert(&project, "main", 0, [5.0, 4.0, 1.0]).unwrap();
        snap(&project, None).unwrap();

        let network = reload(&path);
        let road = network.road(network.find_road("main").unwrap()).unwrap();
        assert_eq!(road.curve().point_count(), 4);
        assert!(road.curve().points.iter().all(|p| p.position.y.abs() < 1e-4));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
