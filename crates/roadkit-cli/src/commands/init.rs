//! Project initialization command

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG_TEMPLATE: &str = r#"# Project-local Roadkit settings; ROADKIT_* environment variables win.

[generation]
detail_level = 10.0
lod_strides = [1, 2, 4]

[terrain]
probe_height = 100.0

[prefab]
seed = 0
"#;

fn project_template(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
version = "1.0"
description = "A road over flat ground"

[terrain]
resolution = [129, 129]
base_height = 0.5
origin = [-64.0, -16.0, -64.0]
size = [128.0, 32.0, 128.0]

[prefabs.post]
shape = "box"
size = [0.2, 1.2, 0.2]

[[roads]]
name = "main"
deform_terrain = true

[[roads.curve.points]]
position = [-40.0, 0.5, 0.0]

[[roads.curve.points]]
position = [0.0, 1.5, 10.0]

[[roads.curve.points]]
position = [40.0, 0.5, 0.0]

[[roads.lanes]]
name = "left"
materials = ["asphalt"]
span = {{ start_index = 0, end_index = 1 }}
width = [{{ time = 0.0, value = 3.5 }}]

[[roads.lanes]]
name = "right"
materials = ["asphalt"]
span = {{ start_index = 0, end_index = 1 }}
width = [{{ time = 0.0, value = 3.5 }}]

[[roads.prefab_lines]]
prefab = "post"
bend_to_curve = false
span = {{ start_index = 0, end_index = 1 }}
placement = {{ spacing = {{ kind = "fixed", distance = 5.0 }}, lateral_offset = [{{ time = 0.0, value = 4.5 }}] }}
"#
    )
}

pub fn run(name: &str) -> Result<()> {
    let project_dir = Path::new(name);

    if project_dir.exists() {
        anyhow::bail!("Directory '{}' already exists", name);
    }

    fs::create_dir_all(project_dir.join(".roadkit"))?;
    fs::write(project_dir.join(".roadkit/config.toml"), CONFIG_TEMPLATE)?;

    let project_name = project_dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("roads")
        .to_string();
    let project_file = format!("{}.roads.toml", project_name);
    fs::write(project_dir.join(&project_file), project_template(&project_name))?;

    println!("Created Roadkit project: {}", name);
    println!();
    println!("Project structure:");
    println!("  {}/", name);
    println!("  ├── .roadkit/");
    println!("  │   └── config.toml");
    println!("  └── {}", project_file);
    println!();
    println!("Next steps:");
    println!("  cd {}", name);
    println!("  roadkit build {} --heightmap-out carved.png", project_file);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadkit_scene::{load_project, RoadkitConfig};

    #[test]
    fn test_init_creates_loadable_project() {
        let dir = std::env::temp_dir().join(format!("roadkit_init_test_{}", uuid::Uuid::new_v4()));
        let name = dir.to_string_lossy().to_string();
        run(&name).unwrap();

        let stem = dir.file_name().unwrap().to_string_lossy().to_string();
        let mut network = load_project(dir.join(format!("{}.roads.toml", stem)), RoadkitConfig::default()).unwrap();
        assert_eq!(network.road_count(), 1);
        let summary = network.regenerate_all(true, false, false);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert!(summary.prefab_objects > 0);

        let config = RoadkitConfig::load_from_file(&dir.join(".roadkit/config.toml")).unwrap();
        assert_eq!(config.lod.strides, vec![1, 2, 4]);

        assert!(run(&name).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
