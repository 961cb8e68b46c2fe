//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `ROADKIT_DETAIL_LEVEL`, `ROADKIT_SEED`
//! 2. Project-local: `.roadkit/config.toml`
//! 3. Global: `~/.roadkit/config.toml`

use roadkit_core::{Result, RoadError};
use roadkit_road::LodSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[generation]` section of a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub detail_level: Option<f32>,
    #[serde(default)]
    pub lod_strides: Option<Vec<usize>>,
    #[serde(default)]
    pub lod_screen_heights: Option<Vec<f32>>,
}

/// `[terrain]` section of a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerrainConfig {
    #[serde(default)]
    pub probe_height: Option<f32>,
    #[serde(default)]
    pub height_offset: Option<f32>,
}

/// `[prefab]` section of a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefabConfig {
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadkitConfigFile {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub prefab: PrefabConfig,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, PartialEq)]
pub struct RoadkitConfig {
    /// Resampling density, samples per ten world units
    pub detail_level: f32,
    pub lod: LodSettings,
    /// Height above a point that terrain probes start from
    pub probe_height: f32,
    /// Added to probed ground when snapping points
    pub height_offset: f32,
    /// Mixed into every prefab line's own seed
    pub seed: u64,
}

impl Default for RoadkitConfig {
    fn default() -> Self {
        Self {
            detail_level: 10.0,
            lod: LodSettings::default(),
            probe_height: 100.0,
            height_offset: 0.0,
            seed: 0,
        }
    }
}

impl RoadkitConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = RoadkitConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        let local_path = PathBuf::from(".roadkit/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        Self::apply_env_overrides(&mut config)?;
        Ok(Self::resolve(config))
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(Self::resolve(config))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".roadkit").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<RoadkitConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            RoadError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn merge_into(base: &mut RoadkitConfigFile, overlay: RoadkitConfigFile) {
        if overlay.generation.detail_level.is_some() {
            base.generation.detail_level = overlay.generation.detail_level;
        }
        if overlay.generation.lod_strides.is_some() {
            base.generation.lod_strides = overlay.generation.lod_strides;
        }
        if overlay.generation.lod_screen_heights.is_some() {
            base.generation.lod_screen_heights = overlay.generation.lod_screen_heights;
        }
        if overlay.terrain.probe_height.is_some() {
            base.terrain.probe_height = overlay.terrain.probe_height;
        }
        if overlay.terrain.height_offset.is_some() {
            base.terrain.height_offset = overlay.terrain.height_offset;
        }
        if overlay.prefab.seed.is_some() {
            base.prefab.seed = overlay.prefab.seed;
        }
    }

    fn apply_env_overrides(config: &mut RoadkitConfigFile) -> Result<()> {
        if let Ok(value) = std::env::var("ROADKIT_DETAIL_LEVEL") {
            let detail = value.trim().parse::<f32>().map_err(|e| {
                RoadError::ConfigError(format!("ROADKIT_DETAIL_LEVEL '{}': {}", value, e))
            })?;
            config.generation.detail_level = Some(detail);
        }
        if let Ok(value) = std::env::var("ROADKIT_SEED") {
            let seed = value
                .trim()
                .parse::<u64>()
                .map_err(|e| RoadError::ConfigError(format!("ROADKIT_SEED '{}': {}", value, e)))?;
            config.prefab.seed = Some(seed);
        }
        Ok(())
    }

    fn resolve(file: RoadkitConfigFile) -> Self {
        let defaults = Self::default();
        let mut lod = defaults.lod.clone();
        if let Some(strides) = file.generation.lod_strides.filter(|s| !s.is_empty()) {
            lod.strides = strides;
        }
        if let Some(heights) = file.generation.lod_screen_heights {
            lod.screen_heights = heights;
        }
        Self {
            detail_level: file
                .generation
                .detail_level
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(defaults.detail_level),
            lod,
            probe_height: file.terrain.probe_height.unwrap_or(defaults.probe_height),
            height_offset: file.terrain.height_offset.unwrap_or(defaults.height_offset),
            seed: file.prefab.seed.unwrap_or(defaults.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_config(content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roadkit_config_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        std::fs::remove_file(path).ok();
        std::fs::remove_dir(path.parent().unwrap()).ok();
    }

    // Env vars are process-wide; one test owns both of them.
    #[test]
    fn test_file_values_and_env_override() {
        std::env::remove_var("ROADKIT_DETAIL_LEVEL");
        std::env::remove_var("ROADKIT_SEED");

        let path = temp_config(
            r#"
[generation]
detail_level = 4.0
lod_strides = [1, 2]

[terrain]
probe_height = 250.0

[prefab]
seed = 9
"#,
        );
        let config = RoadkitConfig::load_from_file(&path).unwrap();
        assert_eq!(config.detail_level, 4.0);
        assert_eq!(config.lod.strides, vec![1, 2]);
        assert_eq!(config.probe_height, 250.0);
        assert_eq!(config.height_offset, 0.0);
        assert_eq!(config.seed, 9);

        std::env::set_var("ROADKIT_DETAIL_LEVEL", "20");
        std::env::set_var("ROADKIT_SEED", "42");
        let config = RoadkitConfig::load_from_file(&path).unwrap();
        assert_eq!(config.detail_level, 20.0);
        assert_eq!(config.seed, 42);

        std::env::set_var("ROADKIT_SEED", "not-a-number");
        assert!(matches!(
            RoadkitConfig::load_from_file(&path),
            Err(RoadError::ConfigError(_))
        ));

        std::env::remove_var("ROADKIT_DETAIL_LEVEL");
        std::env::remove_var("ROADKIT_SEED");
        cleanup(&path);
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut base = RoadkitConfigFile::default();
        base.generation.detail_level = Some(5.0);
        base.prefab.seed = Some(3);

        let mut overlay = RoadkitConfigFile::default();
        overlay.prefab.seed = Some(8);
        RoadkitConfig::merge_into(&mut base, overlay);

        let config = RoadkitConfig::resolve(base);
        assert_eq!(config.detail_level, 5.0);
        assert_eq!(config.seed, 8);
    }

    #[test]
    fn test_invalid_detail_falls_back() {
        let mut file = RoadkitConfigFile::default();
        file.generation.detail_level = Some(-1.0);
        assert_eq!(RoadkitConfig::resolve(file).detail_level, 10.0);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let path = temp_config("[generation\ndetail_level = ");
        assert!(matches!(
            RoadkitConfig::load_from_file(&path),
            Err(RoadError::ConfigError(_))
        ));
        cleanup(&path);
    }
}
