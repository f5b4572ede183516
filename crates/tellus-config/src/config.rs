//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Formation (planet/moon) settings.
    pub formation: FormationConfig,
    /// LOD engine settings.
    pub lod: LodConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Formation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FormationConfig {
    /// Formation name.
    pub name: String,
    /// Base sphere radius in meters.
    pub radius: f64,
    /// World seed for all procedural features.
    pub seed: u64,
    /// Use the cratered height field instead of the flat sphere.
    pub cratered: bool,
    /// Number of craters to attempt when `cratered` is set.
    pub crater_count: usize,
}

/// LOD engine settings; mirrors the core's tuning constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Fixed quaterna capacity of the node buffer.
    pub max_quaterna: usize,
    /// Initial target quaterna count.
    pub target_quaterna: usize,
    /// Camera movement (meters) below which cached scores are reused.
    pub ray_position_epsilon: f64,
    /// Camera rotation tolerance (`1 - dot`) below which cached scores are reused.
    pub ray_direction_epsilon: f64,
    /// Minimum expansions per churn pass to run another pass in the same tick.
    pub churn_intensity_threshold: usize,
    /// Hard cap on churn passes per tick.
    pub max_churn_passes: usize,
    /// Child edges shorter than this (meters) abort a subdivision.
    pub min_child_edge: f64,
}

/// Debug/development settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            name: "Luna".to_string(),
            radius: 1_737_400.0,
            seed: 42,
            cratered: true,
            crater_count: 24,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            max_quaterna: 4096,
            target_quaterna: 512,
            ray_position_epsilon: 0.05,
            ray_direction_epsilon: 1e-3,
            churn_intensity_threshold: 16,
            max_churn_passes: 4,
            min_child_edge: 1e-6,
        }
    }
}

impl Config {
    /// Default config file location (`<user config dir>/tellus/config.ron`).
    ///
    /// Falls back to the current directory when the platform reports no
    /// config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tellus")
            .join("config.ron")
    }

    /// Load a config from a RON file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&content).map_err(ConfigError::ParseError)
    }

    /// Load a config, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Persist this config as pretty-printed RON, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::WriteError)?;
        }
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::WriteError)
    }
}
