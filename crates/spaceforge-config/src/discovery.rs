//! Config file discovery and layered merging.
//!
//! Two layers, the later overriding the earlier:
//! 1. [`ConfigLayer::User`]: `config.toml` in the user config directory
//! 2. [`ConfigLayer::Project`]: `spaceforge.toml` in the project directory
//!
//! The CLI owns the `SPACEFORGE_CONFIG_DIR` override and passes the directory
//! in; this module only knows the platform default.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::SpaceforgeConfig;

const PROJECT_CONFIG_FILE: &str = "spaceforge.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const APP_NAME: &str = "spaceforge";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::User => f.write_str("user"),
            ConfigLayer::Project => f.write_str("project"),
        }
    }
}

/// What happened to one layer during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    Missing,
    Loaded,
    /// The file exists but was skipped; holds the rendered error.
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct LayerReport {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    pub status: LayerStatus,
}

/// The merged configuration plus a report for every layer considered.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SpaceforgeConfig,
    pub layers: Vec<LayerReport>,
}

impl LoadedConfig {
    /// Layers that were merged into `config`, lowest precedence first.
    pub fn loaded(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers
            .iter()
            .filter(|r| r.status == LayerStatus::Loaded)
    }

    /// One message per layer that existed but could not be used.
    pub fn warnings(&self) -> Vec<String> {
        self.layers
            .iter()
            .filter_map(|r| match &r.status {
                LayerStatus::Skipped(reason) => Some(format!(
                    "Failed to load {} config {}: {}",
                    r.layer,
                    r.path.display(),
                    reason
                )),
                _ => None,
            })
            .collect()
    }
}

/// Discover and merge the user and project layers.
///
/// `project_dir` defaults to the working directory and `user_dir` to
/// [`user_config_dir`]. With no user directory available the user layer is
/// not reported at all. Never fails: unusable layers are reported and skipped.
pub fn load_config(project_dir: Option<&Path>, user_dir: Option<&Path>) -> LoadedConfig {
    let mut config = SpaceforgeConfig::new();
    let mut layers = Vec::with_capacity(2);

    let user_dir = user_dir.map(Path::to_path_buf).or_else(user_config_dir);
    if let Some(dir) = user_dir {
        layers.push(merge_layer(
            &mut config,
            ConfigLayer::User,
            dir.join(USER_CONFIG_FILE),
        ));
    }

    let project_dir = project_dir.unwrap_or_else(|| Path::new("."));
    layers.push(merge_layer(
        &mut config,
        ConfigLayer::Project,
        project_dir.join(PROJECT_CONFIG_FILE),
    ));

    LoadedConfig { config, layers }
}

/// Platform default for the user layer (`~/.config/spaceforge` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn merge_layer(config: &mut SpaceforgeConfig, layer: ConfigLayer, path: PathBuf) -> LayerReport {
    let status = if !path.is_file() {
        LayerStatus::Missing
    } else {
        match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| SpaceforgeConfig::from_toml(&text).map_err(|e| e.to_string()))
        {
            Ok(parsed) => {
                config.merge(parsed);
                LayerStatus::Loaded
            }
            Err(reason) => LayerStatus::Skipped(reason),
        }
    };
    LayerReport {
        layer,
        path,
        status,
    }
}
