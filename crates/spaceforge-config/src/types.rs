//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! file_dir = "/var/log/spaceforge"
//!
//! [context]
//! tenant = "acme"
//! region = "eu-west"
//!
//! [plans]
//! dir = "plans"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Extensions tried, in order, when a bare plan name is resolved.
pub const PLAN_EXTENSIONS: &[&str] = &["toml", "json"];

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceforgeConfig {
    /// Logging configuration.
    pub logging: Option<LoggingConfig>,

    /// Values every run starts with, beneath the plan's own context.
    pub context: HashMap<String, Value>,

    /// Plan lookup configuration.
    pub plans: Option<PlansConfig>,
}

impl SpaceforgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        if let Some(ref logging) = config.logging {
            logging.validate()?;
        }
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace wholesale; `[context]` merges key by key.
    pub fn merge(&mut self, other: SpaceforgeConfig) {
        if other.logging.is_some() {
            self.logging = other.logging;
        }

        for (key, value) in other.context {
            self.context.insert(key, value);
        }

        if other.plans.is_some() {
            self.plans = other.plans;
        }
    }

    /// Effective log level, `info` unless configured.
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(LoggingConfig::DEFAULT_LEVEL)
    }

    /// Directory for JSON log files, if file logging is enabled.
    pub fn log_file_dir(&self) -> Option<&Path> {
        self.logging.as_ref().and_then(|l| l.file_dir.as_deref())
    }

    /// Resolve a plan argument to a file path.
    ///
    /// An existing path is used as given. Otherwise the name is looked up in
    /// the `[plans]` directory, trying each of [`PLAN_EXTENSIONS`] when the
    /// name has no extension. Falls back to the argument itself so the caller
    /// reports the read failure against what the user typed.
    pub fn resolve_plan(&self, plan: &Path) -> PathBuf {
        if plan.is_file() {
            return plan.to_path_buf();
        }
        let Some(dir) = self.plans.as_ref().and_then(|p| p.dir.as_deref()) else {
            return plan.to_path_buf();
        };

        let candidate = dir.join(plan);
        if candidate.is_file() {
            return candidate;
        }
        if candidate.extension().is_none() {
            for ext in PLAN_EXTENSIONS {
                let with_ext = candidate.with_extension(ext);
                if with_ext.is_file() {
                    return with_ext;
                }
            }
        }
        plan.to_path_buf()
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level applied when `RUST_LOG` is unset.
    pub level: Option<String>,
    /// Directory for daily-rotated JSON log files.
    pub file_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub const DEFAULT_LEVEL: &'static str = "info";

    const LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error", "off"];

    fn validate(&self) -> Result<()> {
        match self.level.as_deref() {
            Some(level) if !Self::LEVELS.contains(&level.to_ascii_lowercase().as_str()) => {
                Err(ConfigError::InvalidLevel(level.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Plan lookup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlansConfig {
    /// Directory searched for plans given by bare name.
    pub dir: Option<PathBuf>,
}
