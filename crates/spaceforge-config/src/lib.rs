//! Configuration system for spaceforge.
//!
//! Provides TOML-based configuration with:
//! - Logging settings (`[logging]`)
//! - Default root context values for every run (`[context]`)
//! - A plan directory for resolving bare plan names (`[plans]`)
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, LayerReport, LayerStatus, LoadedConfig, load_config, user_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
