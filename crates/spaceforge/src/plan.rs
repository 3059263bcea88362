//! Plan files: which task to build, with what descriptor and context.
//!
//! ```toml
//! task = "passthrough"
//!
//! [descriptor]
//! title = "Research"
//! after = [
//!     { append = { list = "nav", item = "Home" } },
//!     { append = { list = "nav", item = "Files" } },
//! ]
//!
//! [context]
//! tenant = "acme"
//! ```
//!
//! Files ending in `.json` are read as JSON; everything else as TOML.

use std::path::Path;

use anyhow::{Context as _, Result, bail};
use serde::Deserialize;
use serde_json::Value;
use spaceforge_automator::{Context, Descriptor, merge_context};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Name of the root task's handler.
    pub task: String,
    #[serde(default)]
    pub descriptor: Option<Descriptor>,
    #[serde(default)]
    pub context: Context,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read plan '{}'", path.display()))?;

        let plan: Plan = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse plan '{}'", path.display()))?,
            _ => toml::from_str(&contents)
                .with_context(|| format!("failed to parse plan '{}'", path.display()))?,
        };

        if plan.task.is_empty() {
            bail!("plan '{}' has an empty task name", path.display());
        }
        Ok(plan)
    }

    /// The root task's default context: `base` overlaid with the plan's own.
    pub fn default_context(&self, base: &Context) -> Context {
        merge_context(base, self.context.clone())
    }
}

/// Parse a `key=value` override. The value is read as JSON when it parses,
/// otherwise taken as a plain string.
pub fn parse_context_pair(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
