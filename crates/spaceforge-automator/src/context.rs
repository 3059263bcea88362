//! Context propagation and descriptor helpers.
//!
//! A task tree passes results downward through a [`Context`]. When a task's
//! handler succeeds, its result is folded into a fresh copy of the context
//! under the task's name, and that copy is what each subtask receives:
//!
//! ```text
//! workspace            ctx = { region }
//!   ├─ nav_item        ctx = { region, workspace }
//!   └─ storage_link    ctx = { region, workspace }
//!        └─ copy       ctx = { region, workspace, storage_link }
//! ```
//!
//! Siblings never see each other's results, and nothing flows back up.
//!
//! The two descriptor helpers, [`extract_attributes`] and
//! [`ensure_parameters`], are what handlers use to narrow and validate the
//! free-form descriptor they are handed.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{AutomatorError, Result};

/// Handler-specific configuration for one task instance.
pub type Descriptor = serde_json::Map<String, Value>;

/// Ancestor results keyed by task name.
pub type Context = HashMap<String, Value>;

/// Reserved descriptor key listing the tasks to run after this one.
pub const AFTER_KEY: &str = "after";

/// Shallow-merge `overrides` on top of `defaults`.
///
/// Keys present in both take the value from `overrides`.
pub fn merge_context(defaults: &Context, overrides: Context) -> Context {
    let mut merged = defaults.clone();
    merged.extend(overrides);
    merged
}

/// Copy `context` and record `result` under `name`.
pub fn fold_result(context: &Context, name: &str, result: &Value) -> Context {
    let mut folded = context.clone();
    folded.insert(name.to_string(), result.clone());
    folded
}

/// A value counts as defined when it is present and not JSON `null`.
pub fn is_defined(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

/// Keep only the requested, defined entries of `descriptor`.
pub fn extract_attributes<S: AsRef<str>>(descriptor: &Descriptor, attrs: &[S]) -> Descriptor {
    attrs
        .iter()
        .filter_map(|attr| {
            let key = attr.as_ref();
            descriptor
                .get(key)
                .filter(|value| !value.is_null())
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

/// Check that every key in `required` is defined on `descriptor`.
///
/// Keys are checked in the order given; the first missing one is reported as
/// a [`AutomatorError::KeyError`] carrying the whole descriptor.
pub fn ensure_parameters<'a, S: AsRef<str>>(
    descriptor: &'a Descriptor,
    required: &[S],
) -> Result<&'a Descriptor> {
    for key in required {
        let key = key.as_ref();
        if !is_defined(descriptor.get(key)) {
            return Err(AutomatorError::KeyError {
                key: key.to_string(),
                descriptor: descriptor.clone(),
            });
        }
    }
    Ok(descriptor)
}
