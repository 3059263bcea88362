//! Builds task trees from descriptors.
//!
//! A descriptor's `after` list names the tasks that run once this one has
//! succeeded:
//!
//! ```json
//! {
//!   "title": "Research",
//!   "after": [
//!     { "nav_item": { "label": "Home" } },
//!     { "storage_link": { "after": [ { "copy": null } ] } }
//!   ]
//! }
//! ```
//!
//! The whole tree is built up front, depth first. Children get their own
//! descriptor but no construction-time context; they receive context only
//! when their parent runs them.

use serde_json::Value;
use tracing::debug;

use crate::context::{AFTER_KEY, Context, Descriptor};
use crate::error::{AutomatorError, Result};
use crate::registry::HandlerRegistry;
use crate::task::Task;

/// One entry of an `after` list: child task name and its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySpec {
    pub name: String,
    pub descriptor: Option<Descriptor>,
}

/// Validates `(name, descriptor, context)` triples and builds [`Task`] trees.
#[derive(Debug, Clone, Default)]
pub struct TaskFactory {
    registry: HandlerRegistry,
}

impl TaskFactory {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// Build a task and, recursively, all of its subtasks.
    ///
    /// Fails with [`AutomatorError::TaskNotFound`] when `name` has no handler.
    /// Any failure while building the subtasks is reported as a single
    /// [`AutomatorError::InvalidTask`] carrying this task's name, descriptor
    /// and context alongside the cause.
    pub fn build(
        &self,
        name: &str,
        descriptor: Option<Descriptor>,
        context: Option<Context>,
    ) -> Result<Task> {
        if !self.registry.contains(name) {
            return Err(AutomatorError::TaskNotFound {
                name: name.to_string(),
            });
        }

        let descriptor = descriptor.unwrap_or_default();
        let context = context.unwrap_or_default();

        match self.build_subtasks(&descriptor) {
            Ok(subtasks) => {
                debug!(task = %name, subtasks = subtasks.len(), "Built task");
                Ok(Task::new(
                    name.to_string(),
                    descriptor,
                    context,
                    subtasks,
                    self.registry.clone(),
                ))
            }
            Err(cause) => Err(AutomatorError::InvalidTask {
                name: name.to_string(),
                descriptor,
                context,
                cause: Box::new(cause),
            }),
        }
    }

    fn build_subtasks(&self, descriptor: &Descriptor) -> Result<Vec<Task>> {
        dependency_specs(descriptor)?
            .into_iter()
            .map(|spec| self.build(&spec.name, spec.descriptor, None))
            .collect()
    }
}

/// Parse the `after` list of a descriptor.
///
/// A missing or `null` list means no dependents. Each entry must be an object
/// with exactly one key; its value is the child descriptor, or `null` for an
/// empty one.
pub fn dependency_specs(descriptor: &Descriptor) -> Result<Vec<DependencySpec>> {
    let entries = match descriptor.get(AFTER_KEY) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(malformed(format!(
                "'{AFTER_KEY}' must be an array, got {}",
                value_kind(other)
            )));
        }
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let Value::Object(map) = entry else {
                return Err(malformed(format!(
                    "'{AFTER_KEY}[{index}]' must be an object, got {}",
                    value_kind(entry)
                )));
            };
            let mut fields = map.iter();
            let (Some((name, child)), None) = (fields.next(), fields.next()) else {
                return Err(malformed(format!(
                    "'{AFTER_KEY}[{index}]' must name exactly one task, got {} keys",
                    map.len()
                )));
            };
            let descriptor = match child {
                Value::Null => None,
                Value::Object(child) => Some(child.clone()),
                other => {
                    return Err(malformed(format!(
                        "descriptor for '{name}' must be an object, got {}",
                        value_kind(other)
                    )));
                }
            };
            Ok(DependencySpec {
                name: name.clone(),
                descriptor,
            })
        })
        .collect()
}

fn malformed(reason: String) -> AutomatorError {
    AutomatorError::MalformedDescriptor { reason }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
