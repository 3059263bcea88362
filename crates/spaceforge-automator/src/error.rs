//! Error types for the task automator.
//!
//! Every failure can be rendered as an [`ErrorEnvelope`]: a kind tag, a
//! human-readable message and a JSON data payload carrying whatever is needed
//! to diagnose it (offending task name, descriptor, context, nested cause).

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::context::{Context, Descriptor};

/// Result type for automator operations.
pub type Result<T> = std::result::Result<T, AutomatorError>;

/// Errors raised while building or running task trees.
#[derive(Debug, Clone, Error)]
pub enum AutomatorError {
    /// No handler is registered under the requested task name.
    #[error("Task not found: {name}")]
    TaskNotFound { name: String },

    /// Building a task or one of its subtasks failed.
    #[error("Invalid task '{name}': {cause}")]
    InvalidTask {
        name: String,
        descriptor: Descriptor,
        context: Context,
        cause: Box<AutomatorError>,
    },

    /// The descriptor's `after` list does not have the expected shape.
    #[error("Malformed descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    /// A required descriptor parameter is absent.
    #[error("Missing required parameter '{key}'")]
    KeyError { key: String, descriptor: Descriptor },

    /// A handler failed for its own reasons.
    #[error("{message}")]
    Handler { message: String, data: Value },

    /// An ordered step never produced a value (it panicked or its queue shut down).
    #[error("Ordered step {sequence} aborted: {reason}")]
    StepAborted { sequence: u64, reason: String },
}

/// Kind tag carried by every [`ErrorEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    TaskNotFound,
    InvalidTask,
    MalformedDescriptor,
    KeyError,
    HandlerError,
    StepAborted,
}

/// Structured, serializable view of an [`AutomatorError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Value,
}

impl AutomatorError {
    /// Create a handler failure with no diagnostic payload.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Create a handler failure carrying a diagnostic payload.
    pub fn handler_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::Handler {
            message: message.into(),
            data,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound { .. } => ErrorKind::TaskNotFound,
            Self::InvalidTask { .. } => ErrorKind::InvalidTask,
            Self::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            Self::KeyError { .. } => ErrorKind::KeyError,
            Self::Handler { .. } => ErrorKind::HandlerError,
            Self::StepAborted { .. } => ErrorKind::StepAborted,
        }
    }

    /// The innermost cause, following `InvalidTask` wrappers.
    pub fn root_cause(&self) -> &AutomatorError {
        match self {
            Self::InvalidTask { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Render this error as a structured envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        let data = match self {
            Self::TaskNotFound { name } => json!({ "name": name }),
            Self::InvalidTask {
                name,
                descriptor,
                context,
                cause,
            } => json!({
                "name": name,
                "descriptor": descriptor,
                "context": context,
                "cause": cause.envelope(),
            }),
            Self::MalformedDescriptor { reason } => json!({ "reason": reason }),
            Self::KeyError { key, descriptor } => json!({
                "key": key,
                "descriptor": descriptor,
            }),
            Self::Handler { data, .. } => data.clone(),
            Self::StepAborted { sequence, reason } => json!({
                "sequence": sequence,
                "reason": reason,
            }),
        };

        ErrorEnvelope {
            kind: self.kind(),
            message: self.to_string(),
            data,
        }
    }
}

impl From<anyhow::Error> for AutomatorError {
    fn from(err: anyhow::Error) -> Self {
        AutomatorError::handler(format!("{err:#}"))
    }
}
