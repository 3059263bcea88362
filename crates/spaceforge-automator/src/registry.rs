//! Handler registry: task-type name to handler.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, Descriptor};
use crate::error::Result;

/// The side effect behind one task type.
///
/// A handler receives the task's descriptor and its effective context and
/// settles with a JSON result or an error. The automator never looks inside;
/// it only acts on the settled outcome.
///
/// Any `Fn(Descriptor, Context) -> impl Future<Output = Result<Value>>` is a
/// handler, so plain `async fn`s and closures can be registered directly.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, descriptor: Descriptor, context: Context) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Descriptor, Context) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, descriptor: Descriptor, context: Context) -> Result<Value> {
        (self)(descriptor, context).await
    }
}

/// Shared mapping from task-type name to handler.
///
/// Cloning yields another handle onto the same registry. Registration is
/// last-write-wins and there is no removal.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn Handler>>>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler.
    ///
    /// If a handler with the same name already exists, it will be replaced.
    pub fn register<H: Handler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.register_arc(name, Arc::new(handler));
    }

    /// Register a handler from an Arc.
    pub fn register_arc(&self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        let name = name.into();
        if self.handlers.write().insert(name.clone(), handler).is_some() {
            debug!(handler = %name, "Replaced existing handler");
        } else {
            debug!(handler = %name, "Registered handler");
        }
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
