//! The `Automator` facade: registration, task construction and the ordering
//! queue behind one handle.

use tracing::debug;

use crate::context::{self, Context, Descriptor};
use crate::error::Result;
use crate::factory::TaskFactory;
use crate::queue::OrderingQueue;
use crate::registry::{Handler, HandlerRegistry};
use crate::task::Task;

/// Entry point for collaborators and callers.
///
/// Collaborators register their handlers at startup; callers then build task
/// trees with [`task`](Automator::task) and run them. Handlers that need
/// globally ordered side effects capture a clone of
/// [`ordering_queue`](Automator::ordering_queue).
///
/// Cloning yields another handle onto the same registry and queue.
#[derive(Clone, Debug)]
pub struct Automator {
    registry: HandlerRegistry,
    factory: TaskFactory,
    queue: OrderingQueue,
}

impl Default for Automator {
    fn default() -> Self {
        Self::new()
    }
}

impl Automator {
    pub fn new() -> Self {
        let registry = HandlerRegistry::new();
        Self {
            factory: TaskFactory::new(registry.clone()),
            registry,
            queue: OrderingQueue::new(),
        }
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register_handler<H: Handler + 'static>(&self, name: impl Into<String>, handler: H) {
        self.registry.register(name, handler);
    }

    /// Build a task tree rooted at `name`.
    ///
    /// Construction failures are returned here, synchronously; run-time
    /// failures surface from [`Task::run`].
    pub fn task(
        &self,
        name: &str,
        descriptor: Option<Descriptor>,
        context: Option<Context>,
    ) -> Result<Task> {
        let task = self.factory.build(name, descriptor, context)?;
        debug!(task = %name, "Task tree ready");
        Ok(task)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn ordering_queue(&self) -> &OrderingQueue {
        &self.queue
    }

    /// See [`context::extract_attributes`].
    pub fn extract_attributes<S: AsRef<str>>(descriptor: &Descriptor, attrs: &[S]) -> Descriptor {
        context::extract_attributes(descriptor, attrs)
    }

    /// See [`context::ensure_parameters`].
    pub fn ensure_parameters<'a, S: AsRef<str>>(
        descriptor: &'a Descriptor,
        required: &[S],
    ) -> Result<&'a Descriptor> {
        context::ensure_parameters(descriptor, required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AutomatorError, ErrorKind};
    use serde_json::{Value, json};

    async fn title(descriptor: Descriptor, _context: Context) -> Result<Value> {
        let descriptor = Automator::ensure_parameters(&descriptor, &["title"])?;
        Ok(descriptor["title"].clone())
    }

    #[test]
    fn test_task_requires_registration() {
        let automator = Automator::new();
        let err = automator.task("workspace", None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TaskNotFound);

        automator.register_handler("workspace", title);
        assert!(automator.task("workspace", None, None).is_ok());
    }

    #[test]
    fn test_clones_share_registry() {
        let automator = Automator::new();
        let clone = automator.clone();
        clone.register_handler("workspace", title);
        assert!(automator.registry().contains("workspace"));
    }

    #[tokio::test]
    async fn test_handler_key_error_passes_through() {
        let automator = Automator::new();
        automator.register_handler("workspace", title);

        let task = automator.task("workspace", None, None).unwrap();
        let err = task.run(Context::new()).await.unwrap_err();
        assert!(matches!(err, AutomatorError::KeyError { ref key, .. } if key == "title"));
    }

    #[tokio::test]
    async fn test_run_returns_root_result() {
        let automator = Automator::new();
        automator.register_handler("workspace", title);

        let mut descriptor = Descriptor::new();
        descriptor.insert("title".into(), json!("Research"));
        let task = automator.task("workspace", Some(descriptor), None).unwrap();
        assert_eq!(task.run(Context::new()).await.unwrap(), json!("Research"));
    }

    #[test]
    fn test_extract_attributes_helper() {
        let mut descriptor = Descriptor::new();
        descriptor.insert("label".into(), json!("Home"));
        descriptor.insert("icon".into(), Value::Null);
        let narrowed = Automator::extract_attributes(&descriptor, &["label", "icon"]);
        assert_eq!(Value::Object(narrowed), json!({ "label": "Home" }));
    }
}
