//! Run-once task instances and their subtask trees.
//!
//! A [`Task`] binds a task-type name to a descriptor, a default context and
//! the subtasks built from the descriptor's `after` list. Running it invokes
//! the registered handler once, then runs every subtask concurrently with the
//! handler's result folded into their context.
//!
//! ```text
//!  Idle ──run()──▶ Progress ──handler ok, subtasks ok──▶ Success
//!                     │
//!                     └──handler err / any subtask err──▶ Error
//! ```
//!
//! The first `run` claims the execution; every later call, concurrent or not,
//! gets the same outcome without invoking the handler again.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt, Shared, join_all};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::context::{Context, Descriptor, fold_result, merge_context};
use crate::error::{AutomatorError, Result};
use crate::registry::HandlerRegistry;

/// Settled outcome of a task run: the handler's own result, or the failure.
pub type TaskOutcome = Result<Value>;

/// Future returned by [`Task::run`]. Clones resolve to the same outcome.
pub type RunFuture = Shared<BoxFuture<'static, TaskOutcome>>;

/// Lifecycle state of a task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Progress,
    Success,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }
}

/// Serializable snapshot of a task tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTree {
    pub name: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskTree>,
}

enum RunSlot {
    Idle,
    Running(RunFuture),
    Settled(TaskOutcome),
}

struct TaskInner {
    name: String,
    descriptor: Descriptor,
    default_context: Context,
    subtasks: Vec<Task>,
    registry: HandlerRegistry,
    slot: Mutex<RunSlot>,
    result: Mutex<Option<Value>>,
}

/// Handle onto one task instance.
///
/// Cloning the handle does not create a new instance: all clones share the
/// same state and the same single execution.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    pub(crate) fn new(
        name: String,
        descriptor: Descriptor,
        default_context: Context,
        subtasks: Vec<Task>,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                name,
                descriptor,
                default_context,
                subtasks,
                registry,
                slot: Mutex::new(RunSlot::Idle),
                result: Mutex::new(None),
            }),
        }
    }

    /// Task-type name this instance was built for.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.inner.descriptor
    }

    pub fn default_context(&self) -> &Context {
        &self.inner.default_context
    }

    /// Subtasks in `after` declaration order.
    pub fn subtasks(&self) -> &[Task] {
        &self.inner.subtasks
    }

    pub fn state(&self) -> TaskState {
        match &*self.inner.slot.lock() {
            RunSlot::Idle => TaskState::Idle,
            RunSlot::Running(_) => TaskState::Progress,
            RunSlot::Settled(Ok(_)) => TaskState::Success,
            RunSlot::Settled(Err(_)) => TaskState::Error,
        }
    }

    /// The handler's own result, once the run has settled.
    ///
    /// Set even when a subtask failed the overall outcome; `None` while the
    /// subtasks are still running.
    pub fn result(&self) -> Option<Value> {
        self.inner.result.lock().clone()
    }

    /// The failure this task settled with, if any.
    pub fn error(&self) -> Option<AutomatorError> {
        match &*self.inner.slot.lock() {
            RunSlot::Settled(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Run the task with `context` layered over its default context.
    ///
    /// Only the first call starts an execution; later calls ignore their
    /// context and return the memoized outcome. The handler runs when the
    /// returned future is first polled.
    pub fn run(&self, context: Context) -> RunFuture {
        let mut slot = self.inner.slot.lock();
        match &*slot {
            RunSlot::Running(pending) => return pending.clone(),
            RunSlot::Settled(outcome) => return future::ready(outcome.clone()).boxed().shared(),
            RunSlot::Idle => {}
        }

        debug!(task = %self.inner.name, subtasks = self.inner.subtasks.len(), "Task claimed");
        let inner = Arc::clone(&self.inner);
        let pending = inner.execute(context).boxed().shared();
        *slot = RunSlot::Running(pending.clone());
        pending
    }

    /// Snapshot of this task and its subtasks.
    pub fn tree(&self) -> TaskTree {
        TaskTree {
            name: self.inner.name.clone(),
            state: self.state(),
            subtasks: self.inner.subtasks.iter().map(Task::tree).collect(),
        }
    }
}

impl TaskInner {
    async fn execute(self: Arc<Self>, caller_context: Context) -> TaskOutcome {
        let outcome = self.execute_tree(caller_context).await;
        match &outcome {
            Ok(_) => debug!(task = %self.name, "Task succeeded"),
            Err(err) => warn!(task = %self.name, error = %err, "Task failed"),
        }
        *self.slot.lock() = RunSlot::Settled(outcome.clone());
        outcome
    }

    async fn execute_tree(&self, caller_context: Context) -> TaskOutcome {
        let context = merge_context(&self.default_context, caller_context);

        // construction checked the name; a registry has no removal
        let handler = self
            .registry
            .get(&self.name)
            .ok_or_else(|| AutomatorError::TaskNotFound {
                name: self.name.clone(),
            })?;

        let result = AssertUnwindSafe(handler.handle(self.descriptor.clone(), context.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(handler_panicked(&self.name, panic.as_ref())))?;

        if self.subtasks.is_empty() {
            *self.result.lock() = Some(result.clone());
            return Ok(result);
        }

        debug!(task = %self.name, subtasks = self.subtasks.len(), "Launching subtasks");
        let sub_context = fold_result(&context, &self.name, &result);
        let outcomes = join_all(
            self.subtasks
                .iter()
                .map(|subtask| subtask.run(sub_context.clone())),
        )
        .await;

        *self.result.lock() = Some(result.clone());

        let mut first_failure = None;
        for (subtask, outcome) in self.subtasks.iter().zip(outcomes) {
            if let Err(err) = outcome {
                warn!(task = %self.name, subtask = %subtask.name(), error = %err, "Subtask failed");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }
}

fn handler_panicked(task: &str, payload: &(dyn Any + Send)) -> AutomatorError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    AutomatorError::handler_with_data(
        format!("handler for '{task}' panicked: {detail}"),
        json!({ "task": task, "panic": detail }),
    )
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("subtasks", &self.inner.subtasks)
            .finish()
    }
}
