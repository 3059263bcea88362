//! Task orchestration engine for spaceforge provisioning workflows.
//!
//! Provisioning a collaboration space is a tree of dependent steps: create
//! the workspace, then attach navigation entries and link storage, each of
//! which may have follow-ups of its own. This crate runs such trees.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Automator                                              │
//! │  - HandlerRegistry: task name → Handler                 │
//! │  - TaskFactory: descriptor → Task tree (built up front) │
//! │  - OrderingQueue: globally ordered side effects         │
//! └─────────────────────────────────────────────────────────┘
//!            │ task(name, descriptor, context)
//!            ▼
//!   Task ──run(ctx)──▶ handler ──ok──▶ subtasks (concurrent, ctx + result)
//! ```
//!
//! Handlers are external collaborators registered by name. Each task runs its
//! handler at most once, passes the result down to its subtasks keyed by its
//! own name, and settles only when its whole subtree has.

pub mod automator;
pub mod builtin;
pub mod context;
pub mod error;
pub mod factory;
pub mod queue;
pub mod registry;
pub mod task;

pub use automator::Automator;
pub use builtin::{AppendHandler, register_builtins};
pub use context::{
    AFTER_KEY, Context, Descriptor, ensure_parameters, extract_attributes, fold_result,
    merge_context,
};
pub use error::{AutomatorError, ErrorEnvelope, ErrorKind, Result};
pub use factory::{DependencySpec, TaskFactory, dependency_specs};
pub use queue::{OrderingQueue, StepHandle};
pub use registry::{Handler, HandlerRegistry};
pub use task::{RunFuture, Task, TaskOutcome, TaskState, TaskTree};
