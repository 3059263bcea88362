//! CLI command handlers.

pub mod handlers;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::Result;
use console::{Style, style};
use spaceforge_automator::{
    AppendHandler, Automator, ErrorEnvelope, Task, TaskState, TaskTree, register_builtins,
};
use spaceforge_config::SpaceforgeConfig;

use crate::plan::Plan;

/// Shared context for all commands.
pub struct Context {
    pub config: SpaceforgeConfig,
    pub automator: Automator,
    /// The built-in `append` handler, kept for reporting the lists it built.
    pub append: AppendHandler,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn new(config: SpaceforgeConfig, json_output: bool, verbose: bool) -> Self {
        let automator = Automator::new();
        let append = register_builtins(&automator);
        Self {
            config,
            automator,
            append,
            json_output,
            verbose,
        }
    }

    /// Resolve and load a plan, then build its task tree.
    ///
    /// The outer error covers reading the plan; the inner one is the
    /// automator's construction error, which callers report as an envelope.
    pub fn build(&self, plan: &Path) -> Result<(Plan, spaceforge_automator::Result<Task>)> {
        let path = self.config.resolve_plan(plan);
        let plan = Plan::load(&path)?;
        tracing::debug!(plan = %path.display(), task = %plan.task, "Loaded plan");

        let task = self.automator.task(
            &plan.task,
            plan.descriptor.clone(),
            Some(plan.default_context(&self.config.context)),
        );
        Ok((plan, task))
    }
}

/// Print a task tree, one line per task.
pub fn print_tree(tree: &TaskTree) {
    print_tree_at(tree, 1);
}

fn print_tree_at(tree: &TaskTree, depth: usize) {
    let (marker, state_style) = match tree.state {
        TaskState::Success => ("✔", Style::new().green()),
        TaskState::Error => ("✖", Style::new().red()),
        TaskState::Progress => ("…", Style::new().yellow()),
        TaskState::Idle => ("○", Style::new().dim()),
    };
    // tasks that have not settled are dimmed
    let name_style = if tree.state.is_terminal() {
        Style::new()
    } else {
        Style::new().dim()
    };
    println!(
        "{}{} {} {}",
        "  ".repeat(depth),
        state_style.apply_to(marker),
        name_style.apply_to(&tree.name),
        Style::new().dim().apply_to(format!("({})", state_label(tree.state)))
    );
    for subtask in &tree.subtasks {
        print_tree_at(subtask, depth + 1);
    }
}

/// Print an error envelope in human-readable form.
pub fn print_envelope(envelope: &ErrorEnvelope) {
    println!(
        "{} {}",
        style(format!("{:?}:", envelope.kind)).red().bold(),
        envelope.message
    );
    if !envelope.data.is_null() {
        let data = serde_json::to_string_pretty(&envelope.data).unwrap_or_default();
        for line in data.lines() {
            println!("  {}", Style::new().dim().apply_to(line));
        }
    }
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Idle => "idle",
        TaskState::Progress => "progress",
        TaskState::Success => "success",
        TaskState::Error => "error",
    }
}
