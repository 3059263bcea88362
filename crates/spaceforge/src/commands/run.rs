//! Run command - build a plan's task tree and run it.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use serde::Serialize;
use serde_json::{Map, Value};
use spaceforge_automator::{ErrorEnvelope, TaskTree};

use super::{Context, print_envelope, print_tree};
use crate::plan::parse_context_pair;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Plan file, or a plan name looked up in the configured plans directory
    pub plan: PathBuf,

    /// Run-time context entry (key=value, value parsed as JSON when possible)
    #[arg(short, long = "context", value_name = "KEY=VALUE", value_parser = parse_context_pair)]
    pub context: Vec<(String, Value)>,
}

/// Run result for JSON output.
#[derive(Debug, Serialize)]
struct RunOutput {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<TaskTree>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    lists: Map<String, Value>,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let (plan, built) = ctx.build(&args.plan)?;

    let task = match built {
        Ok(task) => task,
        Err(err) => {
            report(
                ctx,
                RunOutput {
                    ok: false,
                    result: None,
                    error: Some(err.envelope()),
                    tree: None,
                    lists: Map::new(),
                },
            )?;
            bail!("plan '{}' could not be built", args.plan.display());
        }
    };

    tracing::info!(task = %plan.task, "Running plan");
    let outcome = task.run(args.context.into_iter().collect()).await;

    let lists = ctx
        .append
        .list_names()
        .into_iter()
        .map(|name| {
            let items = ctx.append.snapshot(&name);
            (name, Value::Array(items))
        })
        .collect();

    let (ok, result, error) = match outcome {
        Ok(result) => (true, Some(result), None),
        Err(err) => (false, task.result(), Some(err.envelope())),
    };
    report(
        ctx,
        RunOutput {
            ok,
            result,
            error,
            tree: Some(task.tree()),
            lists,
        },
    )?;

    if !ok {
        bail!("task '{}' failed", plan.task);
    }
    Ok(())
}

fn report(ctx: &Context, output: RunOutput) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(ref tree) = output.tree {
        println!("{}", style("Task tree").bold());
        print_tree(tree);
        println!();
    }

    if let Some(ref result) = output.result {
        println!("{}", style("Result").bold());
        for line in serde_json::to_string_pretty(result)?.lines() {
            println!("  {line}");
        }
        println!();
    }

    if !output.lists.is_empty() {
        println!("{}", style("Lists").bold());
        for (name, items) in &output.lists {
            println!("  {name}: {items}");
        }
        println!();
    }

    if let Some(ref envelope) = output.error {
        print_envelope(envelope);
    }
    Ok(())
}
