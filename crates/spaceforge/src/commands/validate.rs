//! Validate command - build a plan's task tree without running it.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use serde::Serialize;
use spaceforge_automator::{ErrorEnvelope, TaskTree};

use super::{Context, print_envelope, print_tree};

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Plan file, or a plan name looked up in the configured plans directory
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<TaskTree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorEnvelope>,
}

/// Run the validate command.
pub fn run(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let (_, built) = ctx.build(&args.plan)?;

    let output = match built {
        Ok(task) => ValidateOutput {
            valid: true,
            tree: Some(task.tree()),
            error: None,
        },
        Err(err) => ValidateOutput {
            valid: false,
            tree: None,
            error: Some(err.envelope()),
        },
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(ref tree) = output.tree {
        println!("{} {}", style("✔").green(), style("Plan is valid").bold());
        print_tree(tree);
    } else if let Some(ref envelope) = output.error {
        print_envelope(envelope);
    }

    if !output.valid {
        bail!("plan '{}' is invalid", args.plan.display());
    }
    Ok(())
}
