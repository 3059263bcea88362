//! Handlers command - list registered handlers.

use anyhow::Result;
use clap::Args;
use console::style;

use super::Context;

/// Arguments for the handlers command.
#[derive(Args, Debug)]
pub struct HandlersArgs {}

/// Run the handlers command.
pub fn run(_args: HandlersArgs, ctx: &Context) -> Result<()> {
    let names = ctx.automator.registry().names();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&names)?);
        return Ok(());
    }

    println!("{}", style("Registered handlers").bold());
    for name in &names {
        println!("  {}", style(name).cyan());
    }
    if ctx.verbose {
        println!();
        println!("{} handler(s)", names.len());
    }
    Ok(())
}
