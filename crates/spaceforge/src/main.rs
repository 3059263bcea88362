//! spaceforge - run collaboration-space provisioning plans
//!
//! Main entry point for the spaceforge CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod plan;

use commands::{handlers, run, validate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// spaceforge - run collaboration-space provisioning plans
#[derive(Parser)]
#[command(name = "spaceforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "SPACEFORGE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and run a plan's task tree
    Run(run::RunArgs),

    /// Build a plan's task tree without running it
    Validate(validate::ValidateArgs),

    /// List registered handlers
    Handlers(handlers::HandlersArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = spaceforge_config::load_config(None, cli.config_dir.as_deref());
    let _guard = init_tracing(&loaded.config, cli.verbose);

    for warning in loaded.warnings() {
        tracing::warn!("{}", warning);
    }
    for report in loaded.loaded() {
        tracing::debug!(layer = %report.layer, path = %report.path.display(), "Loaded config layer");
    }

    let ctx = commands::Context::new(loaded.config, cli.json, cli.verbose);

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Validate(args) => validate::run(args, &ctx),
        Commands::Handlers(args) => handlers::run(args, &ctx),
    }
}

/// Console output (human-readable, stderr) plus an optional daily-rotated
/// JSON file when `[logging] file_dir` is set.
///
/// `RUST_LOG` wins over both `--verbose` and the configured level.
fn init_tracing(config: &spaceforge_config::SpaceforgeConfig, verbose: bool) -> Option<WorkerGuard> {
    let level = if verbose { "debug" } else { config.log_level() };
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "spaceforge={level},spaceforge_automator={level},spaceforge_config={level},warn"
        ))
    });

    let (file_layer, guard) = match config.log_file_dir() {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "spaceforge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "spaceforge=trace,spaceforge_automator=trace,spaceforge_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
