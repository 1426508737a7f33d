// ABOUTME: Entry point for the rollout CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use rollout::cancel::{CancelToken, InterruptOutcome, forward_interrupts};
use rollout::config;
use rollout::error::Result;
use rollout::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if forward_interrupts(on_interrupt, tokio::signal::ctrl_c).await == InterruptOutcome::Forced {
            std::process::exit(130);
        }
    });

    let result = run(cli.command, mode, cancel).await;

    if let Err(e) = result {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Commands, mode: OutputMode, cancel: CancelToken) -> Result<()> {
    let output = Output::new(mode);
    match command {
        Commands::Init {
            project,
            image,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, project.as_deref(), image.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Deploy {
            target,
            skip,
            report,
        } => {
            let config = commands::load_config(&target)?;
            commands::deploy(config, skip.into(), report, cancel, output).await
        }
        Commands::Stages => {
            commands::list_stages(&output);
            Ok(())
        }
        Commands::Status { target } => {
            let config = commands::load_config(&target)?;
            commands::status(config, output).await
        }
        Commands::Rollback { target, revision } => {
            let config = commands::load_config(&target)?;
            commands::rollback(config, revision, cancel, output).await
        }
    }
}
