// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use rollout::stage::SkipFlags;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rollout")]
#[command(about = "Staged infrastructure and application rollout to Kubernetes")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI (only final result)
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Output JSON lines for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Selects the configuration and environment to act on.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Environment overrides to apply (defined in config)
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct SkipArgs {
    /// Skip provisioning, cluster configuration, the ingress controller, and image publishing
    #[arg(long)]
    pub skip_infrastructure: bool,

    /// Skip the monitoring stack
    #[arg(long)]
    pub skip_monitoring: bool,

    /// Skip building and publishing the image
    #[arg(long)]
    pub skip_image_build: bool,

    /// Skip the ingress controller and ingress rule
    #[arg(long)]
    pub skip_ingress: bool,
}

impl From<SkipArgs> for SkipFlags {
    fn from(args: SkipArgs) -> Self {
        SkipFlags {
            infrastructure: args.skip_infrastructure,
            monitoring: args.skip_monitoring,
            image_build: args.skip_image_build,
            ingress: args.skip_ingress,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new rollout.yml configuration file
    Init {
        /// Project name (also the Helm release name)
        #[arg(short, long)]
        project: Option<String>,

        /// Container image reference
        #[arg(short, long)]
        image: Option<String>,

        /// Overwrite existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Run the rollout pipeline
    Deploy {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        skip: SkipArgs,

        /// Write a plain-text run report to the working directory
        #[arg(long)]
        report: bool,
    },

    /// List the pipeline stages and the flags that skip them
    Stages,

    /// Show release status and pods
    Status {
        #[command(flatten)]
        target: Target,
    },

    /// Roll the application release back
    Rollback {
        #[command(flatten)]
        target: Target,

        /// Revision to roll back to (defaults to the previous one)
        #[arg(short, long)]
        revision: Option<u32>,
    },
}
