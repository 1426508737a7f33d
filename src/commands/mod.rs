// ABOUTME: Command module aggregator for the rollout CLI.
// ABOUTME: Re-exports deploy, status, rollback, and stages command handlers.

mod deploy;
mod rollback;
mod stages;
mod status;

pub use deploy::deploy;
pub use rollback::rollback;
pub use stages::list_stages;
pub use status::status;

use crate::cli::Target;
use rollout::config::Config;
use rollout::error::Result;
use std::env;

/// Load the configuration named by `target` and apply its environment.
pub fn load_config(target: &Target) -> Result<Config> {
    let cwd = env::current_dir()?;
    let config = Config::resolve(target.config.as_deref(), &cwd)?;
    match &target.environment {
        Some(name) => config.for_environment(name),
        None => Ok(config),
    }
}
