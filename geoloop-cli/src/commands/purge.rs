//! Purge command - remove cached overlay files.

use clap::Args;
use std::path::Path;

use super::common::{static_group, LayerArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the purge command.
#[derive(Debug, Args)]
pub struct PurgeArgs {
    #[command(flatten)]
    pub layer: LayerArgs,
}

/// Run the purge command.
pub fn run(args: PurgeArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("purge");

    let cache = runner.open_cache()?;
    println!("Purging group '{}' from {}", args.layer.group, cache.cache_dir().display());

    let group = static_group(cache, &args.layer)?;
    let removed = group.purge()?;

    println!("Removed {} of {} cached overlays", removed, group.len());
    Ok(())
}
