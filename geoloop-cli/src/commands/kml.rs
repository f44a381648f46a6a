//! KML command - export overlays as a KML document.

use clap::Args;
use geoloop::overlay::HrefMode;
use std::path::{Path, PathBuf};

use super::common::{static_group, LayerArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the kml command.
#[derive(Debug, Args)]
pub struct KmlArgs {
    #[command(flatten)]
    pub layer: LayerArgs,

    /// Write hrefs relative to the cache directory instead of absolute
    #[arg(long)]
    pub relative: bool,

    /// Fetch every overlay first so hrefs point at cached files
    #[arg(long)]
    pub prewarm: bool,

    /// Output file (prints to stdout if omitted)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Run the kml command.
pub fn run(args: KmlArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("kml");

    let cache = runner.open_cache()?;
    let group = static_group(cache, &args.layer)?;

    if args.prewarm {
        let summary = group.prewarm()?;
        eprintln!(
            "Prewarmed {} overlays ({} failed)",
            summary.ready, summary.failed
        );
    }

    let mode = if args.relative {
        HrefMode::Relative
    } else {
        HrefMode::Absolute
    };
    let document = group.to_kml(mode);

    match &args.output {
        Some(path) => {
            runner.write_file(path, &document)?;
            println!("Wrote {} overlays to {}", group.len(), path.display());
        }
        None => print!("{}", document),
    }

    Ok(())
}
