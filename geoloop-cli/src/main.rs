//! geoloop CLI - Command-line interface
//!
//! Drives the geoloop overlay cache and animation engine: resolve views to
//! tiles, fetch overlays into the cache, play animation loops and export KML.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::kml::KmlArgs;
use commands::play::PlayArgs;
use commands::purge::PurgeArgs;
use commands::resolve::ResolveArgs;

#[derive(Parser)]
#[command(name = "geoloop")]
#[command(version = geoloop::VERSION)]
#[command(about = "Cache ground overlays and play them as time loops", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.geoloop/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which tile a view state resolves to
    Resolve(ResolveArgs),

    /// Fetch one overlay into the tile cache
    Fetch(FetchArgs),

    /// Play overlays as an animation loop
    Play(PlayArgs),

    /// Export overlays as a KML document
    Kml(KmlArgs),

    /// Remove cached overlay files
    Purge(PurgeArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args, config_path),
        Commands::Fetch(args) => commands::fetch::run(args, config_path),
        Commands::Play(args) => commands::play::run(args, config_path),
        Commands::Kml(args) => commands::kml::run(args, config_path),
        Commands::Purge(args) => commands::purge::run(args, config_path),
        Commands::Config { command } => commands::config::run(command, config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
