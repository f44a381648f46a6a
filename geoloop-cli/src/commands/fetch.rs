//! Fetch command - bring one overlay into the tile cache.

use clap::Args;
use geoloop::cache::AsyncFetch;
use geoloop::coord::Sector;
use geoloop::overlay::{CacheKey, OverlayEntry};
use geoloop::provider::{MapType, DEFAULT_LAYER_GROUP};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::common::{overlay_name, parse_bounds, source_ref};
use super::resolve::server_for;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
///
/// Either `--source` with `--bounds`, or `--lat`/`--lon` to fetch the tile
/// under a view.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Overlay image URL or local file
    #[arg(long, requires = "bounds", conflicts_with_all = ["lat", "lon"])]
    pub source: Option<String>,

    /// Overlay bounds as south,north,west,east in decimal degrees
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: Option<Sector>,

    /// Layer group the overlay belongs to
    #[arg(long)]
    pub group: Option<String>,

    /// Eye latitude of the view in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "lon", required_unless_present = "source")]
    pub lat: Option<f64>,

    /// Eye longitude of the view in decimal degrees
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,

    /// Angular extent of the view in degrees
    #[arg(long, default_value_t = 10.0)]
    pub extent: f64,

    /// Map type (hybrid, aerial, road); defaults to [tiles] map_type
    #[arg(long)]
    pub map_type: Option<MapType>,

    /// Fetch on a background worker and wait for it
    #[arg(long)]
    pub background: bool,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("fetch");

    let entry = Arc::new(build_entry(&args, &runner)?);
    let cache = runner.open_cache()?;

    println!("Fetching overlay:");
    println!("  Key:    {}", entry.cache_key());
    println!("  Source: {}", entry.origin());
    println!();

    let start = Instant::now();
    if args.background {
        match cache.asynchronous_fetch(Arc::clone(&entry))? {
            AsyncFetch::Started(handle) => {
                let outcome = handle.join().map_err(|_| {
                    CliError::InvalidArgument("fetch worker panicked".to_string())
                })?;
                outcome?;
            }
            AsyncFetch::Coalesced => println!("Another fetch of this key is in flight"),
            AsyncFetch::Cached => println!("Already stored on disk"),
        }
    }

    let image = cache.try_get(&entry)?;
    
    println!("Stored:    {}", cache.path_for(&entry).display());
    println!("Image:     {}x{} pixels", image.width(), image.height());
    println!("Elapsed:   {:.2}s", start.elapsed().as_secs_f64());
    println!();
    print!(
        "{}",
        cache
            .statistics()
            .format(&cache.cache_dir().display().to_string())
    );

    Ok(())
}

fn build_entry(args: &FetchArgs, runner: &CliRunner) -> Result<OverlayEntry, CliError> {
    if let Some(value) = &args.source {
        let bounds = args.bounds.ok_or_else(|| {
            CliError::InvalidArgument("--source requires --bounds".to_string())
        })?;
        let source = source_ref(value);
        let group = args.group.as_deref().unwrap_or("Overlays");
        return Ok(OverlayEntry::from_source(
            &CacheKey::group_prefix(group),
            overlay_name(&source, 0),
            bounds,
            source,
        ));
    }

    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => {
            let server = server_for(runner, args.map_type)?;
            let group = args.group.as_deref().unwrap_or(DEFAULT_LAYER_GROUP);
            Ok(server.overlay_for_view(lat, lon, args.extent, group)?)
        }
        _ => Err(CliError::InvalidArgument(
            "either --source with --bounds or --lat with --lon is required".to_string(),
        )),
    }
}
