//! Resolve command - show which tile a view state lands on.

use clap::Args;
use geoloop::coord::{self, meters_per_pixel, tile_sector};
use geoloop::provider::{MapType, TileServer};
use std::path::Path;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the resolve command.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Eye latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Eye longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Angular extent of the view in degrees
    #[arg(long, default_value_t = 10.0)]
    pub extent: f64,

    /// Map type (hybrid, aerial, road); defaults to [tiles] map_type
    #[arg(long)]
    pub map_type: Option<MapType>,
}

/// Build the tile server, letting the command line override the map type.
pub fn server_for(runner: &CliRunner, map_type: Option<MapType>) -> Result<TileServer, CliError> {
    let server = runner.tile_server()?;
    Ok(match map_type {
        Some(map_type) if map_type != server.map_type() => TileServer::new(map_type)
            .with_host(server.host())
            .with_zooms(server.zooms()),
        _ => server,
    })
}

/// Run the resolve command.
pub fn run(args: ResolveArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let runner = CliRunner::new(config_path)?;
    runner.log_startup("resolve");
    let server = server_for(&runner, args.map_type)?;

    let resolved = coord::resolve(args.lat, args.lon, args.extent, server.zooms())?;
    let sector = tile_sector(&resolved.tile);

    println!("View: {}, {} ({} deg)", args.lat, args.lon, args.extent);
    println!("  Zoom:     {}", resolved.tile.zoom);
    println!("  Row:      {}", resolved.tile.row);
    println!("  Column:   {}", resolved.tile.col);
    println!("  Quadkey:  {}", resolved.quadkey);
    println!("  Layer:    {}", server.layer_name(&resolved.quadkey));
    println!("  URL:      {}", server.tile_url(&resolved.quadkey));
    println!(
        "  Sector:   S {:.6}  N {:.6}  W {:.6}  E {:.6}",
        sector.south, sector.north, sector.west, sector.east
    );
    println!(
        "  Ground:   {:.2} m/pixel at the equator",
        meters_per_pixel(resolved.tile.zoom)
    );

    Ok(())
}
