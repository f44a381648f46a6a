//! Tile server URL construction.
//!
//! Turns resolved tile addresses into download URLs and overlay entries for
//! quadkey-addressed tile servers.
//!
//! ```
//! use geoloop::provider::{MapType, TileServer};
//!
//! let server = TileServer::new(MapType::Aerial);
//! assert_eq!(
//!     server.tile_url("0231"),
//!     "http://1.ortho.tiles.virtualearth.net/tiles/a0231.jpeg?g=1"
//! );
//! ```

mod virtual_earth;

pub use virtual_earth::{MapType, TileServer, DEFAULT_HOST, DEFAULT_LAYER_GROUP, DEFAULT_TEMPLATE};
