//! Coordinate type definitions

use thiserror::Error;

/// Web Mercator valid latitude range
pub const MIN_LAT: f64 = -85.05112878;
pub const MAX_LAT: f64 = 85.05112878;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Tile pyramid limits.
///
/// Zoom 1 is the most zoomed-out level with a non-empty quadkey.
pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 23;

/// Edge length of one tile in pixels.
pub const TILE_SIZE_PIXELS: u32 = 256;

/// Equatorial Earth radius used by the spherical-Mercator projection (meters).
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Tile coordinates in the spherical-Mercator quadtree.
///
/// Rows are counted from the southern edge of the projection, columns
/// from the antimeridian eastwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Y coordinate (south-north), 0 at south
    pub row: u32,
    /// X coordinate (west-east), 0 at west
    pub col: u32,
    /// Zoom level
    pub zoom: u8,
}

/// Result of resolving a view state to a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTile {
    pub tile: TileCoord,
    pub quadkey: String,
}

/// Inclusive range of zoom levels a tile server offers.
///
/// `coarsest` is the most zoomed-out level, `finest` the most zoomed-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomRange {
    coarsest: u8,
    finest: u8,
}

impl ZoomRange {
    /// Create a zoom range, rejecting empty or out-of-pyramid ranges.
    pub fn new(coarsest: u8, finest: u8) -> Result<Self, CoordError> {
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&coarsest) {
            return Err(CoordError::InvalidZoom(coarsest));
        }
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&finest) {
            return Err(CoordError::InvalidZoom(finest));
        }
        if coarsest > finest {
            return Err(CoordError::InvalidZoomRange { coarsest, finest });
        }
        Ok(Self { coarsest, finest })
    }

    pub fn coarsest(&self) -> u8 {
        self.coarsest
    }

    pub fn finest(&self) -> u8 {
        self.finest
    }
}

impl Default for ZoomRange {
    /// Levels 1 through 19, the range offered by the Virtual Earth servers.
    fn default() -> Self {
        Self {
            coarsest: 1,
            finest: 19,
        }
    }
}

/// Immutable geographic bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sector {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

impl Sector {
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> Self {
        Self {
            south,
            north,
            west,
            east,
        }
    }

    /// The whole globe.
    pub fn full_sphere() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    /// Latitude/longitude extent in degrees.
    pub fn delta_lat(&self) -> f64 {
        self.north - self.south
    }

    pub fn delta_lon(&self) -> f64 {
        self.east - self.west
    }

    /// Center of the sector as (lat, lon).
    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

/// Errors that can occur during coordinate conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Longitude is outside valid range (-180.0 to 180.0) or not finite
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Latitude is not a finite number
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Zoom level is outside the tile pyramid
    #[error("Invalid zoom level: {0} (must be between 1 and 23)")]
    InvalidZoom(u8),

    /// Coarsest level lies below the finest level
    #[error("Invalid zoom range: coarsest {coarsest} is finer than {finest}")]
    InvalidZoomRange { coarsest: u8, finest: u8 },

    /// Quadkey contains invalid characters or is too long
    #[error("Invalid quadkey: '{0}' (must contain only digits 0-3 and length 1-23)")]
    InvalidQuadkey(String),
}
