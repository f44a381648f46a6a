//! Tile address resolution.
//!
//! Converts a geographic view state (eye position plus angular view extent)
//! into a spherical-Mercator tile coordinate and its quadkey, the base-4
//! address used by quadtree tile servers.

mod types;

pub use types::{
    CoordError, ResolvedTile, Sector, TileCoord, ZoomRange, EARTH_RADIUS_METERS, MAX_LAT,
    MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM, TILE_SIZE_PIXELS,
};

use std::f64::consts::PI;

/// Resolves an eye position and view extent to a tile and quadkey.
///
/// The zoom level is chosen by [`select_zoom`]; the tile containing the eye
/// position at that level is then addressed by its quadkey.
///
/// # Arguments
///
/// * `eye_lat` - Eye latitude in degrees (clamped to the Mercator limits)
/// * `eye_lon` - Eye longitude in degrees (-180.0 to 180.0)
/// * `view_extent_deg` - Angular extent of the current view in degrees
/// * `zooms` - Zoom levels offered by the tile server
///
/// # Example
///
/// ```
/// use geoloop::coord::{resolve, ZoomRange};
///
/// let resolved = resolve(45.0, 90.0, 180.0, ZoomRange::default()).unwrap();
/// assert_eq!(resolved.tile.zoom, 1);
/// assert_eq!(resolved.quadkey, "3");
/// ```
pub fn resolve(
    eye_lat: f64,
    eye_lon: f64,
    view_extent_deg: f64,
    zooms: ZoomRange,
) -> Result<ResolvedTile, CoordError> {
    let zoom = select_zoom(view_extent_deg, zooms);
    let tile = to_tile_coords(eye_lat, eye_lon, zoom)?;
    let quadkey = tile_to_quadkey(&tile);

    Ok(ResolvedTile { tile, quadkey })
}

/// Selects the zoom level for a view of the given angular extent.
///
/// Levels are walked from coarsest to finest. At offset `i` from the
/// coarsest level the nominal view angle is `180 / 2^i` degrees, and the
/// first level whose nominal angle does not exceed the extent wins. Views
/// narrower than every level (and degenerate extents) get the finest level.
pub fn select_zoom(view_extent_deg: f64, zooms: ZoomRange) -> u8 {
    if !view_extent_deg.is_finite() || view_extent_deg <= 0.0 {
        return zooms.finest();
    }

    for zoom in zooms.coarsest()..=zooms.finest() {
        let offset = (zoom - zooms.coarsest()) as i32;
        let nominal_angle = 180.0 / 2.0_f64.powi(offset);
        if nominal_angle <= view_extent_deg {
            return zoom;
        }
    }

    zooms.finest()
}

/// Ground resolution at the equator for a zoom level.
#[inline]
pub fn meters_per_pixel(zoom: u8) -> f64 {
    (2.0 * PI * EARTH_RADIUS_METERS) / (2.0_f64.powi(zoom as i32) * TILE_SIZE_PIXELS as f64)
}

/// Converts geographic coordinates to tile coordinates.
///
/// Latitude is clamped to the Mercator limits; longitude must be within
/// -180..=180. The easternmost/northernmost edge maps to the last tile.
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !lat.is_finite() {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let lat = lat.clamp(MIN_LAT, MAX_LAT);
    let r = EARTH_RADIUS_METERS;
    let mpp = meters_per_pixel(zoom);

    let sin_lat = lat.to_radians().sin();
    let northing = r * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / 2.0;

    let x = ((PI * r + r * lon.to_radians()) / mpp).round();
    let y = ((PI * r + northing) / mpp).round();

    let last = (1_u64 << zoom) - 1;
    let col = ((x.max(0.0) as u64) / TILE_SIZE_PIXELS as u64).min(last) as u32;
    let row = ((y.max(0.0) as u64) / TILE_SIZE_PIXELS as u64).min(last) as u32;

    Ok(TileCoord { row, col, zoom })
}

/// Returns the geographic bounding box covered by a tile.
pub fn tile_sector(tile: &TileCoord) -> Sector {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let west = tile.col as f64 / n * 360.0 - 180.0;
    let east = (tile.col + 1) as f64 / n * 360.0 - 180.0;

    let lat_at = |row: f64| (PI * (2.0 * row / n - 1.0)).sinh().atan().to_degrees();
    let south = lat_at(tile.row as f64);
    let north = lat_at((tile.row + 1) as f64);

    Sector::new(south, north, west, east)
}

/// Encodes a tile as a quadkey.
///
/// One base-4 digit per level, most significant first: the column bit
/// contributes 1 and the row bit contributes 2.
///
/// ```
/// use geoloop::coord::{tile_to_quadkey, TileCoord};
///
/// let tile = TileCoord { row: 5, col: 3, zoom: 3 };
/// assert_eq!(tile_to_quadkey(&tile), "213");
/// ```
pub fn tile_to_quadkey(tile: &TileCoord) -> String {
    let mut quadkey = String::with_capacity(tile.zoom as usize);

    for level in (1..=tile.zoom).rev() {
        let mask = 1u32 << (level - 1);
        let mut digit = b'0';
        if tile.col & mask != 0 {
            digit += 1;
        }
        if tile.row & mask != 0 {
            digit += 2;
        }
        quadkey.push(digit as char);
    }

    quadkey
}

/// Decodes a quadkey back into tile coordinates.
pub fn quadkey_to_tile(quadkey: &str) -> Result<TileCoord, CoordError> {
    if quadkey.is_empty() || quadkey.len() > MAX_ZOOM as usize {
        return Err(CoordError::InvalidQuadkey(quadkey.to_string()));
    }

    let zoom = quadkey.len() as u8;
    let mut row = 0u32;
    let mut col = 0u32;

    for (i, ch) in quadkey.chars().enumerate() {
        let mask = 1u32 << (zoom as usize - 1 - i);
        match ch {
            '0' => {}
            '1' => col |= mask,
            '2' => row |= mask,
            '3' => {
                col |= mask;
                row |= mask;
            }
            _ => return Err(CoordError::InvalidQuadkey(quadkey.to_string())),
        }
    }

    Ok(TileCoord { row, col, zoom })
}
