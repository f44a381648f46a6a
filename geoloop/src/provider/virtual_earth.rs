//! Virtual Earth style quadkey tile servers

use crate::coord::{self, tile_sector, CoordError, ResolvedTile, ZoomRange};
use crate::overlay::{CacheKey, OverlayEntry, OverlayFormat, SourceRef};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Default tile host; the shard digit is prepended as a subdomain.
pub const DEFAULT_HOST: &str = "ortho.tiles.virtualearth.net";

/// URL template with `{shard}`, `{host}`, `{map}`, `{quadkey}` and `{ext}`
/// placeholders.
pub const DEFAULT_TEMPLATE: &str = "http://{shard}.{host}/tiles/{map}{quadkey}.{ext}?g=1";

/// Layer group used for tiles when the caller does not name one.
pub const DEFAULT_LAYER_GROUP: &str = "VirtualEarth";

/// Imagery style served by the tile server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapType {
    /// Aerial imagery with road labels
    #[default]
    Hybrid,
    /// Aerial imagery only
    Aerial,
    /// Road map
    Road,
}

impl MapType {
    /// Single-letter prefix of the tile path.
    pub fn code(&self) -> char {
        match self {
            MapType::Hybrid => 'h',
            MapType::Aerial => 'a',
            MapType::Road => 'r',
        }
    }

    /// Image format the server returns for this style.
    pub fn format(&self) -> OverlayFormat {
        match self {
            MapType::Hybrid | MapType::Aerial => OverlayFormat::Jpeg,
            MapType::Road => OverlayFormat::Png,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Hybrid => "hybrid",
            MapType::Aerial => "aerial",
            MapType::Road => "road",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" | "h" => Ok(MapType::Hybrid),
            "aerial" | "a" => Ok(MapType::Aerial),
            "road" | "r" => Ok(MapType::Road),
            other => Err(format!(
                "unknown map type '{}', expected hybrid, aerial or road",
                other
            )),
        }
    }
}

/// A quadkey-addressed tile server.
#[derive(Debug, Clone, PartialEq)]
pub struct TileServer {
    host: String,
    map_type: MapType,
    template: String,
    zooms: ZoomRange,
}

impl TileServer {
    /// Server on the default host with the default URL template.
    pub fn new(map_type: MapType) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            map_type,
            template: DEFAULT_TEMPLATE.to_string(),
            zooms: ZoomRange::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replace the URL template. See [`DEFAULT_TEMPLATE`] for placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_zooms(mut self, zooms: ZoomRange) -> Self {
        self.zooms = zooms;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn map_type(&self) -> MapType {
        self.map_type
    }

    pub fn zooms(&self) -> ZoomRange {
        self.zooms
    }

    /// Download URL of the tile with the given quadkey.
    ///
    /// The shard is the last quadkey digit, spreading neighbouring tiles
    /// over the server's four subdomains.
    pub fn tile_url(&self, quadkey: &str) -> String {
        let shard = quadkey.chars().last().unwrap_or('0');
        self.template
            .replace("{shard}", &shard.to_string())
            .replace("{host}", &self.host)
            .replace("{map}", &self.map_type.code().to_string())
            .replace("{quadkey}", quadkey)
            .replace("{ext}", self.map_type.format().suffix())
    }

    /// Layer name of a tile, unique per map type and quadkey.
    pub fn layer_name(&self, quadkey: &str) -> String {
        format!("{}{}", self.map_type.code(), quadkey)
    }

    /// Overlay entry for an already resolved tile.
    pub fn overlay_for_tile(&self, resolved: &ResolvedTile, layer_group: &str) -> OverlayEntry {
        let url = self.tile_url(&resolved.quadkey);
        trace!(quadkey = %resolved.quadkey, url = %url, "Tile overlay");

        OverlayEntry::new(
            &CacheKey::group_prefix(layer_group),
            self.layer_name(&resolved.quadkey),
            tile_sector(&resolved.tile),
            SourceRef::Remote(url),
            self.map_type.format(),
        )
        .with_description(format!(
            "{} tile {} at zoom {}",
            self.map_type, resolved.quadkey, resolved.tile.zoom
        ))
    }

    /// Overlay entry for the tile under the eye position of a view.
    pub fn overlay_for_view(
        &self,
        eye_lat: f64,
        eye_lon: f64,
        view_extent_deg: f64,
        layer_group: &str,
    ) -> Result<OverlayEntry, CoordError> {
        let resolved = coord::resolve(eye_lat, eye_lon, view_extent_deg, self.zooms)?;
        Ok(self.overlay_for_tile(&resolved, layer_group))
    }
}

impl Default for TileServer {
    fn default() -> Self {
        Self::new(MapType::default())
    }
}
