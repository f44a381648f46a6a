//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::cache::RepairPolicy;
use crate::provider::MapType;
use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub fetch: FetchSettings,
    pub tiles: TileSettings,
    pub animation: AnimationSettings,
    pub logging: LoggingSettings,
}

/// Tile cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Root of the disk store
    pub directory: PathBuf,
    /// Memory layer budget in bytes
    pub memory_size: usize,
    /// When stored images are resized
    pub repair: RepairPolicy,
    /// Edge length in pixels of repaired images
    pub canonical_size: u32,
}

/// HTTP fetch configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    pub user_agent: String,
}

/// Tile server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSettings {
    pub host: String,
    pub map_type: MapType,
    /// Coarsest zoom level offered by the server
    pub min_zoom: u8,
    /// Finest zoom level offered by the server
    pub max_zoom: u8,
}

/// Animation loop configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSettings {
    /// Frame period at speed 1, in milliseconds
    pub base_interval_ms: u64,
    /// Speed dial position for new loops (1-100)
    pub default_speed: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}
