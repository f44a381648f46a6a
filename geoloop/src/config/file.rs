//! Configuration file handling for ~/.geoloop/config.ini.
//!
//! Loads and saves user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`],
//! parsing in [`super::parser`], and serialization in [`super::writer`].

use super::settings::ConfigFile;
use crate::cache::CacheConfig;
use crate::coord::ZoomRange;
use crate::fetch::{FetchError, ReqwestFetcher};
use crate::provider::TileServer;
use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.geoloop/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to the default path (~/.geoloop/config.ini).
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = config_file_path();
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = self.to_ini_string();
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// The commented INI text written by [`save_to`](Self::save_to).
    pub fn to_ini_string(&self) -> String {
        super::writer::to_config_string(self)
    }

    /// Tile cache configuration from the `[cache]` section.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(&self.cache.directory)
            .with_memory_size(self.cache.memory_size)
            .with_repair(self.cache.repair)
            .with_canonical_size(self.cache.canonical_size)
    }

    /// HTTP fetcher from the `[fetch]` section.
    pub fn fetcher(&self) -> Result<ReqwestFetcher, FetchError> {
        ReqwestFetcher::with_options(self.fetch.timeout, &self.fetch.user_agent)
    }

    /// Tile server from the `[tiles]` section.
    pub fn tile_server(&self) -> Result<TileServer, ConfigFileError> {
        let zooms = ZoomRange::new(self.tiles.min_zoom, self.tiles.max_zoom).map_err(|e| {
            ConfigFileError::InvalidValue {
                section: "tiles".to_string(),
                key: "max_zoom".to_string(),
                value: self.tiles.max_zoom.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(TileServer::new(self.tiles.map_type)
            .with_host(&self.tiles.host)
            .with_zooms(zooms))
    }

    /// Frame period at speed 1 from the `[animation]` section.
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.animation.base_interval_ms)
    }
}

/// Get the path to the config directory (~/.geoloop).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geoloop")
}

/// Get the path to the config file (~/.geoloop/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{RepairPolicy, DEFAULT_MEMORY_SIZE};
    use crate::config::DEFAULT_LOG_FILE;
    use crate::provider::MapType;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.cache.memory_size, DEFAULT_MEMORY_SIZE);
        assert_eq!(config.cache.repair, RepairPolicy::OnMismatch);
        assert_eq!(config.tiles.map_type, MapType::Hybrid);
        assert_eq!(config.animation.default_speed, 50);
        assert_eq!(config.base_interval(), Duration::from_secs(10));
        assert_eq!(config.logging.file, DEFAULT_LOG_FILE);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.cache.directory = temp_dir.path().join("tiles");
        config.cache.memory_size = 64 * 1024 * 1024;
        config.cache.repair = RepairPolicy::Never;
        config.tiles.map_type = MapType::Road;
        config.tiles.max_zoom = 12;
        config.animation.default_speed = 80;
        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_cache_config_conversion() {
        let mut config = ConfigFile::default();
        config.cache.directory = PathBuf::from("/var/cache/overlays");
        config.cache.canonical_size = 512;

        let cache = config.cache_config();
        assert_eq!(cache.cache_dir, PathBuf::from("/var/cache/overlays"));
        assert_eq!(cache.canonical_size, 512);
        assert_eq!(cache.memory_size_bytes, DEFAULT_MEMORY_SIZE);
    }

    #[test]
    fn test_tile_server_conversion() {
        let mut config = ConfigFile::default();
        config.tiles.host = "tiles.example.com".to_string();
        config.tiles.map_type = MapType::Aerial;

        let server = config.tile_server().unwrap();
        assert_eq!(
            server.tile_url("01"),
            "http://1.tiles.example.com/tiles/a01.jpeg?g=1"
        );
    }

    #[test]
    fn test_tile_server_rejects_inverted_zooms() {
        let mut config = ConfigFile::default();
        config.tiles.min_zoom = 10;
        config.tiles.max_zoom = 5;
        assert!(matches!(
            config.tile_server(),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }
}
