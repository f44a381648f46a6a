//! CLI runner for common setup and operations.
//!
//! Encapsulates configuration loading, logging initialization and cache
//! creation to reduce duplication across command handlers.

use crate::error::CliError;
use geoloop::cache::TileCache;
use geoloop::config::ConfigFile;
use geoloop::logging::{init_logging, LoggingGuard};
use geoloop::provider::TileServer;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load configuration and initialize logging.
    ///
    /// `config_path` overrides the default `~/.geoloop/config.ini`.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("geoloop v{}", geoloop::VERSION);
        info!(
            command,
            log_file = %self.logging_guard.path().display(),
            "geoloop CLI started"
        );
    }

    /// Open the tile cache described by the configuration.
    pub fn open_cache(&self) -> Result<Arc<TileCache>, CliError> {
        let fetcher = self.config.fetcher().map_err(CliError::Fetcher)?;
        let cache = TileCache::new(self.config.cache_config(), Arc::new(fetcher))?;
        info!(cache_dir = %cache.cache_dir().display(), "Tile cache opened");
        Ok(Arc::new(cache))
    }

    /// Tile server described by the configuration.
    pub fn tile_server(&self) -> Result<TileServer, CliError> {
        Ok(self.config.tile_server()?)
    }

    /// Write output to a file.
    pub fn write_file(&self, path: &Path, contents: &str) -> Result<(), CliError> {
        std::fs::write(path, contents).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        })?;
        info!(path = %path.display(), bytes = contents.len(), "Output written");
        Ok(())
    }
}
