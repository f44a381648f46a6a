//! User configuration for geoloop.
//!
//! Settings live in an INI file at `~/.geoloop/config.ini`. Every key is
//! optional; missing keys fall back to the defaults in [`defaults`], and a
//! missing file yields [`ConfigFile::default`].
//!
//! # Example
//!
//! ```
//! use geoloop::config::{parse_size, ConfigFile};
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.cache.memory_size, parse_size("256MB").unwrap());
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AnimationSettings, CacheSettings, ConfigFile, FetchSettings, LoggingSettings, TileSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
