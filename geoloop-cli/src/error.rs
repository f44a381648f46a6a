//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use geoloop::animation::SchedulerError;
use geoloop::cache::CacheError;
use geoloop::config::ConfigFileError;
use geoloop::coord::CoordError;
use geoloop::fetch::FetchError;
use geoloop::overlay::GroupError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line input
    InvalidArgument(String),
    /// Failed to build the HTTP client
    Fetcher(FetchError),
    /// Tile cache error
    Cache(CacheError),
    /// View state could not be resolved to a tile
    Resolve(CoordError),
    /// Overlay group error
    Group(GroupError),
    /// Animation error
    Animation(SchedulerError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the configuration file with: geoloop config show");
            }
            CliError::Cache(CacheError::Fetch(_)) | CliError::Fetcher(_) => {
                eprintln!();
                eprintln!("Common issues:");
                eprintln!("  1. The overlay URL is wrong or the server is down");
                eprintln!("  2. A proxy or firewall blocks outgoing HTTP");
                eprintln!("  3. The request timed out: raise [fetch] timeout in config.ini");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Fetcher(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Cache(e) => write!(f, "Tile cache error: {}", e),
            CliError::Resolve(e) => write!(f, "Cannot resolve view: {}", e),
            CliError::Group(e) => write!(f, "Overlay error: {}", e),
            CliError::Animation(e) => write!(f, "Animation error: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Fetcher(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::Resolve(e) => Some(e),
            CliError::Group(e) => Some(e),
            CliError::Animation(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Resolve(e)
    }
}

impl From<GroupError> for CliError {
    fn from(e: GroupError) -> Self {
        CliError::Group(e)
    }
}

impl From<SchedulerError> for CliError {
    fn from(e: SchedulerError) -> Self {
        CliError::Animation(e)
    }
}
