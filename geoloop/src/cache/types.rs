//! Core types for the tile cache.

use crate::fetch::{ContentKind, FetchError};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Default memory budget for decoded images (256 MB).
pub const DEFAULT_MEMORY_SIZE: usize = 256 * 1024 * 1024;

/// Default edge length images are repaired to.
pub const DEFAULT_CANONICAL_SIZE: u32 = 1024;

/// Tile cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Network fetch failed, no bytes obtained
    #[error("Network error: {0}")]
    Fetch(#[from] FetchError),

    /// Server answered with a KML/KMZ document instead of image bytes
    #[error("Expected image data, received {0:?} content")]
    UnexpectedContent(ContentKind),

    /// Bytes were obtained but are not a valid image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Decoded dimensions disagreed with the header and resizing failed
    #[error("Image repair failed: {0}")]
    Repair(String),

    /// I/O error in the disk store
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A coalesced fetch running on another thread failed
    #[error("Fetch of {key} failed: {reason}")]
    FetchFailed { key: String, reason: String },

    /// The cache was disposed
    #[error("Tile cache has been disposed")]
    Disposed,
}

impl From<image::ImageError> for CacheError {
    fn from(err: image::ImageError) -> Self {
        CacheError::Decode(err.to_string())
    }
}

/// When the dimension repair step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairPolicy {
    /// Repair only when decoded dimensions disagree with the header
    #[default]
    OnMismatch,
    /// Also repair images that are not already canonical squares
    NonCanonical,
    /// Never touch stored files
    Never,
}

impl RepairPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairPolicy::OnMismatch => "mismatch",
            RepairPolicy::NonCanonical => "non-canonical",
            RepairPolicy::Never => "never",
        }
    }
}

impl fmt::Display for RepairPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepairPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mismatch" | "on-mismatch" => Ok(RepairPolicy::OnMismatch),
            "non-canonical" | "always" => Ok(RepairPolicy::NonCanonical),
            "never" | "off" => Ok(RepairPolicy::Never),
            other => Err(format!(
                "unknown repair policy '{}' (expected mismatch, non-canonical or never)",
                other
            )),
        }
    }
}

/// Tile cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root of the disk store
    pub cache_dir: PathBuf,
    /// Memory budget for decoded images in bytes
    pub memory_size_bytes: usize,
    pub repair: RepairPolicy,
    /// Edge length of repaired images in pixels
    pub canonical_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("geoloop");

        Self {
            cache_dir,
            memory_size_bytes: DEFAULT_MEMORY_SIZE,
            repair: RepairPolicy::default(),
            canonical_size: DEFAULT_CANONICAL_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size_bytes = bytes;
        self
    }

    pub fn with_repair(mut self, policy: RepairPolicy) -> Self {
        self.repair = policy;
        self
    }

    pub fn with_canonical_size(mut self, size: u32) -> Self {
        self.canonical_size = size;
        self
    }
}
