//! Default values for every configuration setting.

use super::file::config_directory;
use super::settings::*;
use crate::animation::{DEFAULT_BASE_INTERVAL, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};
use crate::cache::{CacheConfig, RepairPolicy, DEFAULT_CANONICAL_SIZE, DEFAULT_MEMORY_SIZE};
use crate::fetch::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::provider::{MapType, DEFAULT_HOST};
use std::path::PathBuf;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "geoloop.log";

/// Default coarsest zoom level.
pub const DEFAULT_MIN_ZOOM: u8 = 1;

/// Default finest zoom level.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// Default disk store location (`<platform cache dir>/geoloop`).
pub fn default_cache_directory() -> PathBuf {
    CacheConfig::default().cache_dir
}

/// Default log directory (`~/.geoloop/logs`).
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}

/// Clamps a configured speed to the dial range, warning when it changes.
pub(super) fn clamp_default_speed(value: u64) -> u8 {
    if value < MIN_SPEED as u64 {
        tracing::warn!(
            requested = value,
            min = MIN_SPEED,
            "default_speed below minimum, clamping to {}",
            MIN_SPEED
        );
        MIN_SPEED
    } else if value > MAX_SPEED as u64 {
        tracing::warn!(
            requested = value,
            max = MAX_SPEED,
            "default_speed above maximum, clamping to {}",
            MAX_SPEED
        );
        MAX_SPEED
    } else {
        value as u8
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: default_cache_directory(),
                memory_size: DEFAULT_MEMORY_SIZE,
                repair: RepairPolicy::default(),
                canonical_size: DEFAULT_CANONICAL_SIZE,
            },
            fetch: FetchSettings {
                timeout: DEFAULT_TIMEOUT_SECS,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            tiles: TileSettings {
                host: DEFAULT_HOST.to_string(),
                map_type: MapType::default(),
                min_zoom: DEFAULT_MIN_ZOOM,
                max_zoom: DEFAULT_MAX_ZOOM,
            },
            animation: AnimationSettings {
                base_interval_ms: DEFAULT_BASE_INTERVAL.as_millis() as u64,
                default_speed: DEFAULT_SPEED,
            },
            logging: LoggingSettings {
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_default_speed() {
        assert_eq!(clamp_default_speed(0), 1);
        assert_eq!(clamp_default_speed(75), 75);
        assert_eq!(clamp_default_speed(1000), 100);
    }

    #[test]
    fn test_default_log_directory_is_under_config_directory() {
        assert!(default_log_directory().starts_with(config_directory()));
    }
}
