//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Root directory of the overlay disk store. Files are stored as
; <directory>/Earth/<layer group>/<layer>.<format>
; If empty, defaults to the platform cache directory (e.g. ~/.cache/geoloop)
directory = {}
; Memory budget for decoded overlay images (default: 256MB)
; Supports: KB, MB, GB suffixes (e.g., 64MB, 512MB, 1GB)
memory_size = {}
; When stored images are resized to a square of canonical_size pixels:
;   mismatch      - only when decoded size disagrees with the file header (default)
;   non-canonical - also when the image is not already canonical
;   never         - never rewrite stored files
repair = {}
; Edge length in pixels of repaired images (default: 1024)
canonical_size = {}

[fetch]
; Timeout in seconds for HTTP requests (default: 30)
timeout = {}
; User-Agent header sent with every request
user_agent = {}

[tiles]
; Tile server host; a shard digit is prepended as a subdomain
host = {}
; Imagery style: hybrid, aerial or road (default: hybrid)
map_type = {}
; Zoom levels offered by the server (default: 1 to 19)
min_zoom = {}
max_zoom = {}

[animation]
; Frame period at speed 1 in milliseconds (default: 10000)
; The period at speed s is base_interval_ms / s
base_interval_ms = {}
; Speed dial position for new loops, 1 (slowest) to 100 (fastest) (default: 50)
default_speed = {}

[logging]
; Directory for log files (default: ~/.geoloop/logs)
directory = {}
; Log file name, cleared at the start of each session (default: geoloop.log)
file = {}
"#,
        path_to_string(&config.cache.directory),
        format_size(config.cache.memory_size),
        config.cache.repair,
        config.cache.canonical_size,
        config.fetch.timeout,
        config.fetch.user_agent,
        config.tiles.host,
        config.tiles.map_type,
        config.tiles.min_zoom,
        config.tiles.max_zoom,
        config.animation.base_interval_ms,
        config.animation.default_speed,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
