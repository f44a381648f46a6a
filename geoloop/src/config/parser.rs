//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::clamp_default_speed;
use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::coord::{MAX_ZOOM, MIN_ZOOM};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size =
                parse_size(v).map_err(|_| invalid("cache", "memory_size", v, SIZE_FORMAT))?;
        }
        if let Some(v) = section.get("repair") {
            config.cache.repair = v
                .parse()
                .map_err(|reason: String| invalid("cache", "repair", v, &reason))?;
        }
        if let Some(v) = section.get("canonical_size") {
            let size: u32 = parse_number("cache", "canonical_size", v, "pixels")?;
            if size == 0 {
                return Err(invalid("cache", "canonical_size", v, "must be at least 1"));
            }
            config.cache.canonical_size = size;
        }
    }

    // [fetch] section
    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = section.get("timeout") {
            config.fetch.timeout = parse_number("fetch", "timeout", v, "seconds")?;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.fetch.user_agent = v.to_string();
            }
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = section.get("host") {
            let v = v.trim();
            if !v.is_empty() {
                config.tiles.host = v.to_string();
            }
        }
        if let Some(v) = section.get("map_type") {
            config.tiles.map_type = v
                .parse()
                .map_err(|reason: String| invalid("tiles", "map_type", v, &reason))?;
        }
        if let Some(v) = section.get("min_zoom") {
            config.tiles.min_zoom = parse_zoom("min_zoom", v)?;
        }
        if let Some(v) = section.get("max_zoom") {
            config.tiles.max_zoom = parse_zoom("max_zoom", v)?;
        }
        if config.tiles.min_zoom > config.tiles.max_zoom {
            return Err(invalid(
                "tiles",
                "min_zoom",
                &config.tiles.min_zoom.to_string(),
                "must not exceed max_zoom",
            ));
        }
    }

    // [animation] section
    if let Some(section) = ini.section(Some("animation")) {
        if let Some(v) = section.get("base_interval_ms") {
            let ms: u64 = parse_number("animation", "base_interval_ms", v, "milliseconds")?;
            if ms == 0 {
                return Err(invalid(
                    "animation",
                    "base_interval_ms",
                    v,
                    "must be at least 1",
                ));
            }
            config.animation.base_interval_ms = ms;
        }
        if let Some(v) = section.get("default_speed") {
            let speed: u64 = parse_number("animation", "default_speed", v, "1-100")?;
            config.animation.default_speed = clamp_default_speed(speed);
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

const SIZE_FORMAT: &str = "expected format like '256MB', '1GB', or '1024KB'";

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a non-negative integer, naming its unit in the error.
fn parse_number<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    unit: &str,
) -> Result<T, ConfigFileError> {
    value.trim().parse().map_err(|_| {
        invalid(
            section,
            key,
            value,
            &format!("must be a positive integer ({})", unit),
        )
    })
}

fn parse_zoom(key: &str, value: &str) -> Result<u8, ConfigFileError> {
    let zoom: u8 = parse_number("tiles", key, value, "zoom level")?;
    if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
        return Err(invalid(
            "tiles",
            key,
            value,
            &format!("must be between {} and {}", MIN_ZOOM, MAX_ZOOM),
        ));
    }
    Ok(zoom)
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
