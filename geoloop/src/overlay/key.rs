//! Cache key derivation and filename sanitizing.

use super::entry::OverlayFormat;
use std::fmt;
use std::path::{Path, PathBuf};

/// Root segment shared by every key in the store.
pub const KEY_ROOT: &str = "Earth";

/// Stable, filesystem-safe identifier of a cached overlay.
///
/// Keys have the shape `<base><layer>.<suffix>` where `base` is a layer
/// group prefix such as `Earth/NEXRAD/`. The same key addresses the decoded
/// image in memory and the file in the disk store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a layer.
    ///
    /// Derivation is pure: the same inputs always produce the same key.
    ///
    /// ```
    /// use geoloop::overlay::{CacheKey, OverlayFormat};
    ///
    /// let base = CacheKey::group_prefix("NEXRAD");
    /// let key = CacheKey::derive(&base, "Radar: 12/05 (UTC)", OverlayFormat::Png);
    /// assert_eq!(key.as_str(), "Earth/NEXRAD/Radar_ 12_05 (UTC).png");
    /// ```
    pub fn derive(base: &str, layer_name: &str, format: OverlayFormat) -> Self {
        Self(format!(
            "{}{}.{}",
            base,
            sanitize_name(layer_name),
            format.suffix()
        ))
    }

    /// Base prefix for every key belonging to a layer group.
    pub fn group_prefix(group: &str) -> String {
        format!("{}/{}/", KEY_ROOT, sanitize_name(group))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the keyed file below a store root.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        self.0
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Characters that may not appear in a path segment on common filesystems.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Make a name usable as a single path segment.
///
/// Illegal characters and control characters become `_`, trailing dots and
/// spaces are trimmed. Spaces and parentheses elsewhere are kept. A name
/// that sanitizes to nothing becomes `_`.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || ILLEGAL_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_end_matches(&['.', ' '][..]);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}
