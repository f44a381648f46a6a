//! Overlay cache entries.

use super::key::CacheKey;
use crate::coord::Sector;
use image::DynamicImage;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A decoded overlay image, shared between the cache and its entry.
pub type OverlayImage = Arc<DynamicImage>;

/// Where an entry's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Remote resource fetched over HTTP
    Remote(String),
    /// File on the local filesystem
    Local(PathBuf),
}

impl SourceRef {
    /// File extension of the source, if any.
    pub fn extension(&self) -> Option<String> {
        match self {
            SourceRef::Remote(url) => {
                let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
                let file = path.rsplit('/').next().unwrap_or(path);
                file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
            }
            SourceRef::Local(path) => path
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Remote(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            SourceRef::Local(path) => Some(path),
            SourceRef::Remote(_) => None,
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Remote(url) => f.write_str(url),
            SourceRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Normalized image format of an overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverlayFormat {
    #[default]
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
}

impl OverlayFormat {
    /// Filename suffix used in cache keys.
    pub fn suffix(&self) -> &'static str {
        match self {
            OverlayFormat::Png => "png",
            OverlayFormat::Jpeg => "jpeg",
            OverlayFormat::Gif => "gif",
            OverlayFormat::Bmp => "bmp",
            OverlayFormat::Tiff => "tiff",
            OverlayFormat::Webp => "webp",
        }
    }

    /// Parse a file suffix, accepting common aliases.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Some(OverlayFormat::Png),
            "jpg" | "jpeg" | "jpe" => Some(OverlayFormat::Jpeg),
            "gif" => Some(OverlayFormat::Gif),
            "bmp" => Some(OverlayFormat::Bmp),
            "tif" | "tiff" => Some(OverlayFormat::Tiff),
            "webp" => Some(OverlayFormat::Webp),
            _ => None,
        }
    }

    /// Parse an `image/*` MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        let (kind, subtype) = essence.split_once('/')?;
        if !kind.eq_ignore_ascii_case("image") {
            return None;
        }
        Self::from_suffix(subtype)
    }

    /// Infer the format from a source reference, defaulting to PNG.
    pub fn from_source(source: &SourceRef) -> Self {
        source
            .extension()
            .and_then(|ext| Self::from_suffix(&ext))
            .unwrap_or_default()
    }

    /// Whether the format can store an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, OverlayFormat::Jpeg | OverlayFormat::Bmp)
    }

    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            OverlayFormat::Png => image::ImageFormat::Png,
            OverlayFormat::Jpeg => image::ImageFormat::Jpeg,
            OverlayFormat::Gif => image::ImageFormat::Gif,
            OverlayFormat::Bmp => image::ImageFormat::Bmp,
            OverlayFormat::Tiff => image::ImageFormat::Tiff,
            OverlayFormat::Webp => image::ImageFormat::WebP,
        }
    }
}

impl fmt::Display for OverlayFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// One cacheable ground overlay.
///
/// Entries are shared as `Arc<OverlayEntry>` between their group, the
/// animation scheduler and any fetch thread. The key, sector and format never
/// change; the source is rewritten to the cached file after a fetch and the
/// image slot is filled when the entry is realized.
pub struct OverlayEntry {
    name: String,
    description: String,
    cache_key: CacheKey,
    sector: Sector,
    format: OverlayFormat,
    origin: SourceRef,
    source: RwLock<SourceRef>,
    image: Mutex<Option<OverlayImage>>,
    enabled: AtomicBool,
}

impl OverlayEntry {
    /// Create an entry whose key is derived from `base` and `name`.
    pub fn new(
        base: &str,
        name: impl Into<String>,
        sector: Sector,
        source: SourceRef,
        format: OverlayFormat,
    ) -> Self {
        let name = name.into();
        let cache_key = CacheKey::derive(base, &name, format);

        Self {
            name,
            description: String::new(),
            cache_key,
            sector,
            format,
            origin: source.clone(),
            source: RwLock::new(source),
            image: Mutex::new(None),
            enabled: AtomicBool::new(false),
        }
    }

    /// Create an entry, inferring the format from the source extension.
    pub fn from_source(
        base: &str,
        name: impl Into<String>,
        sector: Sector,
        source: SourceRef,
    ) -> Self {
        let format = OverlayFormat::from_source(&source);
        Self::new(base, name, sector, source, format)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn sector(&self) -> Sector {
        self.sector
    }

    pub fn format(&self) -> OverlayFormat {
        self.format
    }

    /// Current source reference.
    pub fn source(&self) -> SourceRef {
        self.source.read().clone()
    }

    /// Source the entry was created with, before any rewrite.
    pub fn origin(&self) -> &SourceRef {
        &self.origin
    }

    pub(crate) fn set_source(&self, source: SourceRef) {
        *self.source.write() = source;
    }

    pub(crate) fn reset_source(&self) {
        *self.source.write() = self.origin.clone();
    }

    /// Decoded image, blocking briefly if another thread is updating it.
    pub fn image(&self) -> Option<OverlayImage> {
        self.image.lock().clone()
    }

    /// Decoded image without blocking; `None` under contention.
    pub fn try_image(&self) -> Option<OverlayImage> {
        self.image.try_lock().and_then(|slot| slot.clone())
    }

    pub(crate) fn set_image(&self, image: OverlayImage) {
        *self.image.lock() = Some(image);
    }

    pub(crate) fn clear_image(&self) {
        *self.image.lock() = None;
    }

    pub fn is_realized(&self) -> bool {
        self.image.lock().is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

impl fmt::Debug for OverlayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayEntry")
            .field("name", &self.name)
            .field("cache_key", &self.cache_key)
            .field("sector", &self.sector)
            .field("format", &self.format)
            .field("source", &*self.source.read())
            .field("realized", &self.image.lock().is_some())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector() -> Sector {
        Sector::new(30.0, 40.0, -100.0, -90.0)
    }

    #[test]
    fn test_format_from_suffix_aliases() {
        assert_eq!(OverlayFormat::from_suffix("JPG"), Some(OverlayFormat::Jpeg));
        assert_eq!(OverlayFormat::from_suffix(".tif"), Some(OverlayFormat::Tiff));
        assert_eq!(OverlayFormat::from_suffix("kml"), None);
    }

    #[test]
    fn test_format_from_mime() {
        assert_eq!(OverlayFormat::from_mime("image/png"), Some(OverlayFormat::Png));
        assert_eq!(
            OverlayFormat::from_mime("image/jpeg; charset=binary"),
            Some(OverlayFormat::Jpeg)
        );
        assert_eq!(OverlayFormat::from_mime("text/html"), None);
    }

    #[test]
    fn test_remote_extension_ignores_query() {
        let source = SourceRef::Remote("http://host/tiles/h0123.jpeg?g=1".to_string());
        assert_eq!(source.extension().as_deref(), Some("jpeg"));
        assert_eq!(OverlayFormat::from_source(&source), OverlayFormat::Jpeg);
    }

    #[test]
    fn test_unknown_extension_defaults_to_png() {
        let source = SourceRef::Remote("http://host/wms?layer=radar".to_string());
        assert_eq!(OverlayFormat::from_source(&source), OverlayFormat::Png);
    }

    #[test]
    fn test_new_entry_is_disabled_and_unrealized() {
        let entry = OverlayEntry::from_source(
            "Earth/Test/",
            "frame",
            sector(),
            SourceRef::Remote("http://host/frame.gif".to_string()),
        );
        assert!(!entry.is_enabled());
        assert!(!entry.is_realized());
        assert_eq!(entry.cache_key().as_str(), "Earth/Test/frame.gif");
    }

    #[test]
    fn test_set_image_and_try_image() {
        let entry = OverlayEntry::new(
            "Earth/Test/",
            "frame",
            sector(),
            SourceRef::Local(PathBuf::from("/tmp/frame.png")),
            OverlayFormat::Png,
        );
        let image = Arc::new(DynamicImage::new_rgba8(2, 2));
        entry.set_image(Arc::clone(&image));

        let seen = entry.try_image().unwrap();
        assert!(Arc::ptr_eq(&seen, &image));

        entry.clear_image();
        assert!(entry.try_image().is_none());
    }

    #[test]
    fn test_set_source_rewrites_in_place() {
        let entry = OverlayEntry::new(
            "Earth/Test/",
            "frame",
            sector(),
            SourceRef::Remote("http://host/frame.png".to_string()),
            OverlayFormat::Png,
        );
        entry.set_source(SourceRef::Local(PathBuf::from("/cache/frame.png")));
        assert_eq!(
            entry.source().local_path(),
            Some(Path::new("/cache/frame.png"))
        );
        assert!(entry.origin().is_remote());

        entry.reset_source();
        assert!(entry.source().is_remote());
    }
}
