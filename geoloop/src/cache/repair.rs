//! Image decoding and the dimension repair stage.
//!
//! Some overlay servers emit images whose container header disagrees with
//! the pixel data. After decoding, the decoded dimensions are compared with
//! the header's; on disagreement (or per [`RepairPolicy`]) the stored file
//! is resized in place to a canonical square and decoded again.

use crate::cache::disk::DiskStore;
use crate::cache::{CacheError, RepairPolicy};
use crate::overlay::{CacheKey, OverlayFormat};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use tracing::{debug, info};

/// Result of a repair attempt.
#[derive(Debug)]
pub enum RepairOutcome {
    /// The stored file was already canonical and left untouched
    Unchanged,
    /// The stored file was rewritten; carries the re-decoded image
    Resized(DynamicImage),
}

/// Decode image bytes, trusting the content over the declared format.
pub fn decode(bytes: &[u8], format: OverlayFormat) -> Result<DynamicImage, CacheError> {
    match image::load_from_memory(bytes) {
        Ok(image) => Ok(image),
        Err(_) => image::load_from_memory_with_format(bytes, format.to_image_format())
            .map_err(CacheError::from),
    }
}

/// Dimensions reported by the container header, without decoding pixels.
pub fn header_dimensions(bytes: &[u8]) -> Result<(u32, u32), CacheError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.into_dimensions().map_err(CacheError::from)
}

/// Whether a decoded image must go through repair.
pub fn needs_repair(
    policy: RepairPolicy,
    decoded: (u32, u32),
    header: (u32, u32),
    canonical: u32,
) -> bool {
    match policy {
        RepairPolicy::Never => false,
        RepairPolicy::OnMismatch => decoded != header,
        RepairPolicy::NonCanonical => decoded != header || decoded != (canonical, canonical),
    }
}

/// Resize the stored file for `key` to `canonical`×`canonical`.
///
/// Transparency is kept for formats that carry alpha. An image that is
/// already canonical is left byte-identical.
pub fn repair_stored(
    store: &DiskStore,
    key: &CacheKey,
    format: OverlayFormat,
    canonical: u32,
) -> Result<RepairOutcome, CacheError> {
    let bytes = store
        .read(key)?
        .ok_or_else(|| CacheError::Repair(format!("{} is not in the disk store", key)))?;

    let image = decode(&bytes, format).map_err(|e| CacheError::Repair(e.to_string()))?;
    let header = header_dimensions(&bytes).map_err(|e| CacheError::Repair(e.to_string()))?;

    if image.dimensions() == (canonical, canonical) && header == (canonical, canonical) {
        debug!(key = %key, "Overlay already canonical, repair skipped");
        return Ok(RepairOutcome::Unchanged);
    }

    let resized = image.resize_exact(canonical, canonical, FilterType::Triangle);
    let encoded = encode(&resized, format)?;
    store.write(key, &encoded)?;

    info!(
        key = %key,
        from_width = image.width(),
        from_height = image.height(),
        header_width = header.0,
        header_height = header.1,
        size = canonical,
        "Repaired overlay image dimensions"
    );

    let redecoded = decode(&encoded, format).map_err(|e| CacheError::Repair(e.to_string()))?;
    Ok(RepairOutcome::Resized(redecoded))
}

/// Encode an image in the entry's format.
fn encode(image: &DynamicImage, format: OverlayFormat) -> Result<Vec<u8>, CacheError> {
    let prepared = if format.supports_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };

    let mut out = Cursor::new(Vec::new());
    prepared
        .write_to(&mut out, format.to_image_format())
        .map_err(|e| CacheError::Repair(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn key() -> CacheKey {
        CacheKey::derive("Earth/Test/", "frame", OverlayFormat::Png)
    }

    #[test]
    fn test_header_dimensions_match_decode() {
        let bytes = png(30, 20);
        assert_eq!(header_dimensions(&bytes).unwrap(), (30, 20));
        assert_eq!(decode(&bytes, OverlayFormat::Png).unwrap().dimensions(), (30, 20));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not an image", OverlayFormat::Png),
            Err(CacheError::Decode(_))
        ));
    }

    #[test]
    fn test_needs_repair_policies() {
        assert!(!needs_repair(RepairPolicy::OnMismatch, (10, 10), (10, 10), 16));
        assert!(needs_repair(RepairPolicy::OnMismatch, (10, 10), (12, 10), 16));
        assert!(needs_repair(RepairPolicy::NonCanonical, (10, 10), (10, 10), 16));
        assert!(!needs_repair(RepairPolicy::NonCanonical, (16, 16), (16, 16), 16));
        assert!(!needs_repair(RepairPolicy::Never, (10, 10), (12, 10), 16));
    }

    #[test]
    fn test_repair_resizes_and_keeps_alpha() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();
        store.write(&key(), &png(30, 20)).unwrap();

        let outcome = repair_stored(&store, &key(), OverlayFormat::Png, 16).unwrap();
        let RepairOutcome::Resized(image) = outcome else {
            panic!("expected resize");
        };
        assert_eq!(image.dimensions(), (16, 16));
        assert!(image.color().has_alpha());

        let stored = store.read(&key()).unwrap().unwrap();
        assert_eq!(header_dimensions(&stored).unwrap(), (16, 16));
    }

    #[test]
    fn test_repair_of_canonical_image_is_noop() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();
        let bytes = png(16, 16);
        store.write(&key(), &bytes).unwrap();

        let outcome = repair_stored(&store, &key(), OverlayFormat::Png, 16).unwrap();
        assert!(matches!(outcome, RepairOutcome::Unchanged));
        assert_eq!(store.read(&key()).unwrap().unwrap(), bytes);
    }

    #[test]
    fn test_second_repair_leaves_file_byte_identical() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();
        store.write(&key(), &png(40, 10)).unwrap();

        repair_stored(&store, &key(), OverlayFormat::Png, 16).unwrap();
        let first = store.read(&key()).unwrap().unwrap();

        let outcome = repair_stored(&store, &key(), OverlayFormat::Png, 16).unwrap();
        assert!(matches!(outcome, RepairOutcome::Unchanged));
        assert_eq!(store.read(&key()).unwrap().unwrap(), first);
    }

    #[test]
    fn test_repair_jpeg_drops_alpha() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();
        let key = CacheKey::derive("Earth/Test/", "tile", OverlayFormat::Jpeg);
        store.write(&key, &png(8, 4)).unwrap();

        let RepairOutcome::Resized(image) =
            repair_stored(&store, &key, OverlayFormat::Jpeg, 16).unwrap()
        else {
            panic!("expected resize");
        };
        assert_eq!(image.dimensions(), (16, 16));
        assert!(!image.color().has_alpha());
    }

    #[test]
    fn test_repair_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::new(temp.path()).unwrap();
        assert!(matches!(
            repair_stored(&store, &key(), OverlayFormat::Png, 16),
            Err(CacheError::Repair(_))
        ));
    }
}
