//! In-memory layer with LRU eviction.

use crate::cache::CacheStats;
use crate::overlay::{CacheKey, OverlayImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tracing::debug;

/// Entry in the memory layer.
struct MemoryEntry {
    image: OverlayImage,
    size: usize,
    /// Logical clock value of the last access
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, MemoryEntry>,
    size_bytes: usize,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Decoded images keyed by cache key.
///
/// Holds at most one image per key and evicts least recently used images
/// once the byte budget is exceeded. Evicted images stay alive as long as
/// an entry still references them.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
    stats: Arc<StdMutex<CacheStats>>,
}

/// Bytes of pixel data held by a decoded image.
pub fn image_size(image: &OverlayImage) -> usize {
    image.as_bytes().len()
}

impl MemoryCache {
    /// Create a memory layer with its own statistics.
    pub fn new(max_size_bytes: usize) -> Self {
        Self::with_stats(max_size_bytes, Arc::new(StdMutex::new(CacheStats::new())))
    }

    /// Create a memory layer that records into shared statistics.
    pub fn with_stats(max_size_bytes: usize, stats: Arc<StdMutex<CacheStats>>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size_bytes,
            stats,
        }
    }

    /// Look up an image, updating recency and hit/miss counters.
    pub fn get(&self, key: &CacheKey) -> Option<OverlayImage> {
        let mut inner = self.inner.lock();
        let now = inner.tick();

        let found = inner.entries.get_mut(key).map(|entry| {
            entry.last_used = now;
            Arc::clone(&entry.image)
        });

        if let Ok(mut stats) = self.stats.lock() {
            if found.is_some() {
                stats.record_memory_hit();
            } else {
                stats.record_memory_miss();
            }
        }

        found
    }

    /// Look up an image without blocking.
    ///
    /// Returns `None` when the layer is locked by another thread. Recency
    /// and statistics are left untouched.
    pub fn try_get(&self, key: &CacheKey) -> Option<OverlayImage> {
        let inner = self.inner.try_lock()?;
        inner.entries.get(key).map(|entry| Arc::clone(&entry.image))
    }

    /// Insert an image, replacing any previous image for the key.
    pub fn put(&self, key: CacheKey, image: OverlayImage) {
        let size = image_size(&image);
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.entries.remove(&key) {
            inner.size_bytes = inner.size_bytes.saturating_sub(previous.size);
        }

        let evicted = self.evict_until_fits(&mut inner, size);

        let now = inner.tick();
        inner.entries.insert(
            key,
            MemoryEntry {
                image,
                size,
                last_used: now,
            },
        );
        inner.size_bytes += size;

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_memory_eviction(evicted);
            stats.update_memory_size(inner.size_bytes, inner.entries.len());
        }
    }

    /// Remove an image. Returns whether it was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(key);
        if let Some(entry) = &removed {
            inner.size_bytes = inner.size_bytes.saturating_sub(entry.size);
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.update_memory_size(inner.size_bytes, inner.entries.len());
        }
        removed.is_some()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().size_bytes
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Drop every image.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.size_bytes = 0;

        if let Ok(mut stats) = self.stats.lock() {
            stats.update_memory_size(0, 0);
        }
    }

    /// Evict least recently used images until `required` more bytes fit.
    fn evict_until_fits(&self, inner: &mut Inner, required: usize) -> u64 {
        if inner.size_bytes + required <= self.max_size_bytes {
            return 0;
        }

        let target = self.max_size_bytes.saturating_sub(required);

        let mut by_age: Vec<(u64, CacheKey)> = inner
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);

        let mut evicted = 0;
        for (_, key) in by_age {
            if inner.size_bytes <= target {
                break;
            }
            if let Some(entry) = inner.entries.remove(&key) {
                inner.size_bytes = inner.size_bytes.saturating_sub(entry.size);
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                evicted,
                size_bytes = inner.size_bytes,
                max_size_bytes = self.max_size_bytes,
                "Memory cache eviction"
            );
        }

        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayFormat;
    use image::DynamicImage;

    fn key(name: &str) -> CacheKey {
        CacheKey::derive("Earth/Test/", name, OverlayFormat::Png)
    }

    /// RGBA image of `side`×`side` pixels, 4 bytes per pixel.
    fn image(side: u32) -> OverlayImage {
        Arc::new(DynamicImage::new_rgba8(side, side))
    }

    #[test]
    fn test_put_and_get_returns_same_handle() {
        let cache = MemoryCache::new(1_000_000);
        let img = image(4);
        cache.put(key("a"), Arc::clone(&img));

        let found = cache.get(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&found, &img));
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.size_bytes(), 64);
    }

    #[test]
    fn test_miss_is_counted() {
        let stats = Arc::new(StdMutex::new(CacheStats::new()));
        let cache = MemoryCache::with_stats(1_000, Arc::clone(&stats));

        assert!(cache.get(&key("missing")).is_none());
        assert_eq!(stats.lock().unwrap().memory_misses, 1);
    }

    #[test]
    fn test_replacing_key_keeps_one_image() {
        let cache = MemoryCache::new(1_000_000);
        cache.put(key("a"), image(4));
        cache.put(key("a"), image(2));

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.size_bytes(), 16);
    }

    #[test]
    fn test_lru_eviction() {
        // Each 8x8 RGBA image is 256 bytes; the budget fits two
        let cache = MemoryCache::new(600);
        cache.put(key("a"), image(8));
        cache.put(key("b"), image(8));

        // Touch "a" so "b" becomes least recently used
        cache.get(&key("a"));
        cache.put(key("c"), image(8));

        assert!(cache.contains(&key("a")));
        assert!(!cache.contains(&key("b")));
        assert!(cache.contains(&key("c")));
        assert!(cache.size_bytes() <= 600);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MemoryCache::new(1_000_000);
        cache.put(key("a"), image(4));
        cache.put(key("b"), image(4));

        assert!(cache.remove(&key("a")));
        assert!(!cache.remove(&key("a")));
        assert_eq!(cache.size_bytes(), 64);

        cache.clear();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_try_get_does_not_block_under_contention() {
        let cache = MemoryCache::new(1_000_000);
        cache.put(key("a"), image(4));

        let _held = cache.inner.lock();
        assert!(cache.try_get(&key("a")).is_none());
    }
}
