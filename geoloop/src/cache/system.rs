//! Two-level overlay tile cache.

use crate::cache::coalesce::{FetchCoalescer, Registration};
use crate::cache::disk::DiskStore;
use crate::cache::memory::MemoryCache;
use crate::cache::repair::{self, RepairOutcome};
use crate::cache::types::{CacheConfig, CacheError};
use crate::cache::{CacheStatistics, CacheStats};
use crate::events::{Listeners, OverlayListener};
use crate::fetch::{ContentKind, HttpFetcher};
use crate::overlay::{CacheKey, OverlayEntry, OverlayImage, SourceRef};
use dashmap::DashMap;
use image::GenericImageView;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Outcome of [`TileCache::asynchronous_fetch`].
#[derive(Debug)]
pub enum AsyncFetch {
    /// A worker thread was started for the fetch
    Started(JoinHandle<Result<(), CacheError>>),
    /// A fetch for the same key is already in flight
    Coalesced,
    /// The bytes are already in the disk store
    Cached,
}

/// Overlay cache shared by every overlay group.
///
/// Lookups go memory, then disk, then network. A successful fetch lands in
/// the disk store and, once decoded, in memory before the call returns.
/// Concurrent fetches of one key share a single network request.
///
/// ```ignore
/// let cache = Arc::new(TileCache::new(CacheConfig::default(), Arc::new(ReqwestFetcher::new()?))?);
/// let entry = Arc::new(OverlayEntry::from_source(&base, "frame 1", sector, source));
/// if let Some(image) = cache.get(&entry) {
///     println!("{}x{}", image.width(), image.height());
/// }
/// ```
pub struct TileCache {
    config: CacheConfig,
    fetcher: Arc<dyn HttpFetcher>,
    memory: MemoryCache,
    disk: DiskStore,
    coalescer: Arc<FetchCoalescer>,
    /// Keys that already went through repair
    repaired: Mutex<HashSet<CacheKey>>,
    /// Per-key locks serializing decode and repair of stored files
    loading: DashMap<CacheKey, Arc<Mutex<()>>>,
    listeners: Listeners,
    stats: Arc<StdMutex<CacheStats>>,
    disposed: AtomicBool,
}

impl TileCache {
    /// Create a cache rooted at `config.cache_dir`.
    pub fn new(config: CacheConfig, fetcher: Arc<dyn HttpFetcher>) -> Result<Self, CacheError> {
        let stats = Arc::new(StdMutex::new(CacheStats::new()));
        let memory = MemoryCache::with_stats(config.memory_size_bytes, Arc::clone(&stats));
        let disk = DiskStore::new(&config.cache_dir)?;

        info!(
            cache_dir = %config.cache_dir.display(),
            memory_size = config.memory_size_bytes,
            repair = %config.repair,
            "Tile cache initialized"
        );

        Ok(Self {
            config,
            fetcher,
            memory,
            disk,
            coalescer: Arc::new(FetchCoalescer::new()),
            repaired: Mutex::new(HashSet::new()),
            loading: DashMap::new(),
            listeners: Listeners::new(),
            stats,
            disposed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        self.disk.root()
    }

    /// File location of an entry in the disk store.
    pub fn path_for(&self, entry: &OverlayEntry) -> PathBuf {
        self.disk.path(entry.cache_key())
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    pub fn subscribe(&self, listener: Arc<dyn OverlayListener>) {
        self.listeners.subscribe(listener);
    }

    /// Decoded image for an entry, or `None` if it could not be realized.
    ///
    /// Failures are reported to listeners; callers draw a placeholder
    /// until a later call succeeds.
    pub fn get(&self, entry: &OverlayEntry) -> Option<OverlayImage> {
        match self.try_get(entry) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(key = %entry.cache_key(), error = %e, "Failed to realize overlay");
                self.listeners.notify_error(&entry.origin().to_string(), &e);
                None
            }
        }
    }

    /// Decoded image for an entry, returning the error instead of
    /// notifying listeners.
    pub fn try_get(&self, entry: &OverlayEntry) -> Result<OverlayImage, CacheError> {
        self.ensure_live()?;
        let key = entry.cache_key();

        if let Some(image) = self.memory.get(key) {
            entry.set_image(Arc::clone(&image));
            return Ok(image);
        }

        // Evicted from memory but still held by the entry
        if let Some(image) = entry.image() {
            self.memory.put(key.clone(), Arc::clone(&image));
            return Ok(image);
        }

        if let Some(image) = self.load_realized(entry, true)? {
            return Ok(image);
        }
        self.record(|s| s.record_disk_miss());

        self.ensure_stored(entry)?;

        match self.load_realized(entry, false)? {
            Some(image) => Ok(image),
            None => Err(CacheError::FetchFailed {
                key: key.to_string(),
                reason: "file missing from disk store after fetch".to_string(),
            }),
        }
    }

    /// Fetch an entry into the disk store without decoding it.
    ///
    /// Blocks until the bytes are stored, waiting on another thread's
    /// fetch of the same key if one is in flight.
    pub fn synchronous_fetch(&self, entry: &OverlayEntry) -> Result<(), CacheError> {
        self.ensure_live()?;
        let result = self.ensure_stored(entry);
        if let Err(e) = &result {
            self.listeners.notify_error(&entry.origin().to_string(), e);
        }
        result
    }

    /// Fetch an entry into the disk store on a worker thread.
    ///
    /// Returns immediately. A key that is already being fetched does not
    /// start a second request.
    pub fn asynchronous_fetch(
        self: &Arc<Self>,
        entry: Arc<OverlayEntry>,
    ) -> Result<AsyncFetch, CacheError> {
        self.ensure_live()?;
        let key = entry.cache_key().clone();

        if self.disk.contains(&key) {
            entry.set_source(SourceRef::Local(self.disk.path(&key)));
            return Ok(AsyncFetch::Cached);
        }

        let ticket = match self.coalescer.register(&key) {
            Registration::Leader(ticket) => ticket,
            Registration::Follower(_) => {
                self.record(|s| s.record_coalesced());
                return Ok(AsyncFetch::Coalesced);
            }
        };

        let cache = Arc::clone(self);
        let thread_key = key.clone();
        let handle = thread::Builder::new()
            .name("overlay-fetch".to_string())
            .spawn(move || {
                let result = cache.store_source(&entry);
                ticket.complete(result.as_ref().map(|_| ()).map_err(|e| e.to_string()));

                match &result {
                    Ok(()) => entry.set_source(SourceRef::Local(cache.disk.path(&thread_key))),
                    Err(e) => cache.listeners.notify_error(&entry.origin().to_string(), e),
                }
                result
            })?;

        debug!(key = %key, "Started asynchronous fetch");
        Ok(AsyncFetch::Started(handle))
    }

    /// Memory-only lookup that never blocks.
    ///
    /// Intended for the render thread: returns `None` if the entry is not
    /// realized or a lock is contended.
    pub fn peek(&self, entry: &OverlayEntry) -> Option<OverlayImage> {
        if self.disposed.load(Ordering::Acquire) {
            return None;
        }
        entry
            .try_image()
            .or_else(|| self.memory.try_get(entry.cache_key()))
    }

    /// Delete an entry's cached file and drop its decoded image.
    ///
    /// Returns whether a file was removed. The entry's source reverts to
    /// the reference it was created with.
    pub fn purge(&self, entry: &OverlayEntry) -> Result<bool, CacheError> {
        let key = entry.cache_key();
        self.memory.remove(key);
        self.repaired.lock().remove(key);
        entry.clear_image();
        entry.reset_source();

        let removed = self.disk.remove(key)?;
        if removed {
            info!(key = %key, "Purged cached overlay");
        }
        Ok(removed)
    }

    /// Drop every decoded image from memory. Disk files are kept.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|_| CacheStats::new())
    }

    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics::from_stats(&self.stats())
    }

    /// Release the memory layer and listeners.
    ///
    /// Every later lookup fails with [`CacheError::Disposed`]. In-flight
    /// fetch threads run to completion.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.memory.clear();
        self.listeners.clear();
        info!(cache_dir = %self.disk.root().display(), "Tile cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_live(&self) -> Result<(), CacheError> {
        if self.is_disposed() {
            Err(CacheError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Decode the stored file and publish it to memory and the entry.
    ///
    /// Holds the key's load lock throughout, so a reader arriving while
    /// another thread repairs the file waits and then shares its image.
    fn load_realized(
        &self,
        entry: &OverlayEntry,
        count_hit: bool,
    ) -> Result<Option<OverlayImage>, CacheError> {
        let key = entry.cache_key();
        let lock = Arc::clone(
            self.loading
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let result = {
            let _guard = lock.lock();
            // Another reader may have realized the key while this one waited
            let cached = if self.memory.contains(key) {
                self.memory.get(key)
            } else {
                None
            };
            if let Some(image) = cached {
                entry.set_image(Arc::clone(&image));
                entry.set_source(SourceRef::Local(self.disk.path(key)));
                Ok(Some(image))
            } else {
                self.load_from_disk(entry).map(|loaded| {
                    loaded.map(|image| {
                        if count_hit {
                            self.record(|s| s.record_disk_hit());
                        }
                        self.realize(entry, image)
                    })
                })
            }
        };

        drop(lock);
        self.loading.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    fn realize(&self, entry: &OverlayEntry, image: OverlayImage) -> OverlayImage {
        self.memory.put(entry.cache_key().clone(), Arc::clone(&image));
        entry.set_image(Arc::clone(&image));
        entry.set_source(SourceRef::Local(self.disk.path(entry.cache_key())));
        image
    }

    /// Make sure the entry's bytes are in the disk store, coalescing with
    /// any in-flight fetch of the same key.
    fn ensure_stored(&self, entry: &OverlayEntry) -> Result<(), CacheError> {
        let key = entry.cache_key();

        if !self.disk.contains(key) {
            match self.coalescer.register(key) {
                Registration::Leader(ticket) => {
                    let result = self.store_source(entry);
                    ticket.complete(result.as_ref().map(|_| ()).map_err(|e| e.to_string()));
                    result?;
                }
                Registration::Follower(waiter) => {
                    self.record(|s| s.record_coalesced());
                    waiter
                        .wait()
                        .map_err(|reason| CacheError::FetchFailed {
                            key: key.to_string(),
                            reason,
                        })?;
                }
            }
        }

        entry.set_source(SourceRef::Local(self.disk.path(key)));
        Ok(())
    }

    /// Copy the entry's original source into the disk store.
    fn store_source(&self, entry: &OverlayEntry) -> Result<(), CacheError> {
        let key = entry.cache_key();

        // Another leader may have finished between the caller's check and
        // this thread winning registration
        if self.disk.contains(key) {
            return Ok(());
        }

        let bytes = match entry.origin() {
            SourceRef::Remote(url) => self.download(url)?,
            SourceRef::Local(path) => {
                if path == &self.disk.path(key) {
                    return Err(CacheError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} is not in the disk store", path.display()),
                    )));
                }
                fs::read(path)?
            }
        };

        match self.disk.write(key, &bytes) {
            Ok(path) => {
                self.record(|s| s.record_disk_write());
                debug!(key = %key, path = %path.display(), bytes = bytes.len(), "Overlay stored");
                Ok(())
            }
            Err(e) => {
                self.record(|s| s.record_disk_write_failure());
                Err(e)
            }
        }
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, CacheError> {
        let response = match self.fetcher.get(url) {
            Ok(response) => response,
            Err(e) => {
                self.record(|s| s.record_download_failure());
                return Err(e.into());
            }
        };

        match response.content_kind() {
            ContentKind::Image => {}
            kind => {
                self.record(|s| s.record_download_failure());
                return Err(CacheError::UnexpectedContent(kind));
            }
        }

        let len = response.body.len() as u64;
        self.record(|s| s.record_download(len));
        debug!(url = %url, bytes = len, "Overlay downloaded");
        Ok(response.body)
    }

    /// Decode the stored file for an entry, running repair if needed.
    ///
    /// A stored file that does not decode is removed so the next attempt
    /// fetches it again.
    fn load_from_disk(&self, entry: &OverlayEntry) -> Result<Option<OverlayImage>, CacheError> {
        let key = entry.cache_key();
        let Some(bytes) = self.disk.read(key)? else {
            return Ok(None);
        };

        let decoded = match repair::decode(&bytes, entry.format()) {
            Ok(image) => image,
            Err(e) => {
                warn!(key = %key, error = %e, "Stored overlay is not a valid image, discarding");
                let _ = self.disk.remove(key);
                entry.reset_source();
                return Err(e);
            }
        };

        let decoded_dims = decoded.dimensions();
        let header_dims = repair::header_dimensions(&bytes).unwrap_or(decoded_dims);
        let canonical = self.config.canonical_size;

        if repair::needs_repair(self.config.repair, decoded_dims, header_dims, canonical)
            && self.repaired.lock().insert(key.clone())
        {
            match repair::repair_stored(&self.disk, key, entry.format(), canonical) {
                Ok(RepairOutcome::Resized(image)) => {
                    self.record(|s| s.record_repair());
                    return Ok(Some(Arc::new(image)));
                }
                Ok(RepairOutcome::Unchanged) => {}
                Err(e) => {
                    self.record(|s| s.record_repair_failure());
                    return Err(e);
                }
            }
        }

        Ok(Some(Arc::new(decoded)))
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}
