//! Overlay groups: the unit a viewer attaches, enables and disables.
//!
//! A group owns an optional animation loop plus any number of static
//! overlays (a background map, a county outline) that stay visible while the
//! group is enabled. Every entry in a group shares the group's key prefix
//! and the group's [`TileCache`].

use super::entry::{OverlayEntry, OverlayImage, SourceRef};
use super::key::CacheKey;
use super::kml::{self, HrefMode};
use crate::animation::{AnimationScheduler, SchedulerError};
use crate::cache::{AsyncFetch, CacheError, TileCache};
use crate::coord::Sector;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised by group operations.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Overlay {0} is already part of this group")]
    DuplicateKey(CacheKey),

    #[error("Group has no animation loop")]
    NoAnimation,

    #[error("Group has been disposed")]
    Disposed,

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// What the render thread draws for one entry.
#[derive(Debug, Clone)]
pub enum DrawImage {
    Ready(OverlayImage),
    /// Entry is visible but its image is not realized yet
    Placeholder,
}

/// One element of a per-frame draw list.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub key: CacheKey,
    pub sector: Sector,
    pub image: DrawImage,
}

impl DrawItem {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.image, DrawImage::Placeholder)
    }
}

/// Result of a synchronous prewarm.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PrewarmSummary {
    pub ready: usize,
    pub failed: usize,
}

struct GroupState {
    enabled: bool,
    /// Loop was playing when the group was last disabled
    resume: bool,
    disposed: bool,
}

/// A named set of overlays enabled and disabled as a whole.
pub struct OverlayGroup {
    name: String,
    base: String,
    cache: Arc<TileCache>,
    animation: Option<AnimationScheduler>,
    statics: RwLock<Vec<Arc<OverlayEntry>>>,
    keys: Mutex<HashSet<CacheKey>>,
    state: Mutex<GroupState>,
}

impl OverlayGroup {
    /// Create an enabled group with no animation loop.
    pub fn new(name: impl Into<String>, cache: Arc<TileCache>) -> Self {
        let name = name.into();
        let base = CacheKey::group_prefix(&name);
        Self {
            name,
            base,
            cache,
            animation: None,
            statics: RwLock::new(Vec::new()),
            keys: Mutex::new(HashSet::new()),
            state: Mutex::new(GroupState {
                enabled: true,
                resume: false,
                disposed: false,
            }),
        }
    }

    /// Create a group driving an animation loop over the shared cache.
    pub fn animated(name: impl Into<String>, cache: Arc<TileCache>) -> Self {
        let scheduler = AnimationScheduler::new(Arc::clone(&cache));
        Self::new(name, cache).with_scheduler(scheduler)
    }

    /// Attach a scheduler. Any frames it already holds join the group.
    pub fn with_scheduler(mut self, scheduler: AnimationScheduler) -> Self {
        {
            let mut keys = self.keys.lock();
            for frame in scheduler.frames() {
                keys.insert(frame.cache_key().clone());
            }
            if let Some(legend) = scheduler.legend() {
                keys.insert(legend.cache_key().clone());
            }
        }
        self.animation = Some(scheduler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key prefix shared by the group's entries, e.g. `Earth/NEXRAD/`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> Option<&AnimationScheduler> {
        self.animation.as_ref()
    }

    /// Build an entry keyed under this group's prefix.
    pub fn entry(
        &self,
        name: impl Into<String>,
        sector: Sector,
        source: SourceRef,
    ) -> OverlayEntry {
        OverlayEntry::from_source(&self.base, name, sector, source)
    }

    /// Add an always-visible overlay.
    pub fn add_static(&self, entry: Arc<OverlayEntry>) -> Result<(), GroupError> {
        let state = self.state.lock();
        if state.disposed {
            return Err(GroupError::Disposed);
        }
        self.claim_key(&entry)?;
        entry.set_enabled(state.enabled);
        self.statics.write().push(entry);
        Ok(())
    }

    /// Append a frame to the animation loop.
    pub fn add_frame(&self, entry: Arc<OverlayEntry>) -> Result<(), GroupError> {
        let scheduler = self.animation.as_ref().ok_or(GroupError::NoAnimation)?;
        if self.state.lock().disposed {
            return Err(GroupError::Disposed);
        }
        self.claim_key(&entry)?;
        scheduler.add_frame(entry);
        Ok(())
    }

    /// Set the loop's legend, replacing any previous one.
    pub fn set_legend(&self, entry: Arc<OverlayEntry>) -> Result<(), GroupError> {
        let scheduler = self.animation.as_ref().ok_or(GroupError::NoAnimation)?;
        if self.state.lock().disposed {
            return Err(GroupError::Disposed);
        }
        self.claim_key(&entry)?;
        if let Some(previous) = scheduler.legend() {
            self.keys.lock().remove(previous.cache_key());
        }
        scheduler.set_legend(Some(entry));
        Ok(())
    }

    pub fn statics(&self) -> Vec<Arc<OverlayEntry>> {
        self.statics.read().clone()
    }

    /// Every entry in the group: frames in loop order, the legend, then statics.
    pub fn entries(&self) -> Vec<Arc<OverlayEntry>> {
        let mut entries = Vec::new();
        if let Some(scheduler) = &self.animation {
            entries.extend(scheduler.frames());
            entries.extend(scheduler.legend());
        }
        entries.extend(self.statics());
        entries
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Enable or disable every entry in the group.
    ///
    /// Disabling halts the loop and hides frames, the legend and statics.
    /// Enabling shows the statics again and resumes the loop if it was
    /// playing when the group was disabled.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), GroupError> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(GroupError::Disposed);
        }
        if state.enabled == enabled {
            return Ok(());
        }
        state.enabled = enabled;

        for entry in self.statics.read().iter() {
            entry.set_enabled(enabled);
        }

        if let Some(scheduler) = &self.animation {
            if enabled {
                let resume = std::mem::take(&mut state.resume);
                scheduler.reveal(resume)?;
            } else {
                state.resume = scheduler.conceal();
            }
        }

        debug!(group = %self.name, enabled, "Overlay group visibility changed");
        Ok(())
    }

    /// Fetch every entry into the disk store before first render.
    ///
    /// Failures are reported to the cache's listeners and counted.
    pub fn prewarm(&self) -> Result<PrewarmSummary, GroupError> {
        self.ensure_live()?;
        let mut summary = PrewarmSummary::default();
        for entry in self.entries() {
            match self.cache.synchronous_fetch(&entry) {
                Ok(()) => summary.ready += 1,
                Err(CacheError::Disposed) => return Err(GroupError::Cache(CacheError::Disposed)),
                Err(_) => summary.failed += 1,
            }
        }
        info!(
            group = %self.name,
            ready = summary.ready,
            failed = summary.failed,
            "Overlay group prewarmed"
        );
        Ok(summary)
    }

    /// Start background fetches for every entry not yet stored.
    ///
    /// Returns the handles of the fetches this call started; keys already
    /// stored or already in flight are skipped.
    pub fn prewarm_async(&self) -> Result<Vec<JoinHandle<Result<(), CacheError>>>, GroupError> {
        self.ensure_live()?;
        let mut handles = Vec::new();
        for entry in self.entries() {
            if let AsyncFetch::Started(handle) = self.cache.asynchronous_fetch(entry)? {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Draw list for the current render frame. Never blocks on I/O.
    ///
    /// Only enabled entries are listed. An enabled entry whose image is not
    /// available right now is listed as a placeholder.
    pub fn draw_items(&self) -> Vec<DrawItem> {
        match self.state.try_lock() {
            Some(state) if state.enabled && !state.disposed => {}
            _ => return Vec::new(),
        }

        self.entries()
            .into_iter()
            .filter(|entry| entry.is_enabled())
            .map(|entry| DrawItem {
                key: entry.cache_key().clone(),
                sector: entry.sector(),
                image: match self.cache.peek(&entry) {
                    Some(image) => DrawImage::Ready(image),
                    None => DrawImage::Placeholder,
                },
            })
            .collect()
    }

    /// Delete the cached file of every entry. Returns how many were removed.
    pub fn purge(&self) -> Result<usize, GroupError> {
        let mut removed = 0;
        for entry in self.entries() {
            if self.cache.purge(&entry)? {
                removed += 1;
            }
        }
        info!(group = %self.name, removed, "Overlay group purged");
        Ok(removed)
    }

    /// Stop the loop, hide everything and release the entries.
    ///
    /// The shared cache and the files it holds are left alone.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.enabled = false;
        state.resume = false;

        if let Some(scheduler) = &self.animation {
            scheduler.stop();
        }
        for entry in self.statics.write().drain(..) {
            entry.set_enabled(false);
        }
        self.keys.lock().clear();
        info!(group = %self.name, "Overlay group disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Export the group as a KML document.
    pub fn to_kml(&self, mode: HrefMode) -> String {
        let entries = self.entries();
        kml::document(&self.name, entries.iter().map(|entry| &**entry), mode)
    }

    fn claim_key(&self, entry: &OverlayEntry) -> Result<(), GroupError> {
        if self.keys.lock().insert(entry.cache_key().clone()) {
            Ok(())
        } else {
            Err(GroupError::DuplicateKey(entry.cache_key().clone()))
        }
    }

    fn ensure_live(&self) -> Result<(), GroupError> {
        if self.state.lock().disposed {
            Err(GroupError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for OverlayGroup {
    fn drop(&mut self) {
        if let Some(scheduler) = &self.animation {
            scheduler.stop();
        }
    }
}
