//! Overlay listener surface.
//!
//! The cache reports fetch failures and the animation scheduler reports
//! each step through [`OverlayListener`]s. Callbacks may run on worker
//! threads and must not block.

use crate::cache::CacheError;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, RwLock};
use tracing::trace;

/// Receiver of overlay notifications.
///
/// Both methods default to doing nothing so implementors only override
/// what they care about.
pub trait OverlayListener: Send + Sync {
    /// A fetch, decode or repair failed for `source`.
    fn on_error(&self, source: &str, error: &CacheError) {
        let _ = (source, error);
    }

    /// Frame `index` of `total` became the visible frame.
    fn on_step(&self, index: usize, total: usize, frame: &str) {
        let _ = (index, total, frame);
    }
}

/// Shared, cloneable list of listeners.
#[derive(Clone, Default)]
pub struct Listeners {
    inner: Arc<RwLock<Vec<Arc<dyn OverlayListener>>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn OverlayListener>) {
        if let Ok(mut listeners) = self.inner.write() {
            listeners.push(listener);
        }
    }

    /// Remove a listener previously passed to [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, listener: &Arc<dyn OverlayListener>) {
        if let Ok(mut listeners) = self.inner.write() {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut listeners) = self.inner.write() {
            listeners.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_error(&self, source: &str, error: &CacheError) {
        trace!(source = %source, error = %error, "Notifying listeners of error");
        for listener in self.snapshot() {
            listener.on_error(source, error);
        }
    }

    pub fn notify_step(&self, index: usize, total: usize, frame: &str) {
        for listener in self.snapshot() {
            listener.on_step(index, total, frame);
        }
    }

    // Callbacks run without the lock held so listeners may subscribe others.
    fn snapshot(&self) -> Vec<Arc<dyn OverlayListener>> {
        self.inner.read().map(|l| l.clone()).unwrap_or_default()
    }
}

/// Event forwarded by a [`ChannelListener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayEvent {
    Step {
        index: usize,
        total: usize,
        frame: String,
    },
    Error {
        source: String,
        message: String,
    },
}

/// Listener that forwards every notification into an mpsc channel.
pub struct ChannelListener {
    sender: Mutex<Sender<OverlayEvent>>,
}

impl ChannelListener {
    pub fn new(sender: Sender<OverlayEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }

    fn send(&self, event: OverlayEvent) {
        // A dropped receiver just means nobody is listening any more
        if let Ok(sender) = self.sender.lock() {
            let _ = sender.send(event);
        }
    }
}

impl OverlayListener for ChannelListener {
    fn on_error(&self, source: &str, error: &CacheError) {
        self.send(OverlayEvent::Error {
            source: source.to_string(),
            message: error.to_string(),
        });
    }

    fn on_step(&self, index: usize, total: usize, frame: &str) {
        self.send(OverlayEvent::Step {
            index,
            total,
            frame: frame.to_string(),
        });
    }
}
