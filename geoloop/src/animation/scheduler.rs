//! Background frame scheduler.

use super::types::{
    clamp_speed, PlaybackStatus, SchedulerError, DEFAULT_BASE_INTERVAL, DEFAULT_SPEED,
};
use crate::cache::{CacheError, TileCache};
use crate::events::{Listeners, OverlayListener};
use crate::overlay::{CacheKey, OverlayEntry};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Playback state guarded by one lock.
///
/// `generation` changes whenever the running worker is superseded; a worker
/// only touches visibility while its generation is current and it holds
/// this lock.
struct LoopState {
    status: PlaybackStatus,
    visible_index: Option<usize>,
    speed: u8,
    hidden: HashSet<CacheKey>,
    generation: u64,
}

impl LoopState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.status == PlaybackStatus::Playing
    }
}

/// State shared with the worker thread.
struct Shared {
    cache: Arc<TileCache>,
    frames: RwLock<Vec<Arc<OverlayEntry>>>,
    legend: RwLock<Option<Arc<OverlayEntry>>>,
    state: Mutex<LoopState>,
    /// Held from the generation check until listeners have been told.
    /// Taken before `state`, never while holding it.
    notify: ReentrantMutex<()>,
    listeners: Listeners,
    base_interval: Duration,
}

/// Notification decided under the state lock and sent after releasing it.
enum Notice {
    Step {
        index: usize,
        total: usize,
        frame: String,
    },
    Error {
        source: String,
        error: CacheError,
    },
}

impl Notice {
    fn send(self, listeners: &Listeners) {
        match self {
            Notice::Step {
                index,
                total,
                frame,
            } => listeners.notify_step(index, total, &frame),
            Notice::Error { source, error } => listeners.notify_error(&source, &error),
        }
    }
}

/// Cycles visibility across an ordered list of overlay frames.
///
/// Frames are shown in insertion order. Exactly one worker thread runs
/// while playing; stopping or pausing supersedes it immediately, and a
/// superseded worker can no longer change visibility or notify listeners.
///
/// Listeners are called without the playback lock held and may call back
/// into the scheduler, including stopping it from `on_step`.
pub struct AnimationScheduler {
    shared: Arc<Shared>,
    /// Dropping the sender wakes a sleeping worker
    stop_tx: Mutex<Option<Sender<()>>>,
}

impl AnimationScheduler {
    /// Create a scheduler with the default base interval.
    pub fn new(cache: Arc<TileCache>) -> Self {
        Self::with_interval(cache, DEFAULT_BASE_INTERVAL)
    }

    /// Create a scheduler whose speed-1 frame period is `base_interval`.
    pub fn with_interval(cache: Arc<TileCache>, base_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache,
                frames: RwLock::new(Vec::new()),
                legend: RwLock::new(None),
                state: Mutex::new(LoopState {
                    status: PlaybackStatus::Idle,
                    visible_index: None,
                    speed: DEFAULT_SPEED,
                    hidden: HashSet::new(),
                    generation: 0,
                }),
                notify: ReentrantMutex::new(()),
                listeners: Listeners::new(),
                base_interval,
            }),
            stop_tx: Mutex::new(None),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn OverlayListener>) {
        self.shared.listeners.subscribe(listener);
    }

    pub fn listeners(&self) -> &Listeners {
        &self.shared.listeners
    }

    /// Append a frame; playback order is insertion order.
    pub fn add_frame(&self, frame: Arc<OverlayEntry>) {
        frame.set_enabled(false);
        self.shared.frames.write().push(frame);
    }

    /// Remove the frame with `key`, keeping the visible index in range.
    pub fn remove_frame(&self, key: &CacheKey) -> Option<Arc<OverlayEntry>> {
        let mut state = self.shared.state.lock();
        let mut frames = self.shared.frames.write();

        let position = frames.iter().position(|f| f.cache_key() == key)?;
        let removed = frames.remove(position);
        removed.set_enabled(false);
        state.hidden.remove(key);

        state.visible_index = match state.visible_index {
            _ if frames.is_empty() => None,
            Some(visible) if visible == position => position.checked_sub(1),
            Some(visible) if visible > position => Some(visible - 1),
            other => other,
        };

        debug!(key = %key, remaining = frames.len(), "Removed animation frame");
        Some(removed)
    }

    pub fn frames(&self) -> Vec<Arc<OverlayEntry>> {
        self.shared.frames.read().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.frames.read().len()
    }

    /// Overlay shown while the loop plays, such as a color scale.
    pub fn set_legend(&self, legend: Option<Arc<OverlayEntry>>) {
        let playing = self.status() == PlaybackStatus::Playing;
        let mut slot = self.shared.legend.write();
        if let Some(old) = slot.take() {
            old.set_enabled(false);
        }
        if let Some(new) = &legend {
            new.set_enabled(playing);
        }
        *slot = legend;
    }

    pub fn legend(&self) -> Option<Arc<OverlayEntry>> {
        self.shared.legend.read().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.state.lock().status
    }

    /// Index of the visible frame, `None` when idle or stopped.
    pub fn visible_index(&self) -> Option<usize> {
        self.shared.state.lock().visible_index
    }

    pub fn speed(&self) -> u8 {
        self.shared.state.lock().speed
    }

    /// Set the speed dial, clamped to 1..=100. Returns the applied value.
    ///
    /// A running loop picks the new speed up at its next sleep.
    pub fn set_speed(&self, speed: i64) -> u8 {
        let speed = clamp_speed(speed);
        self.shared.state.lock().speed = speed;
        speed
    }

    pub fn base_interval(&self) -> Duration {
        self.shared.base_interval
    }

    /// Current frame period.
    pub fn interval(&self) -> Duration {
        self.shared.base_interval / self.speed() as u32
    }

    /// Exclude or re-include a frame from playback.
    pub fn set_hidden(&self, key: &CacheKey, hidden: bool) {
        let mut state = self.shared.state.lock();
        if hidden {
            state.hidden.insert(key.clone());
            let frames = self.shared.frames.read();
            if let Some(frame) = frames.iter().find(|f| f.cache_key() == key) {
                frame.set_enabled(false);
            }
        } else {
            state.hidden.remove(key);
        }
    }

    pub fn is_hidden(&self, key: &CacheKey) -> bool {
        self.shared.state.lock().hidden.contains(key)
    }

    /// Start the loop from Idle, Paused or Stopped.
    ///
    /// Resumes after the visible frame, or from the first frame when none
    /// is visible. Calling this while playing is an error.
    pub fn play(&self) -> Result<(), SchedulerError> {
        let mut state = self.shared.state.lock();
        if state.status == PlaybackStatus::Playing {
            return Err(SchedulerError::AlreadyPlaying);
        }

        let total = self.shared.frames.read().len();
        if total == 0 {
            return Err(SchedulerError::NoFrames);
        }

        let start = state.visible_index.map(|i| (i + 1) % total).unwrap_or(0);
        state.generation += 1;
        let generation = state.generation;

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("overlay-loop".to_string())
            .spawn(move || run_loop(shared, generation, stop_rx, start))?;

        state.status = PlaybackStatus::Playing;
        if let Some(legend) = self.shared.legend.read().as_ref() {
            legend.set_enabled(true);
        }
        *self.stop_tx.lock() = Some(stop_tx);

        info!(frames = total, start, speed = state.speed, "Animation playing");
        Ok(())
    }

    /// Halt advancement, leaving the visible frame in place.
    pub fn pause(&self) {
        let mut state = self.shared.state.lock();
        if state.status != PlaybackStatus::Playing {
            return;
        }
        state.generation += 1;
        state.status = PlaybackStatus::Paused;
        self.stop_tx.lock().take();
        debug!(visible = ?state.visible_index, "Animation paused");
        drop(state);
        self.quiesce();
    }

    /// Stop the loop, hiding every frame and the legend.
    ///
    /// Returns without waiting for the worker. Once this returns the old
    /// worker can no longer change visibility or notify a step; a fetch it
    /// has in flight still completes into the cache.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.status = PlaybackStatus::Stopped;
        state.visible_index = None;
        self.stop_tx.lock().take();

        for frame in self.shared.frames.read().iter() {
            frame.set_enabled(false);
        }
        if let Some(legend) = self.shared.legend.read().as_ref() {
            legend.set_enabled(false);
        }
        debug!("Animation stopped");
        drop(state);
        self.quiesce();
    }

    /// Wait out a notification the superseded worker is already sending.
    fn quiesce(&self) {
        drop(self.shared.notify.lock());
    }

    /// Return a stopped scheduler to Idle.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        if state.status == PlaybackStatus::Stopped {
            state.status = PlaybackStatus::Idle;
        }
    }

    /// Halt the loop and hide every frame and the legend.
    ///
    /// Returns whether the loop was playing. The visible index is kept so
    /// [`reveal`](Self::reveal) can pick up where the loop left off.
    pub fn conceal(&self) -> bool {
        let mut state = self.shared.state.lock();
        let was_playing = state.status == PlaybackStatus::Playing;
        if was_playing {
            state.generation += 1;
            state.status = PlaybackStatus::Paused;
            self.stop_tx.lock().take();
        }

        for frame in self.shared.frames.read().iter() {
            frame.set_enabled(false);
        }
        if let Some(legend) = self.shared.legend.read().as_ref() {
            legend.set_enabled(false);
        }
        debug!(was_playing, "Animation concealed");
        drop(state);
        self.quiesce();
        was_playing
    }

    /// Undo [`conceal`](Self::conceal).
    ///
    /// With `resume` the loop plays again; otherwise a paused frame and the
    /// legend are shown again.
    pub fn reveal(&self, resume: bool) -> Result<(), SchedulerError> {
        if resume {
            return self.play();
        }

        let state = self.shared.state.lock();
        if state.status != PlaybackStatus::Paused {
            return Ok(());
        }
        let frames = self.shared.frames.read();
        if let Some(frame) = state.visible_index.and_then(|i| frames.get(i)) {
            if frame.is_realized() {
                frame.set_enabled(true);
            }
        }
        if let Some(legend) = self.shared.legend.read().as_ref() {
            legend.set_enabled(true);
        }
        Ok(())
    }

    /// Show the next non-hidden frame. Not allowed while playing.
    pub fn step_forward(&self) -> Result<usize, SchedulerError> {
        self.step(true)
    }

    /// Show the previous non-hidden frame. Not allowed while playing.
    pub fn step_backward(&self) -> Result<usize, SchedulerError> {
        self.step(false)
    }

    fn step(&self, forward: bool) -> Result<usize, SchedulerError> {
        let (target, frame, total) = {
            let state = self.shared.state.lock();
            if state.status == PlaybackStatus::Playing {
                return Err(SchedulerError::AlreadyPlaying);
            }
            let frames = self.shared.frames.read();
            let total = frames.len();
            if total == 0 {
                return Err(SchedulerError::NoFrames);
            }

            let mut candidate = state.visible_index;
            let mut found = None;
            for _ in 0..total {
                let next = match (candidate, forward) {
                    (None, true) => 0,
                    (None, false) => total - 1,
                    (Some(i), true) => (i + 1) % total,
                    (Some(i), false) => (i + total - 1) % total,
                };
                if !state.hidden.contains(frames[next].cache_key()) {
                    found = Some(next);
                    break;
                }
                candidate = Some(next);
            }

            let target = found.ok_or(SchedulerError::AllHidden(total))?;
            (target, Arc::clone(&frames[target]), total)
        };

        // Realize outside the lock; this may block on the network
        let realized = self.shared.cache.try_get(&frame);

        let _notify = self.shared.notify.lock();
        let mut state = self.shared.state.lock();
        if state.status == PlaybackStatus::Playing {
            return Err(SchedulerError::AlreadyPlaying);
        }
        if let Some(visible) = state.visible_index {
            if let Some(previous) = self.shared.frames.read().get(visible) {
                previous.set_enabled(false);
            }
        }

        match realized {
            Ok(_) => {
                frame.set_enabled(true);
                state.visible_index = Some(target);
                if state.status != PlaybackStatus::Paused {
                    state.status = PlaybackStatus::Paused;
                }
                drop(state);
                self.shared.listeners.notify_step(target, total, frame.name());
                Ok(target)
            }
            Err(e) => {
                frame.set_enabled(false);
                state.visible_index = Some(target);
                drop(state);
                self.shared
                    .listeners
                    .notify_error(&frame.origin().to_string(), &e);
                Err(SchedulerError::Frame {
                    index: target,
                    source: e,
                })
            }
        }
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.generation += 1;
        if state.status == PlaybackStatus::Playing {
            state.status = PlaybackStatus::Stopped;
        }
        self.stop_tx.lock().take();
    }
}

/// Sleep for `interval` unless the scheduler signals. Returns `false` when
/// the worker should exit.
fn sleep(stop_rx: &Receiver<()>, interval: Duration) -> bool {
    match stop_rx.recv_timeout(interval) {
        Err(RecvTimeoutError::Timeout) => true,
        Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
    }
}

/// Worker loop: one iteration per frame.
fn run_loop(shared: Arc<Shared>, generation: u64, stop_rx: Receiver<()>, start: usize) {
    let mut index = start;
    let mut skipped = 0usize;

    trace!(generation, start, "Animation worker started");

    loop {
        let frames = shared.frames.read().clone();
        let total = frames.len();

        if total == 0 {
            if !sleep(&stop_rx, shared.base_interval) {
                break;
            }
            continue;
        }
        if index >= total {
            index = 0;
        }
        let frame = Arc::clone(&frames[index]);

        let (is_hidden, speed) = {
            let state = shared.state.lock();
            if !state.is_current(generation) {
                break;
            }
            (state.hidden.contains(frame.cache_key()), state.speed)
        };

        if is_hidden {
            skipped += 1;
            index = (index + 1) % total;
            if skipped >= total {
                // Everything is hidden; avoid spinning
                skipped = 0;
                if !sleep(&stop_rx, shared.base_interval / speed as u32) {
                    break;
                }
            }
            continue;
        }
        skipped = 0;

        // May block on network I/O, throttling playback
        let realized = shared.cache.try_get(&frame);

        let notify = shared.notify.lock();
        let notice = {
            let mut state = shared.state.lock();
            if !state.is_current(generation) {
                break;
            }
            // The list may have changed during the fetch
            let current = shared.frames.read();
            let Some(position) = current.iter().position(|f| Arc::ptr_eq(f, &frame)) else {
                debug!(frame = %frame.name(), "Frame removed while loading");
                frame.set_enabled(false);
                continue;
            };
            if state.hidden.contains(frame.cache_key()) {
                frame.set_enabled(false);
                index = position + 1;
                continue;
            }

            // Swap visibility in one step so a pause never leaves a gap
            if let Some(previous) = state.visible_index.and_then(|v| current.get(v)) {
                if !Arc::ptr_eq(previous, &frame) {
                    previous.set_enabled(false);
                }
            }
            state.visible_index = Some(position);
            index = position;
            match realized {
                Ok(_) => {
                    frame.set_enabled(true);
                    Notice::Step {
                        index: position,
                        total: current.len(),
                        frame: frame.name().to_string(),
                    }
                }
                Err(error) => {
                    warn!(frame = %frame.name(), error = %error, "Animation frame unavailable");
                    frame.set_enabled(false);
                    Notice::Error {
                        source: frame.origin().to_string(),
                        error,
                    }
                }
            }
        };
        notice.send(&shared.listeners);
        drop(notify);

        let speed = shared.state.lock().speed;
        if !sleep(&stop_rx, shared.base_interval / speed as u32) {
            break;
        }

        index += 1;
    }

    trace!(generation, "Animation worker exited");
}

#[cfg(test)]
mod tests;
