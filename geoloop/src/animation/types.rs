//! Scheduler state and errors.

use crate::cache::CacheError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Slowest speed dial setting.
pub const MIN_SPEED: u8 = 1;

/// Fastest speed dial setting.
pub const MAX_SPEED: u8 = 100;

/// Speed dial setting of a new scheduler.
pub const DEFAULT_SPEED: u8 = 50;

/// Frame period at speed 1; speed `s` waits `base / s`.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_secs(10);

/// Clamp a requested speed onto the dial.
pub fn clamp_speed(speed: i64) -> u8 {
    speed.clamp(MIN_SPEED as i64, MAX_SPEED as i64) as u8
}

/// Playback state machine: `Idle -> Playing <-> Paused -> Stopped -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `play` or a manual step was requested while the loop runs
    #[error("Animation is already playing")]
    AlreadyPlaying,

    /// The scheduler has no frames to show
    #[error("Animation has no frames")]
    NoFrames,

    /// Every frame is hidden
    #[error("All {0} frames are hidden")]
    AllHidden(usize),

    /// The worker thread could not be started
    #[error("Failed to spawn animation worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// A manually stepped frame could not be realized
    #[error("Frame {index} could not be loaded: {source}")]
    Frame {
        index: usize,
        #[source]
        source: CacheError,
    },
}
