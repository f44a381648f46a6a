//! Time-loop animation of overlay frames.
//!
//! An [`AnimationScheduler`] owns an ordered list of frames and a single
//! background worker that keeps exactly one of them visible, advancing on a
//! timer derived from a 1-100 speed dial.

mod scheduler;
mod types;

pub use scheduler::AnimationScheduler;
pub use types::{
    clamp_speed, PlaybackStatus, SchedulerError, DEFAULT_BASE_INTERVAL, DEFAULT_SPEED, MAX_SPEED,
    MIN_SPEED,
};
