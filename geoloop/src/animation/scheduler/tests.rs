//! Tests for the animation scheduler

use super::*;
use crate::cache::CacheConfig;
use crate::coord::Sector;
use crate::events::{ChannelListener, OverlayEvent};
use crate::fetch::{FetchResponse, MockFetcher};
use crate::overlay::{OverlayFormat, SourceRef};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use std::sync::{OnceLock, Weak};
use std::time::Instant;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

struct Fixture {
    _temp: TempDir,
    fetcher: MockFetcher,
    cache: Arc<TileCache>,
}

fn png() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::new(4, 4))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn url(i: usize) -> String {
    format!("http://frames.example.com/frame{}.png", i)
}

fn fixture() -> Fixture {
    fixture_with(MockFetcher::new())
}

fn fixture_with(fetcher: MockFetcher) -> Fixture {
    let temp = TempDir::new().unwrap();
    let cache = Arc::new(
        TileCache::new(CacheConfig::new(temp.path()), Arc::new(fetcher.clone())).unwrap(),
    );
    Fixture {
        _temp: temp,
        fetcher,
        cache,
    }
}

fn frame(i: usize) -> Arc<OverlayEntry> {
    Arc::new(OverlayEntry::new(
        "Earth/Loop/",
        format!("frame{}", i),
        Sector::new(0.0, 10.0, 0.0, 10.0),
        SourceRef::Remote(url(i)),
        OverlayFormat::Png,
    ))
}

/// Scheduler over `n` fetchable frames at top speed with a 100 ms base.
fn scheduler(fixture: &Fixture, n: usize) -> (AnimationScheduler, mpsc::Receiver<OverlayEvent>) {
    let scheduler =
        AnimationScheduler::with_interval(Arc::clone(&fixture.cache), Duration::from_millis(100));
    for i in 0..n {
        fixture
            .fetcher
            .respond(&url(i), Ok(FetchResponse::ok("image/png", png())));
        scheduler.add_frame(frame(i));
    }
    scheduler.set_speed(100);

    let (tx, rx) = mpsc::channel();
    scheduler.subscribe(Arc::new(ChannelListener::new(tx)));
    (scheduler, rx)
}

fn next_step(rx: &mpsc::Receiver<OverlayEvent>) -> (usize, usize) {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining).expect("timed out waiting for step") {
            OverlayEvent::Step { index, total, .. } => return (index, total),
            OverlayEvent::Error { .. } => continue,
        }
    }
}

#[test]
fn test_play_wraps_around_after_last_frame() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);

    scheduler.play().unwrap();
    let indices: Vec<usize> = (0..7).map(|_| next_step(&rx).0).collect();
    scheduler.stop();

    assert_eq!(indices, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn test_step_reports_total() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 4);

    scheduler.play().unwrap();
    let (_, total) = next_step(&rx);
    scheduler.stop();

    assert_eq!(total, 4);
}

#[test]
fn test_play_while_playing_is_an_error() {
    let fixture = fixture();
    let (scheduler, _rx) = scheduler(&fixture, 2);

    scheduler.play().unwrap();
    assert!(matches!(scheduler.play(), Err(SchedulerError::AlreadyPlaying)));
    scheduler.stop();
}

#[test]
fn test_play_without_frames_fails() {
    let fixture = fixture();
    let (scheduler, _rx) = scheduler(&fixture, 0);
    assert!(matches!(scheduler.play(), Err(SchedulerError::NoFrames)));
    assert_eq!(scheduler.status(), PlaybackStatus::Idle);
}

#[test]
fn test_speed_is_clamped() {
    let fixture = fixture();
    let scheduler = AnimationScheduler::with_interval(
        Arc::clone(&fixture.cache),
        Duration::from_millis(1000),
    );
    assert_eq!(scheduler.speed(), 50);

    assert_eq!(scheduler.set_speed(0), 1);
    assert_eq!(scheduler.speed(), 1);
    assert_eq!(scheduler.interval(), Duration::from_millis(1000));

    assert_eq!(scheduler.set_speed(500), 100);
    assert_eq!(scheduler.interval(), Duration::from_millis(10));
}

#[test]
fn test_hidden_frames_are_skipped() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);
    let hidden = frame(1);
    scheduler.set_hidden(hidden.cache_key(), true);

    scheduler.play().unwrap();
    let indices: Vec<usize> = (0..4).map(|_| next_step(&rx).0).collect();
    scheduler.stop();

    assert_eq!(indices, vec![0, 2, 0, 2]);
    assert!(!scheduler.frames()[1].is_enabled());
    assert_eq!(fixture.fetcher.request_count(), 2);
}

#[test]
fn test_all_hidden_shows_nothing() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 2);
    for f in scheduler.frames() {
        scheduler.set_hidden(f.cache_key(), true);
    }

    scheduler.play().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    scheduler.stop();

    assert!(rx.try_recv().is_err());
    assert_eq!(fixture.fetcher.request_count(), 0);
}

#[test]
fn test_stop_is_deterministic() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);

    scheduler.play().unwrap();
    next_step(&rx);
    scheduler.stop();

    // Drain anything sent before stop returned
    while rx.try_recv().is_ok() {}
    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());

    assert_eq!(scheduler.status(), PlaybackStatus::Stopped);
    assert_eq!(scheduler.visible_index(), None);
    assert!(scheduler.frames().iter().all(|f| !f.is_enabled()));

    scheduler.reset();
    assert_eq!(scheduler.status(), PlaybackStatus::Idle);
}

#[test]
fn test_pause_keeps_visible_frame() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);

    scheduler.play().unwrap();
    next_step(&rx);
    scheduler.pause();
    while rx.try_recv().is_ok() {}

    let visible = scheduler.visible_index().unwrap();
    assert_eq!(scheduler.status(), PlaybackStatus::Paused);
    assert!(scheduler.frames()[visible].is_enabled());

    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());
    assert_eq!(scheduler.visible_index(), Some(visible));

    // Resume continues after the visible frame
    scheduler.play().unwrap();
    let (index, _) = next_step(&rx);
    scheduler.stop();
    assert_eq!(index, (visible + 1) % 3);
}

#[test]
fn test_fetch_error_disables_frame_and_loop_continues() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 2);
    // frame 2 has no scripted response, so it fails with 404
    scheduler.add_frame(frame(2));

    scheduler.play().unwrap();
    let mut errors = 0;
    let mut steps = Vec::new();
    while steps.len() < 4 {
        match rx.recv_timeout(WAIT).unwrap() {
            OverlayEvent::Step { index, .. } => steps.push(index),
            OverlayEvent::Error { source, .. } => {
                assert_eq!(source, url(2));
                errors += 1;
            }
        }
    }
    scheduler.stop();

    assert_eq!(steps, vec![0, 1, 0, 1]);
    assert!(errors >= 1);
    assert!(!scheduler.frames()[2].is_enabled());
}

#[test]
fn test_legend_follows_playback() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 2);
    let legend = frame(99);
    scheduler.set_legend(Some(Arc::clone(&legend)));
    assert!(!legend.is_enabled());

    scheduler.play().unwrap();
    assert!(legend.is_enabled());
    next_step(&rx);

    scheduler.pause();
    assert!(legend.is_enabled());

    scheduler.stop();
    assert!(!legend.is_enabled());
}

#[test]
fn test_manual_stepping_wraps_both_ways() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);

    assert_eq!(scheduler.step_forward().unwrap(), 0);
    assert_eq!(scheduler.step_forward().unwrap(), 1);
    assert_eq!(scheduler.step_backward().unwrap(), 0);
    assert_eq!(scheduler.step_backward().unwrap(), 2);

    let frames = scheduler.frames();
    assert!(frames[2].is_enabled());
    assert!(!frames[0].is_enabled());
    assert_eq!(scheduler.status(), PlaybackStatus::Paused);
    assert_eq!(next_step(&rx), (0, 3));
}

#[test]
fn test_manual_step_while_playing_fails() {
    let fixture = fixture();
    let (scheduler, _rx) = scheduler(&fixture, 2);

    scheduler.play().unwrap();
    assert!(matches!(
        scheduler.step_forward(),
        Err(SchedulerError::AlreadyPlaying)
    ));
    scheduler.stop();
}

#[test]
fn test_remove_frame_reclamps_visible_index() {
    let fixture = fixture();
    let (scheduler, _rx) = scheduler(&fixture, 3);

    scheduler.step_backward().unwrap();
    assert_eq!(scheduler.visible_index(), Some(2));

    let removed = scheduler.remove_frame(frame(2).cache_key()).unwrap();
    assert!(!removed.is_enabled());
    assert_eq!(scheduler.visible_index(), Some(1));
    assert_eq!(scheduler.frame_count(), 2);

    scheduler.remove_frame(frame(0).cache_key()).unwrap();
    assert_eq!(scheduler.visible_index(), Some(0));

    scheduler.remove_frame(frame(1).cache_key()).unwrap();
    assert_eq!(scheduler.visible_index(), None);
    assert!(scheduler.remove_frame(frame(1).cache_key()).is_none());
}

#[test]
fn test_conceal_hides_everything_and_reveal_resumes() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);
    let legend = frame(99);
    scheduler.set_legend(Some(Arc::clone(&legend)));

    scheduler.play().unwrap();
    next_step(&rx);
    assert!(scheduler.conceal());
    while rx.try_recv().is_ok() {}

    assert_eq!(scheduler.status(), PlaybackStatus::Paused);
    assert!(scheduler.frames().iter().all(|f| !f.is_enabled()));
    assert!(!legend.is_enabled());

    scheduler.reveal(true).unwrap();
    assert_eq!(scheduler.status(), PlaybackStatus::Playing);
    next_step(&rx);
    assert!(legend.is_enabled());
    scheduler.stop();
}

#[test]
fn test_reveal_without_resume_reshows_paused_frame() {
    let fixture = fixture();
    let (scheduler, _rx) = scheduler(&fixture, 2);

    scheduler.step_forward().unwrap();
    assert!(!scheduler.conceal());
    assert!(!scheduler.frames()[0].is_enabled());

    scheduler.reveal(false).unwrap();
    assert_eq!(scheduler.status(), PlaybackStatus::Paused);
    assert!(scheduler.frames()[0].is_enabled());
}

#[test]
fn test_frame_removed_while_loading_is_never_shown() {
    let fixture = fixture_with(MockFetcher::new().with_delay(Duration::from_millis(300)));
    let (scheduler, rx) = scheduler(&fixture, 3);
    let first = scheduler.frames()[0].clone();

    scheduler.play().unwrap();
    // The worker is now blocked fetching frame 0
    std::thread::sleep(Duration::from_millis(100));
    let removed = scheduler.remove_frame(first.cache_key()).unwrap();
    assert!(Arc::ptr_eq(&removed, &first));

    assert_eq!(next_step(&rx), (0, 2));
    assert!(!first.is_enabled());
    assert_eq!(scheduler.visible_index(), Some(0));
    let frames = scheduler.frames();
    assert_eq!(frames[0].name(), "frame1");
    assert!(frames[0].is_enabled());

    scheduler.stop();
    assert!(!first.is_enabled());
    assert!(scheduler.frames().iter().all(|f| !f.is_enabled()));
}

#[test]
fn test_hiding_and_unhiding_while_playing() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);
    let middle = scheduler.frames()[1].clone();

    scheduler.play().unwrap();
    next_step(&rx);
    scheduler.set_hidden(middle.cache_key(), true);
    assert!(!middle.is_enabled());

    // At most one step decided before the hide may still arrive
    while rx.try_recv().is_ok() {}
    next_step(&rx);
    for _ in 0..6 {
        let (index, total) = next_step(&rx);
        assert_ne!(index, 1);
        assert_eq!(total, 3);
        assert!(!middle.is_enabled());
    }

    scheduler.set_hidden(middle.cache_key(), false);
    let shown = (0..6).any(|_| next_step(&rx).0 == 1);
    scheduler.stop();

    assert!(shown);
    assert!(scheduler.frames().iter().all(|f| !f.is_enabled()));
}

/// Listener that inspects and then stops the scheduler from `on_step`.
#[derive(Default)]
struct StopOnStep {
    scheduler: OnceLock<Weak<AnimationScheduler>>,
    seen: Mutex<Vec<(PlaybackStatus, Option<usize>)>>,
}

impl OverlayListener for StopOnStep {
    fn on_step(&self, _index: usize, _total: usize, _frame: &str) {
        if let Some(scheduler) = self.scheduler.get().and_then(Weak::upgrade) {
            self.seen
                .lock()
                .push((scheduler.status(), scheduler.visible_index()));
            scheduler.stop();
        }
    }
}

#[test]
fn test_listener_may_call_back_into_scheduler() {
    let fixture = fixture();
    let (scheduler, rx) = scheduler(&fixture, 3);
    let scheduler = Arc::new(scheduler);
    let listener = Arc::new(StopOnStep::default());
    listener.scheduler.set(Arc::downgrade(&scheduler)).unwrap();
    scheduler.subscribe(listener.clone());

    scheduler.play().unwrap();
    next_step(&rx);

    let deadline = Instant::now() + WAIT;
    while scheduler.status() != PlaybackStatus::Stopped {
        assert!(Instant::now() < deadline, "listener never stopped the loop");
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(
        listener.seen.lock().as_slice(),
        &[(PlaybackStatus::Playing, Some(0))]
    );
    assert!(scheduler.frames().iter().all(|f| !f.is_enabled()));
}
