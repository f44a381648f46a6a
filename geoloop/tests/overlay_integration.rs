//! Integration tests for the overlay cache and animation engine.
//!
//! These tests drive the public API end to end:
//! - Resolving a view to a tile and caching it under its key
//! - Reopening a cache directory and serving from disk without the network
//! - Coalescing concurrent requests for one key
//! - Reporting non-image payloads to listeners
//! - Playing an animated group with hidden frames
//! - Building a cache from a config file

use geoloop::animation::{AnimationScheduler, PlaybackStatus};
use geoloop::cache::{CacheConfig, CacheError, TileCache};
use geoloop::config::ConfigFile;
use geoloop::coord::Sector;
use geoloop::events::{ChannelListener, OverlayEvent};
use geoloop::fetch::{FetchError, FetchResponse, HttpFetcher, KML_MIME_TYPE};
use geoloop::overlay::{OverlayGroup, SourceRef};
use geoloop::provider::{MapType, TileServer, DEFAULT_LAYER_GROUP};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Fetcher serving canned responses by URL and counting requests.
#[derive(Default)]
struct StubFetcher {
    responses: Mutex<HashMap<String, FetchResponse>>,
    requests: AtomicUsize,
    delay: Duration,
}

impl StubFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn serve(&self, url: &str, response: FetchResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpFetcher for StubFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgba8(RgbaImage::new(width, height)),
        ImageFormat::Png,
    )
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::new(width, height)),
        ImageFormat::Jpeg,
    )
}

fn radar_sector() -> Sector {
    Sector::new(20.0, 50.0, -125.0, -65.0)
}

fn open_cache(dir: &TempDir, fetcher: Arc<StubFetcher>) -> Arc<TileCache> {
    Arc::new(TileCache::new(CacheConfig::new(dir.path()), fetcher).unwrap())
}

// =============================================================================
// Tile Resolution and Caching
// =============================================================================

#[test]
fn test_view_tile_is_cached_under_its_key() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let server = TileServer::new(MapType::Aerial);

    let entry = Arc::new(
        server
            .overlay_for_view(45.0, 90.0, 180.0, DEFAULT_LAYER_GROUP)
            .unwrap(),
    );
    assert_eq!(entry.cache_key().as_str(), "Earth/VirtualEarth/a3.jpeg");
    fetcher.serve(
        &server.tile_url("3"),
        FetchResponse::ok("image/jpeg", jpeg(256, 256)),
    );

    let cache = open_cache(&dir, Arc::clone(&fetcher));
    let image = cache.try_get(&entry).unwrap();

    assert_eq!((image.width(), image.height()), (256, 256));
    assert!(dir
        .path()
        .join("Earth")
        .join("VirtualEarth")
        .join("a3.jpeg")
        .exists());
    assert!(matches!(entry.source(), SourceRef::Local(_)));
    assert_eq!(fetcher.requests(), 1);
}

#[test]
fn test_reopened_cache_serves_from_disk() {
    let dir = TempDir::new().unwrap();
    let url = "http://radar.example.com/n0r.png";

    {
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.serve(url, FetchResponse::ok("image/png", png(32, 32)));
        let cache = open_cache(&dir, fetcher);
        let group = OverlayGroup::new("NEXRAD", Arc::clone(&cache));
        let entry = group.entry("n0r", radar_sector(), SourceRef::Remote(url.to_string()));
        cache.synchronous_fetch(&entry).unwrap();
    }

    // Second session: the network has nothing to offer
    let fetcher = Arc::new(StubFetcher::default());
    let cache = open_cache(&dir, Arc::clone(&fetcher));
    let group = OverlayGroup::new("NEXRAD", Arc::clone(&cache));
    let entry = group.entry("n0r", radar_sector(), SourceRef::Remote(url.to_string()));

    let image = cache.try_get(&entry).unwrap();
    assert_eq!(image.width(), 32);
    assert_eq!(fetcher.requests(), 0);
    assert_eq!(cache.stats().disk_hits, 1);
}

#[test]
fn test_concurrent_requests_share_one_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(StubFetcher::with_delay(Duration::from_millis(100)));
    let url = "http://radar.example.com/slow.png";
    fetcher.serve(url, FetchResponse::ok("image/png", png(16, 16)));
    let cache = open_cache(&dir, Arc::clone(&fetcher));

    let group = OverlayGroup::new("NEXRAD", Arc::clone(&cache));
    let entry = Arc::new(group.entry("slow", radar_sector(), SourceRef::Remote(url.to_string())));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let entry = Arc::clone(&entry);
            thread::spawn(move || cache.try_get(&entry).map(|image| image.width()))
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap().unwrap(), 16);
    }
    assert_eq!(fetcher.requests(), 1);
}

#[test]
fn test_kml_payload_is_reported_not_stored() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let url = "http://radar.example.com/layers.png";
    fetcher.serve(
        url,
        FetchResponse::ok(KML_MIME_TYPE, b"<kml></kml>".to_vec()),
    );
    let cache = open_cache(&dir, Arc::clone(&fetcher));
    let (tx, rx) = mpsc::channel();
    cache.subscribe(Arc::new(ChannelListener::new(tx)));

    let group = OverlayGroup::new("NEXRAD", Arc::clone(&cache));
    let entry = group.entry("layers", radar_sector(), SourceRef::Remote(url.to_string()));

    assert!(cache.get(&entry).is_none());
    assert!(!cache.path_for(&entry).exists());
    match rx.recv_timeout(Duration::from_secs(1)).unwrap() {
        OverlayEvent::Error { source, .. } => assert_eq!(source, url),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(
        cache.try_get(&entry),
        Err(CacheError::UnexpectedContent(_))
    ));
}

// =============================================================================
// Animation
// =============================================================================

#[test]
fn test_animated_group_skips_hidden_frames() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(StubFetcher::default());
    let cache = open_cache(&dir, Arc::clone(&fetcher));

    let scheduler = AnimationScheduler::with_interval(Arc::clone(&cache), Duration::from_millis(200));
    scheduler.set_speed(100);
    let group = OverlayGroup::new("NEXRAD", Arc::clone(&cache)).with_scheduler(scheduler);

    let mut frames = Vec::new();
    for i in 0..3 {
        let url = format!("http://radar.example.com/n0r_{}.png", i);
        fetcher.serve(&url, FetchResponse::ok("image/png", png(8, 8)));
        let frame = Arc::new(group.entry(format!("n0r_{}", i), radar_sector(), SourceRef::Remote(url)));
        group.add_frame(Arc::clone(&frame)).unwrap();
        frames.push(frame);
    }
    let summary = group.prewarm().unwrap();
    assert_eq!(summary.ready, 3);

    let scheduler = group.scheduler().unwrap();
    scheduler.set_hidden(frames[1].cache_key(), true);
    let (tx, rx) = mpsc::channel();
    scheduler.subscribe(Arc::new(ChannelListener::new(tx)));
    scheduler.play().unwrap();

    let mut shown = Vec::new();
    while shown.len() < 4 {
        if let OverlayEvent::Step { index, total, .. } =
            rx.recv_timeout(Duration::from_secs(5)).unwrap()
        {
            assert_eq!(total, 3);
            shown.push(index);
        }
    }
    scheduler.stop();

    assert_eq!(shown, vec![0, 2, 0, 2]);
    assert_eq!(scheduler.status(), PlaybackStatus::Stopped);
    assert!(frames.iter().all(|frame| !frame.is_enabled()));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_cache_from_config_file() {
    let dir = TempDir::new().unwrap();
    let cache_dir = dir.path().join("overlays");
    let config_path = dir.path().join("config.ini");
    std::fs::write(
        &config_path,
        format!(
            "[cache]\ndirectory = {}\nmemory_size = 16MB\n\n[animation]\nbase_interval_ms = 2000\ndefault_speed = 250\n",
            cache_dir.display()
        ),
    )
    .unwrap();

    let config = ConfigFile::load_from(&config_path).unwrap();
    assert_eq!(config.animation.default_speed, 100);
    assert_eq!(config.base_interval(), Duration::from_secs(2));

    let cache = TileCache::new(config.cache_config(), Arc::new(StubFetcher::default())).unwrap();
    assert_eq!(cache.cache_dir(), cache_dir.as_path());
    assert_eq!(cache.config().memory_size_bytes, 16 * 1024 * 1024);
}
