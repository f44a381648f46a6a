//! geoloop - ground-overlay tile cache and time-loop animation engine
//!
//! This library backs animated weather and satellite loops draped over a
//! globe: a two-level tile cache with at-most-one fetch per resource, a
//! background scheduler that cycles frame visibility, and a resolver that
//! turns a view state into a quadtree tile address.
//!
//! # Example
//!
//! ```ignore
//! use geoloop::cache::{CacheConfig, TileCache};
//! use geoloop::fetch::ReqwestFetcher;
//! use geoloop::overlay::{OverlayGroup, SourceRef};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(TileCache::new(CacheConfig::default(), Arc::new(ReqwestFetcher::new()?))?);
//! let group = OverlayGroup::animated("NEXRAD", Arc::clone(&cache));
//! for (i, url) in frame_urls.iter().enumerate() {
//!     let frame = group.entry(format!("frame {}", i), sector, SourceRef::Remote(url.clone()));
//!     group.add_frame(Arc::new(frame))?;
//! }
//! group.prewarm()?;
//! group.scheduler().unwrap().play()?;
//! ```

pub mod animation;
pub mod cache;
pub mod config;
pub mod coord;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod overlay;
pub mod provider;

/// Version of the geoloop library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
