//! HTTP fetch abstraction
//!
//! Performs plain HTTP GET requests for overlay imagery and exposes the
//! status code, response headers and raw body. The only header the rest of
//! the crate looks at is `Content-Type`, which separates KML/KMZ payloads
//! from raw image bytes.
//!
//! ```ignore
//! use geoloop::fetch::{HttpFetcher, ReqwestFetcher};
//!
//! let fetcher = ReqwestFetcher::new()?;
//! let response = fetcher.get("http://example.com/radar.png")?;
//! println!("{} bytes, {:?}", response.body.len(), response.content_kind());
//! ```

mod http;
mod types;

pub use http::{HttpFetcher, ReqwestFetcher, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use types::{ContentKind, FetchError, FetchResponse, KML_MIME_TYPE, KMZ_MIME_TYPE};

#[cfg(test)]
pub use http::tests::MockFetcher;
