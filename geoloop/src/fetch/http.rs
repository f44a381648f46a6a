//! HTTP fetcher abstraction for testability

use super::types::{FetchError, FetchResponse};
use std::time::Duration;
use tracing::{debug, trace};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent string for HTTP requests.
/// Some tile servers reject requests that carry no User-Agent.
pub const DEFAULT_USER_AGENT: &str = concat!("geoloop/", env!("CARGO_PKG_VERSION"));

/// Trait for synchronous HTTP GET requests.
///
/// This abstraction allows for dependency injection so the cache can be
/// exercised against scripted responses in tests.
pub trait HttpFetcher: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// Returns the full response for 2xx statuses and
    /// [`FetchError::Status`] for anything else.
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Real HTTP fetcher implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    /// Creates a new fetcher with the default timeout and User-Agent.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_options(DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT)
    }

    /// Creates a new fetcher with a custom timeout and User-Agent.
    pub fn with_options(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        trace!(url = %url, "HTTP GET");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "HTTP request rejected");
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Body(e.to_string()))?;

        debug!(url = %url, bytes = body.len(), "HTTP response received");

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
