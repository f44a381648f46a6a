//! Fetch types and errors

use thiserror::Error;

/// MIME type announced for KML documents.
pub const KML_MIME_TYPE: &str = "application/vnd.google-earth.kml+xml";

/// MIME type announced for zipped KML archives.
pub const KMZ_MIME_TYPE: &str = "application/vnd.google-earth.kmz";

/// Errors that can occur while fetching a resource.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The request could not be sent or timed out
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read
    #[error("Failed to read response: {0}")]
    Body(String),
}

/// Payload classification derived from the `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Kml,
    Kmz,
    /// Anything else is treated as raw image bytes
    Image,
}

impl ContentKind {
    /// Classify a `Content-Type` header value.
    ///
    /// Parameters such as `charset` are ignored and the comparison is
    /// case-insensitive.
    pub fn from_content_type(value: &str) -> Self {
        let essence = value.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case(KML_MIME_TYPE) {
            ContentKind::Kml
        } else if essence.eq_ignore_ascii_case(KMZ_MIME_TYPE) {
            ContentKind::Kmz
        } else {
            ContentKind::Image
        }
    }
}

/// A completed HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Build a 200 response carrying `body` with the given content type.
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Classify the payload; a missing header means raw image bytes.
    pub fn content_kind(&self) -> ContentKind {
        self.content_type()
            .map(ContentKind::from_content_type)
            .unwrap_or(ContentKind::Image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_kml_and_kmz() {
        assert_eq!(
            ContentKind::from_content_type("application/vnd.google-earth.kml+xml"),
            ContentKind::Kml
        );
        assert_eq!(
            ContentKind::from_content_type("application/vnd.google-earth.kmz"),
            ContentKind::Kmz
        );
    }

    #[test]
    fn test_classification_ignores_parameters_and_case() {
        assert_eq!(
            ContentKind::from_content_type("Application/VND.Google-Earth.KML+XML; charset=UTF-8"),
            ContentKind::Kml
        );
    }

    #[test]
    fn test_everything_else_is_image() {
        assert_eq!(ContentKind::from_content_type("image/png"), ContentKind::Image);
        assert_eq!(
            ContentKind::from_content_type("application/octet-stream"),
            ContentKind::Image
        );
        assert_eq!(ContentKind::from_content_type(""), ContentKind::Image);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = FetchResponse {
            status: 200,
            headers: vec![("content-type".to_string(), KMZ_MIME_TYPE.to_string())],
            body: vec![],
        };
        assert_eq!(response.header("Content-Type"), Some(KMZ_MIME_TYPE));
        assert_eq!(response.content_kind(), ContentKind::Kmz);
    }

    #[test]
    fn test_missing_content_type_is_image() {
        let response = FetchResponse {
            status: 200,
            headers: vec![],
            body: vec![1, 2, 3],
        };
        assert_eq!(response.content_kind(), ContentKind::Image);
    }

    #[test]
    fn test_is_success() {
        let mut response = FetchResponse::ok("image/png", vec![]);
        assert!(response.is_success());
        response.status = 404;
        assert!(!response.is_success());
    }
}
