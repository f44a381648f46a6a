//! KML ground-overlay serialization.
//!
//! Produces the `<GroundOverlay>` fragment used when a cached overlay is
//! written back out. Output only; nothing here parses KML.

use super::entry::{OverlayEntry, SourceRef};

/// How the `<Icon><href>` of a fragment is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HrefMode {
    /// The entry's current source: a URL or an absolute file path
    #[default]
    Absolute,
    /// The cache key, relative to the cache directory
    Relative,
}

/// Serialize one entry as a `<GroundOverlay>` element.
pub fn ground_overlay(entry: &OverlayEntry, mode: HrefMode) -> String {
    let href = match mode {
        HrefMode::Absolute => match entry.source() {
            SourceRef::Remote(url) => url,
            SourceRef::Local(path) => path.to_string_lossy().into_owned(),
        },
        HrefMode::Relative => encode_path(entry.cache_key().as_str()),
    };
    let sector = entry.sector();

    format!(
        r#"<GroundOverlay>
  <name>{}</name>
  <description>{}</description>
  <Icon>
    <href>{}</href>
  </Icon>
  <LatLonBox>
    <north>{}</north>
    <south>{}</south>
    <east>{}</east>
    <west>{}</west>
  </LatLonBox>
</GroundOverlay>"#,
        escape(entry.name()),
        escape(entry.description()),
        escape(&href),
        sector.north,
        sector.south,
        sector.east,
        sector.west,
    )
}

/// Wrap the fragments of several entries in a KML `<Document>`.
pub fn document<'a>(
    name: &str,
    entries: impl IntoIterator<Item = &'a OverlayEntry>,
    mode: HrefMode,
) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n");
    out.push_str("<Document>\n");
    out.push_str(&format!("<name>{}</name>\n", escape(name)));
    for entry in entries {
        out.push_str(&ground_overlay(entry, mode));
        out.push('\n');
    }
    out.push_str("</Document>\n</kml>\n");
    out
}

/// Percent-encode a relative path, leaving `/` and unreserved characters.
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Escape XML text content.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
