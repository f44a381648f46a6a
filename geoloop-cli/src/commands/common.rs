//! Common types and utilities shared across CLI commands.

use clap::Args;
use geoloop::cache::TileCache;
use geoloop::coord::Sector;
use geoloop::overlay::{OverlayEntry, OverlayGroup, SourceRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CliError;

/// Overlay sources shared by the group-building commands.
#[derive(Debug, Args)]
pub struct LayerArgs {
    /// Layer group the overlays belong to
    #[arg(long, default_value = "Overlays")]
    pub group: String,

    /// Overlay bounds as south,north,west,east in decimal degrees
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: Sector,

    /// Overlay image URL or local file; repeat once per frame, in loop order
    #[arg(long = "frame", required = true)]
    pub frames: Vec<String>,
}

/// Parse `south,north,west,east` into a sector.
pub fn parse_bounds(value: &str) -> Result<Sector, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid bounds '{}': {}", value, e))?;

    let &[south, north, west, east] = parts.as_slice() else {
        return Err(format!(
            "expected south,north,west,east but got {} values",
            parts.len()
        ));
    };

    if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
        return Err("latitudes must be within -90..90".to_string());
    }
    if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
        return Err("longitudes must be within -180..180".to_string());
    }
    if south >= north {
        return Err(format!("south ({}) must be below north ({})", south, north));
    }

    Ok(Sector::new(south, north, west, east))
}

/// Interpret a command-line source as a URL or a local path.
pub fn source_ref(value: &str) -> SourceRef {
    if value.starts_with("http://") || value.starts_with("https://") {
        SourceRef::Remote(value.to_string())
    } else {
        SourceRef::Local(PathBuf::from(value))
    }
}

/// Overlay name for a source: its file stem, or `frame<index>`.
pub fn overlay_name(source: &SourceRef, index: usize) -> String {
    let stem = match source {
        SourceRef::Remote(url) => {
            let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
            let file = path.rsplit('/').next().unwrap_or_default();
            Path::new(file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        }
        SourceRef::Local(path) => path.file_stem().map(|s| s.to_string_lossy().into_owned()),
    };

    stem.filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("frame{}", index))
}

/// Name of the frame at `index` in a loop.
///
/// The zero-padded position keeps names unique when sources share a stem,
/// as WMS requests differing only in `time=` do, and sorts in loop order.
pub fn frame_name(source: &SourceRef, index: usize) -> String {
    format!("{:03}_{}", index, overlay_name(source, index))
}

/// Build entries for every `--frame` source under the group's prefix.
pub fn layer_entries(group: &OverlayGroup, layer: &LayerArgs) -> Vec<Arc<OverlayEntry>> {
    layer
        .frames
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let source = source_ref(value);
            let name = frame_name(&source, index);
            Arc::new(group.entry(name, layer.bounds, source))
        })
        .collect()
}

/// Build a static group holding every `--frame` source.
pub fn static_group(cache: Arc<TileCache>, layer: &LayerArgs) -> Result<OverlayGroup, CliError> {
    let group = OverlayGroup::new(&layer.group, cache);
    for entry in layer_entries(&group, layer) {
        group.add_static(entry)?;
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoloop::cache::CacheConfig;
    use geoloop::fetch::ReqwestFetcher;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn layer(frames: &[&str]) -> LayerArgs {
        LayerArgs {
            group: "Radar".to_string(),
            bounds: Sector::new(20.0, 50.0, -125.0, -65.0),
            frames: frames.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_bounds() {
        let sector = parse_bounds("20,50,-125,-65").unwrap();
        assert_eq!(sector, Sector::new(20.0, 50.0, -125.0, -65.0));
    }

    #[test]
    fn test_parse_bounds_rejects_bad_input() {
        assert!(parse_bounds("20,50,-125").is_err());
        assert!(parse_bounds("50,20,-125,-65").is_err());
        assert!(parse_bounds("20,95,-125,-65").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
    }

    #[test]
    fn test_source_ref_detects_urls() {
        assert!(source_ref("https://radar.example.com/n0r.png").is_remote());
        assert!(!source_ref("/data/n0r.png").is_remote());
    }

    #[test]
    fn test_overlay_name_uses_file_stem() {
        let remote = source_ref("http://radar.example.com/loop/n0r_0.png?t=1");
        assert_eq!(overlay_name(&remote, 3), "n0r_0");

        let local = source_ref("/data/legend.gif");
        assert_eq!(overlay_name(&local, 0), "legend");
    }

    #[test]
    fn test_overlay_name_falls_back_to_index() {
        let remote = source_ref("http://radar.example.com/");
        assert_eq!(overlay_name(&remote, 2), "frame2");
    }

    #[test]
    fn test_frame_name_prefixes_loop_position() {
        let remote = source_ref("http://radar.example.com/loop/n0r.png");
        assert_eq!(frame_name(&remote, 0), "000_n0r");
        assert_eq!(frame_name(&remote, 12), "012_n0r");
    }

    #[test]
    fn test_layer_entries_keep_same_stem_frames_apart() {
        let temp = TempDir::new().unwrap();
        let cache = Arc::new(
            TileCache::new(
                CacheConfig::new(temp.path()),
                Arc::new(ReqwestFetcher::new().unwrap()),
            )
            .unwrap(),
        );
        let group = OverlayGroup::new("Radar", cache);
        let layer = layer(&[
            "http://wms.example.com/wms?layers=nexrad&time=2024-05-01T00:00Z",
            "http://wms.example.com/wms?layers=nexrad&time=2024-05-01T00:10Z",
            "/data/day1/radar.png",
            "/data/day2/radar.png",
        ]);

        let entries = layer_entries(&group, &layer);
        let keys: HashSet<&str> = entries.iter().map(|e| e.cache_key().as_str()).collect();

        assert_eq!(keys.len(), 4);
        assert_eq!(entries[0].name(), "000_wms");
        assert_eq!(entries[3].name(), "003_radar");
    }
}
