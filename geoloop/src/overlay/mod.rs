//! Ground overlays: cache entries, key derivation, groups and KML output.
//!
//! An [`OverlayEntry`] is one image draped over a lat/lon box. Entries are
//! collected into an [`OverlayGroup`], which a viewer enables and disables
//! as a single layer and which may drive an animation loop over its frames.

mod entry;
mod group;
mod key;
pub mod kml;

pub use entry::{OverlayEntry, OverlayFormat, OverlayImage, SourceRef};
pub use group::{DrawImage, DrawItem, GroupError, OverlayGroup, PrewarmSummary};
pub use key::{sanitize_name, CacheKey, KEY_ROOT};
pub use kml::{document, escape, ground_overlay, HrefMode};
