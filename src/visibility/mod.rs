//! Spatial visibility for large platform sets
//!
//! Only platforms inside the (padded) viewport are attached to the map. Above a
//! visible-count threshold markers move into a clustering layer; a lower threshold
//! moves them back. Each platform keeps a short position trail.

pub mod cluster;
pub mod manager;
pub mod render;
pub mod sizing;
pub mod trail;
pub mod viewport;

pub use cluster::ClusterSwitch;
pub use manager::{RefreshReport, VisibilityManager, VisibilityStats};
pub use render::{HeadlessBackend, HeadlessMarker, Layer, RenderBackend};
pub use sizing::{category_multiplier, MarkerSizing};
pub use trail::TrailHistory;
pub use viewport::Viewport;
