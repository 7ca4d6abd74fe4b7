//! Marker sizing by zoom and category

use crate::config::VisibilityConfig;
use crate::types::Category;

pub const MIN_MARKER_SIZE: f64 = 3.0;
pub const MAX_MARKER_SIZE: f64 = 20.0;

pub fn category_multiplier(category: Category) -> f64 {
    match category {
        Category::Space => 0.7,
        Category::Airborne => 1.0,
        Category::Land => 0.9,
        Category::Maritime => 1.2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerSizing {
    base: f64,
    scale_with_zoom: bool,
    reference_zoom: f64,
}

impl MarkerSizing {
    pub fn from_config(config: &VisibilityConfig) -> Self {
        Self {
            base: config.base_marker_size,
            scale_with_zoom: config.scale_with_zoom,
            reference_zoom: config.reference_zoom,
        }
    }

    /// `clamp(base * zoom / reference_zoom, 3, 20) * category multiplier`
    pub fn size(&self, category: Category, zoom: f64) -> f64 {
        let scaled = if self.scale_with_zoom && self.reference_zoom > 0.0 {
            self.base * zoom / self.reference_zoom
        } else {
            self.base
        };
        scaled.clamp(MIN_MARKER_SIZE, MAX_MARKER_SIZE) * category_multiplier(category)
    }
}
