//! Simulation run-state types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Category;

/// Run state reported to subscribers on every start/stop/reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    pub running: bool,
    /// Simulation clock in seconds
    pub time: f64,
    pub platform_count: usize,
    /// Simulation speed multiplier
    pub speed: f64,
}

/// Platform counts per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub total_by_category: BTreeMap<Category, usize>,
}

impl Statistics {
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut stats = Self::default();
        for category in categories {
            *stats.total_by_category.entry(category).or_insert(0) += 1;
            stats.total += 1;
        }
        stats
    }

    pub fn count(&self, category: Category) -> usize {
        self.total_by_category.get(&category).copied().unwrap_or(0)
    }
}
