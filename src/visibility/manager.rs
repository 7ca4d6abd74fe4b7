//! Viewport culling, clustering and trails for a large set of platforms

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::batcher::PlatformBatch;
use crate::config::VisibilityConfig;
use crate::types::{PlatformSnapshot, Position};

use super::cluster::ClusterSwitch;
use super::render::{Layer, RenderBackend};
use super::sizing::MarkerSizing;
use super::trail::TrailHistory;
use super::viewport::Viewport;

/// Entity count above which culling runs on the rayon pool
const PARALLEL_CULL_THRESHOLD: usize = 4096;

struct Tracked<H> {
    snapshot: PlatformSnapshot,
    trail: TrailHistory,
    handle: Option<H>,
    /// Layer the handle is attached to, if visible
    layer: Option<Layer>,
}

/// What one refresh changed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub entered: usize,
    pub left: usize,
    /// New clustering mode, when it flipped
    pub clustering_changed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityStats {
    pub total: usize,
    pub visible: usize,
    pub clustering: bool,
    pub zoom: f64,
}

/// Keeps only platforms inside the padded viewport attached to the map.
///
/// Until a viewport is set every platform counts as visible.
pub struct VisibilityManager<B: RenderBackend> {
    backend: B,
    entities: HashMap<String, Tracked<B::Handle>>,
    visible: HashSet<String>,
    viewport: Option<Viewport>,
    zoom: f64,
    padding: f64,
    trails_enabled: bool,
    trail_capacity: usize,
    clustering: ClusterSwitch,
    sizing: MarkerSizing,
}

impl<B: RenderBackend> VisibilityManager<B> {
    pub fn new(config: &VisibilityConfig, backend: B) -> Self {
        Self {
            backend,
            entities: HashMap::new(),
            visible: HashSet::new(),
            viewport: None,
            zoom: config.reference_zoom,
            padding: config.padding_fraction,
            trails_enabled: config.trails_enabled,
            trail_capacity: config.trail_max_points,
            clustering: ClusterSwitch::new(config.cluster_upper, config.cluster_lower),
            sizing: MarkerSizing::from_config(config),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visible.contains(id)
    }

    pub fn visible_ids(&self) -> &HashSet<String> {
        &self.visible
    }

    pub fn trail(&self, id: &str) -> Option<Vec<Position>> {
        self.entities.get(id).map(|tracked| tracked.trail.points())
    }

    pub fn snapshot(&self, id: &str) -> Option<&PlatformSnapshot> {
        self.entities.get(id).map(|tracked| &tracked.snapshot)
    }

    pub fn clustering_enabled(&self) -> bool {
        self.clustering.enabled()
    }

    pub fn stats(&self) -> VisibilityStats {
        VisibilityStats {
            total: self.entities.len(),
            visible: self.visible.len(),
            clustering: self.clustering.enabled(),
            zoom: self.zoom,
        }
    }

    /// Apply a batch of updates, then refresh visibility
    pub fn update_entities(&mut self, batch: &[PlatformSnapshot]) -> RefreshReport {
        for platform in batch {
            self.upsert(platform);
        }
        self.refresh()
    }

    /// Apply a complete snapshot: platforms missing from it are removed
    pub fn apply_snapshot(&mut self, batch: &[PlatformSnapshot]) -> RefreshReport {
        let present: HashSet<&str> = batch.iter().map(|p| p.id.as_str()).collect();
        let gone: Vec<String> = self
            .entities
            .keys()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &gone {
            self.remove(id);
        }
        self.update_entities(batch)
    }

    /// Apply one flushed batch: full batches prune, partial ones only upsert
    pub fn apply_batch(&mut self, batch: &PlatformBatch) -> RefreshReport {
        if batch.is_full() {
            self.apply_snapshot(batch)
        } else {
            self.update_entities(batch)
        }
    }

    /// Forget a platform and destroy its marker
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(tracked) = self.entities.remove(id) else {
            return false;
        };
        self.visible.remove(id);
        if let Some(handle) = tracked.handle {
            if let Some(layer) = tracked.layer {
                self.backend.detach(&handle, layer);
            }
            self.backend.destroy(handle);
        }
        true
    }

    /// Change the visible bounds. A zoom change resizes every marker.
    pub fn set_viewport(&mut self, viewport: Viewport, zoom: f64) -> RefreshReport {
        if zoom != self.zoom {
            self.zoom = zoom;
            for tracked in self.entities.values() {
                if let Some(handle) = &tracked.handle {
                    let size = self.sizing.size(tracked.snapshot.category, zoom);
                    self.backend.resize(handle, size);
                }
            }
        }
        self.viewport = Some(viewport);
        self.refresh()
    }

    /// Recompute the visible set and reconcile the map with it
    pub fn refresh(&mut self) -> RefreshReport {
        let next = self.cull();
        let left: Vec<String> = self.visible.difference(&next).cloned().collect();
        let entered: Vec<String> = next.difference(&self.visible).cloned().collect();

        for id in &left {
            self.detach(id);
        }
        let layer = self.active_layer();
        for id in &entered {
            self.attach(id, layer);
        }
        self.visible = next;

        let clustering_changed = self.clustering.update(self.visible.len());
        if let Some(enabled) = clustering_changed {
            info!(
                "Clustering {} at {} visible platforms",
                if enabled { "enabled" } else { "disabled" },
                self.visible.len()
            );
            let (from, to) = if enabled {
                (Layer::Markers, Layer::Clusters)
            } else {
                (Layer::Clusters, Layer::Markers)
            };
            self.move_layer(from, to);
        }

        if !entered.is_empty() || !left.is_empty() {
            debug!(
                "Visibility: +{} -{} ({} of {})",
                entered.len(),
                left.len(),
                self.visible.len(),
                self.entities.len()
            );
        }
        RefreshReport {
            entered: entered.len(),
            left: left.len(),
            clustering_changed,
        }
    }

    fn cull(&self) -> HashSet<String> {
        let bounds = self.viewport.map(|v| v.padded(self.padding));
        let inside = |tracked: &Tracked<B::Handle>| {
            bounds.map_or(true, |b| b.contains(&tracked.snapshot.position))
        };

        if self.entities.len() > PARALLEL_CULL_THRESHOLD {
            self.entities
                .par_iter()
                .filter(|&(_, tracked)| inside(tracked))
                .map(|(id, _)| id.clone())
                .collect()
        } else {
            self.entities
                .iter()
                .filter(|&(_, tracked)| inside(tracked))
                .map(|(id, _)| id.clone())
                .collect()
        }
    }

    fn upsert(&mut self, platform: &PlatformSnapshot) {
        let capacity = self.trail_capacity;
        let tracked = self
            .entities
            .entry(platform.id.clone())
            .or_insert_with(|| Tracked {
                snapshot: platform.clone(),
                trail: TrailHistory::new(capacity),
                handle: None,
                layer: None,
            });
        tracked.snapshot = platform.clone();
        let moved = tracked.trail.push(platform.position);

        if let (Some(handle), Some(_)) = (&tracked.handle, tracked.layer) {
            self.backend.update(handle, platform);
            if moved && self.trails_enabled {
                self.backend.draw_trail(handle, &tracked.trail.points());
            }
        }
    }

    fn attach(&mut self, id: &str, layer: Layer) {
        let Some(tracked) = self.entities.get_mut(id) else {
            return;
        };
        if tracked.handle.is_none() {
            let size = self.sizing.size(tracked.snapshot.category, self.zoom);
            tracked.handle = Some(self.backend.create(&tracked.snapshot, size));
        }
        let Some(handle) = &tracked.handle else {
            return;
        };
        self.backend.attach(handle, layer);
        self.backend.update(handle, &tracked.snapshot);
        if self.trails_enabled {
            self.backend.draw_trail(handle, &tracked.trail.points());
        }
        tracked.layer = Some(layer);
    }

    fn detach(&mut self, id: &str) {
        let Some(tracked) = self.entities.get_mut(id) else {
            return;
        };
        if let (Some(handle), Some(layer)) = (&tracked.handle, tracked.layer.take()) {
            self.backend.detach(handle, layer);
        }
    }

    fn move_layer(&mut self, from: Layer, to: Layer) {
        for tracked in self.entities.values_mut() {
            if tracked.layer != Some(from) {
                continue;
            }
            if let Some(handle) = &tracked.handle {
                self.backend.detach(handle, from);
                self.backend.attach(handle, to);
                tracked.layer = Some(to);
            }
        }
    }

    fn active_layer(&self) -> Layer {
        if self.clustering.enabled() {
            Layer::Clusters
        } else {
            Layer::Markers
        }
    }
}
