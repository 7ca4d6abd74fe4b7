//! Rendering seam for the visibility manager

use std::collections::HashMap;

use crate::types::{PlatformSnapshot, Position};

/// Where an attached marker is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Individual markers
    Markers,
    /// Marker clustering group
    Clusters,
}

/// Map surface the visibility manager draws on.
///
/// A handle is created once per platform and survives detach/attach cycles.
pub trait RenderBackend {
    type Handle: Send + Sync;

    fn create(&mut self, platform: &PlatformSnapshot, size: f64) -> Self::Handle;
    fn attach(&mut self, handle: &Self::Handle, layer: Layer);
    fn detach(&mut self, handle: &Self::Handle, layer: Layer);
    fn update(&mut self, handle: &Self::Handle, platform: &PlatformSnapshot);
    fn resize(&mut self, handle: &Self::Handle, size: f64);
    fn draw_trail(&mut self, handle: &Self::Handle, trail: &[Position]);
    fn destroy(&mut self, handle: Self::Handle);
}

/// Marker state kept by [`HeadlessBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMarker {
    pub id: String,
    pub position: Position,
    pub size: f64,
    pub layer: Option<Layer>,
    pub trail_points: usize,
}

/// In-memory backend for tests and the command-line client
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    markers: HashMap<u64, HeadlessMarker>,
    pub created: u64,
    pub destroyed: u64,
    pub trail_draws: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, handle: u64) -> Option<&HeadlessMarker> {
        self.markers.get(&handle)
    }

    pub fn find(&self, id: &str) -> Option<&HeadlessMarker> {
        self.markers.values().find(|m| m.id == id)
    }

    /// Markers currently attached to `layer`
    pub fn attached(&self, layer: Layer) -> usize {
        self.markers
            .values()
            .filter(|m| m.layer == Some(layer))
            .count()
    }

    pub fn live(&self) -> usize {
        self.markers.len()
    }
}

impl RenderBackend for HeadlessBackend {
    type Handle = u64;

    fn create(&mut self, platform: &PlatformSnapshot, size: f64) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.created += 1;
        self.markers.insert(
            handle,
            HeadlessMarker {
                id: platform.id.clone(),
                position: platform.position,
                size,
                layer: None,
                trail_points: 0,
            },
        );
        handle
    }

    fn attach(&mut self, handle: &u64, layer: Layer) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.layer = Some(layer);
        }
    }

    fn detach(&mut self, handle: &u64, layer: Layer) {
        if let Some(marker) = self.markers.get_mut(handle) {
            if marker.layer == Some(layer) {
                marker.layer = None;
            }
        }
    }

    fn update(&mut self, handle: &u64, platform: &PlatformSnapshot) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.position = platform.position;
        }
    }

    fn resize(&mut self, handle: &u64, size: f64) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.size = size;
        }
    }

    fn draw_trail(&mut self, handle: &u64, trail: &[Position]) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.trail_points = trail.len();
            self.trail_draws += 1;
        }
    }

    fn destroy(&mut self, handle: u64) {
        if self.markers.remove(&handle).is_some() {
            self.destroyed += 1;
        }
    }
}
