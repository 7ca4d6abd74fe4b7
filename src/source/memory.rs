//! In-process snapshot source with simple dead reckoning

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::debug;

use super::SnapshotSource;
use crate::error::SourceError;
use crate::types::{Category, PlatformSnapshot, Position, Statistics, Velocity};
use crate::utils::time::now_millis;

/// Metres per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

struct Inner {
    running: bool,
    time: f64,
    speed: f64,
    platforms: BTreeMap<String, PlatformSnapshot>,
    initial: BTreeMap<String, PlatformSnapshot>,
}

/// Thread-safe in-memory platform store
///
/// `advance` integrates velocities linearly; it exists to drive demos and tests,
/// not to model real trajectories.
pub struct InMemorySource {
    inner: RwLock<Inner>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                running: false,
                time: 0.0,
                speed: 1.0,
                platforms: BTreeMap::new(),
                initial: BTreeMap::new(),
            }),
        }
    }

    /// Seed `count` platforms spread over the globe on a golden-angle spiral
    pub fn with_demo_platforms(count: usize) -> Self {
        let source = Self::new();
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        let platforms = (0..count).map(|i| {
            let category = Category::ALL[i % Category::ALL.len()];
            let t = (i as f64 + 0.5) / count.max(1) as f64;
            let lat = (1.0 - 2.0 * t).asin().to_degrees();
            let lon = ((golden * i as f64).to_degrees() % 360.0) - 180.0;
            let (alt, speed) = match category {
                Category::Airborne => (9_000.0, 230.0),
                Category::Maritime => (0.0, 10.0),
                Category::Land => (0.0, 15.0),
                Category::Space => (400_000.0, 7_600.0),
            };
            let angle = golden * i as f64;
            let velocity = Velocity {
                north: speed * angle.cos(),
                east: speed * angle.sin(),
                up: 0.0,
            };
            PlatformSnapshot::new(
                format!("{}-{:05}", category.as_str().to_uppercase(), i),
                category,
                Position::new(lat, lon, alt),
            )
            .with_velocity(velocity)
        });
        source.upsert_all(platforms);
        source.mark_initial();
        source
    }

    /// Record the current platform set as the state `reset` returns to
    pub fn mark_initial(&self) {
        let mut inner = self.inner.write();
        inner.initial = inner.platforms.clone();
    }

    pub fn upsert(&self, platform: PlatformSnapshot) {
        self.inner
            .write()
            .platforms
            .insert(platform.id.clone(), platform);
    }

    pub fn upsert_all(&self, platforms: impl IntoIterator<Item = PlatformSnapshot>) {
        let mut inner = self.inner.write();
        for platform in platforms {
            inner.platforms.insert(platform.id.clone(), platform);
        }
    }

    pub fn remove(&self, id: &str) -> Option<PlatformSnapshot> {
        self.inner.write().platforms.remove(id)
    }

    pub fn set_speed(&self, speed: f64) {
        self.inner.write().speed = speed.max(0.0);
    }

    /// Move every platform by `dt_secs` of wall time (scaled by speed) while running
    pub fn advance(&self, dt_secs: f64) {
        let mut inner = self.inner.write();
        if !inner.running {
            return;
        }
        let dt = dt_secs * inner.speed;
        inner.time += dt;
        let stamp = now_millis();
        for platform in inner.platforms.values_mut() {
            let v = platform.velocity;
            let pos = &mut platform.position;
            pos.lat += v.north * dt / METERS_PER_DEGREE;
            let cos_lat = pos.lat.to_radians().cos().abs().max(0.01);
            pos.lon += v.east * dt / (METERS_PER_DEGREE * cos_lat);
            pos.alt = (pos.alt + v.up * dt).max(0.0);
            wrap_position(pos);
            platform.last_updated = stamp;
        }
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a position back into valid lat/lon ranges
fn wrap_position(pos: &mut Position) {
    if pos.lat > 90.0 {
        pos.lat = 180.0 - pos.lat;
        pos.lon += 180.0;
    } else if pos.lat < -90.0 {
        pos.lat = -180.0 - pos.lat;
        pos.lon += 180.0;
    }
    pos.lon = (pos.lon + 180.0).rem_euclid(360.0) - 180.0;
}

impl SnapshotSource for InMemorySource {
    fn is_running(&self) -> bool {
        self.inner.read().running
    }

    fn current_time_seconds(&self) -> f64 {
        self.inner.read().time
    }

    fn all_entities(&self) -> Vec<PlatformSnapshot> {
        self.inner.read().platforms.values().cloned().collect()
    }

    fn statistics(&self) -> Statistics {
        Statistics::from_categories(self.inner.read().platforms.values().map(|p| p.category))
    }

    fn speed(&self) -> f64 {
        self.inner.read().speed
    }

    fn start(&self) -> Result<(), SourceError> {
        let mut inner = self.inner.write();
        if inner.running {
            return Err(SourceError::AlreadyRunning);
        }
        inner.running = true;
        debug!("Simulation started at t={:.1}s", inner.time);
        Ok(())
    }

    fn stop(&self) -> Result<(), SourceError> {
        let mut inner = self.inner.write();
        if !inner.running {
            return Err(SourceError::NotRunning);
        }
        inner.running = false;
        debug!("Simulation stopped at t={:.1}s", inner.time);
        Ok(())
    }

    fn reset(&self) -> Result<(), SourceError> {
        let mut inner = self.inner.write();
        inner.running = false;
        inner.time = 0.0;
        inner.platforms = inner.initial.clone();
        debug!("Simulation reset to {} platforms", inner.platforms.len());
        Ok(())
    }
}
