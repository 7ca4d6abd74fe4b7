//! Platform snapshot types shared by the hub, the wire protocol and the client

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad domain a platform operates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Airborne,
    Maritime,
    Land,
    Space,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Airborne,
        Category::Maritime,
        Category::Land,
        Category::Space,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Airborne => "airborne",
            Category::Maritime => "maritime",
            Category::Land => "land",
            Category::Space => "space",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geodetic position in degrees and metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64, alt: f64) -> Self {
        Self { lat, lon, alt }
    }

    /// Latitude within [-90, 90] and longitude within [-180, 180]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Velocity in a local north/east/up frame (m/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub north: f64,
    pub east: f64,
    pub up: f64,
}

/// Complete state of one tracked platform at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSnapshot {
    pub id: String,
    pub category: Category,
    pub position: Position,
    #[serde(default)]
    pub velocity: Velocity,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub heading: f64,
    /// Unix milliseconds of the last state change
    #[serde(default)]
    pub last_updated: i64,
}

impl PlatformSnapshot {
    /// Create a stationary platform at the given position
    pub fn new(id: impl Into<String>, category: Category, position: Position) -> Self {
        Self {
            id: id.into(),
            category,
            position,
            velocity: Velocity::default(),
            speed: 0.0,
            heading: 0.0,
            last_updated: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.speed = velocity.north.hypot(velocity.east);
        self.heading = heading_degrees(&velocity);
        self.velocity = velocity;
        self
    }
}

/// Compass heading in [0, 360) for a horizontal velocity
pub fn heading_degrees(velocity: &Velocity) -> f64 {
    let deg = velocity.east.atan2(velocity.north).to_degrees();
    if deg < 0.0 {
        deg + 360.0
    } else {
        deg
    }
}

/// Every platform known at one tick
///
/// A batch replaces whatever the receiver held before; platforms missing from a
/// batch are gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBatch {
    pub platforms: Vec<PlatformSnapshot>,
    /// Unix milliseconds when the batch was taken
    pub timestamp: i64,
}

impl SnapshotBatch {
    pub fn new(platforms: Vec<PlatformSnapshot>, timestamp: i64) -> Self {
        Self {
            platforms,
            timestamp,
        }
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}
