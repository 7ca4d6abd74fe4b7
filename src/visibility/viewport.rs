//! Geographic viewport bounds

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// Visible map bounds in degrees.
///
/// `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Viewport {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// The whole globe
    pub fn world() -> Self {
        Self::new(-90.0, -180.0, 90.0, 180.0)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    pub fn lon_span(&self) -> f64 {
        if self.crosses_antimeridian() {
            360.0 - (self.west - self.east)
        } else {
            self.east - self.west
        }
    }

    /// Grow by `fraction` of the span on every side
    pub fn padded(&self, fraction: f64) -> Viewport {
        let dlat = self.lat_span() * fraction;
        let dlon = self.lon_span() * fraction;
        let north = (self.north + dlat).min(90.0);
        let south = (self.south - dlat).max(-90.0);

        if self.lon_span() + 2.0 * dlon >= 360.0 {
            return Viewport::new(south, -180.0, north, 180.0);
        }
        Viewport::new(
            south,
            wrap_longitude(self.west - dlon),
            north,
            wrap_longitude(self.east + dlon),
        )
    }

    pub fn contains(&self, position: &Position) -> bool {
        if position.lat < self.south || position.lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            position.lon >= self.west || position.lon <= self.east
        } else {
            position.lon >= self.west && position.lon <= self.east
        }
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(lat: f64, lon: f64) -> Position {
        Position::new(lat, lon, 0.0)
    }

    #[test]
    fn test_contains() {
        let view = Viewport::new(40.0, -10.0, 50.0, 10.0);
        assert!(view.contains(&at(45.0, 0.0)));
        assert!(view.contains(&at(50.0, 10.0)));
        assert!(!view.contains(&at(51.0, 0.0)));
        assert!(!view.contains(&at(45.0, 11.0)));
    }

    #[test]
    fn test_padding_adds_ten_percent_per_side() {
        let padded = Viewport::new(40.0, -10.0, 50.0, 10.0).padded(0.1);
        assert!((padded.north - 51.0).abs() < 1e-9);
        assert!((padded.south - 39.0).abs() < 1e-9);
        assert!((padded.east - 12.0).abs() < 1e-9);
        assert!((padded.west + 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_padding_clamps_latitude() {
        let padded = Viewport::new(80.0, 0.0, 89.0, 10.0).padded(0.5);
        assert_eq!(padded.north, 90.0);
    }

    #[test]
    fn test_antimeridian() {
        let view = Viewport::new(-10.0, 170.0, 10.0, -170.0);
        assert!(view.crosses_antimeridian());
        assert_eq!(view.lon_span(), 20.0);
        assert!(view.contains(&at(0.0, 175.0)));
        assert!(view.contains(&at(0.0, -175.0)));
        assert!(!view.contains(&at(0.0, 0.0)));
    }

    #[test]
    fn test_padding_across_antimeridian() {
        let padded = Viewport::new(-10.0, 150.0, 10.0, 178.0).padded(0.1);
        assert!(padded.crosses_antimeridian());
        assert!(padded.contains(&at(0.0, -179.5)));
    }

    #[test]
    fn test_padding_to_whole_globe() {
        let padded = Viewport::new(-10.0, -170.0, 10.0, 170.0).padded(0.1);
        assert_eq!((padded.west, padded.east), (-180.0, 180.0));
        assert!(Viewport::world().contains(&at(0.0, 180.0)));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::json!({"north": 1.0, "south": -1.0, "east": 2.0, "west": -2.0});
        let view: Viewport = serde_json::from_value(json).unwrap();
        assert_eq!(view, Viewport::new(-1.0, -2.0, 1.0, 2.0));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_padding_never_loses_points(
                south in -90.0..80.0_f64,
                height in 0.1..10.0_f64,
                west in -180.0..180.0_f64,
                width in 0.1..300.0_f64,
                lat_t in 0.0..=1.0_f64,
                lon_t in 0.0..=1.0_f64,
                fraction in 0.0..0.5_f64
            ) {
                let north = (south + height).min(90.0);
                let east = if west + width > 180.0 { west + width - 360.0 } else { west + width };
                let view = Viewport::new(south, west, north, east);

                let lat = (south + (north - south) * lat_t).min(north);
                let mut lon = west + width * lon_t;
                if lon > 180.0 {
                    lon -= 360.0;
                }
                let point = Position::new(lat, lon, 0.0);

                prop_assert!(view.contains(&point));
                prop_assert!(view.padded(fraction).contains(&point));
            }
        }
    }
}
