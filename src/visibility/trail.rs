//! Bounded position history per platform

use std::collections::VecDeque;

use crate::types::Position;

/// Most recent positions, oldest first, capped at `capacity`
#[derive(Debug, Clone, PartialEq)]
pub struct TrailHistory {
    points: VecDeque<Position>,
    capacity: usize,
}

impl TrailHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest once full.
    /// A point equal to the newest one is not repeated.
    pub fn push(&mut self, position: Position) -> bool {
        if self.capacity == 0 || self.points.back() == Some(&position) {
            return false;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(position);
        true
    }

    pub fn latest(&self) -> Option<&Position> {
        self.points.back()
    }

    pub fn points(&self) -> Vec<Position> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_last_twenty() {
        let mut trail = TrailHistory::new(20);
        for i in 0..25 {
            trail.push(Position::new(f64::from(i), 0.0, 0.0));
        }
        let lats: Vec<f64> = trail.points().iter().map(|p| p.lat).collect();
        let expected: Vec<f64> = (5..25).map(f64::from).collect();
        assert_eq!(lats, expected);
    }

    #[test]
    fn test_repeated_point_not_stored() {
        let mut trail = TrailHistory::new(5);
        let here = Position::new(1.0, 1.0, 0.0);
        assert!(trail.push(here));
        assert!(!trail.push(here));
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.latest(), Some(&here));
    }
}
