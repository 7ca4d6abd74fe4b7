//! Clustering toggle with hysteresis

/// Switches clustering on above `upper` visible entities and off below `lower`.
///
/// Counts between the two thresholds keep the current mode, so a count hovering
/// around one threshold does not flap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterSwitch {
    upper: usize,
    lower: usize,
    enabled: bool,
}

impl ClusterSwitch {
    pub fn new(upper: usize, lower: usize) -> Self {
        Self {
            upper,
            lower,
            enabled: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Feed the current visible count. Returns the new mode when it changed.
    pub fn update(&mut self, visible: usize) -> Option<bool> {
        let next = if !self.enabled && visible > self.upper {
            true
        } else if self.enabled && visible < self.lower {
            false
        } else {
            return None;
        };
        self.enabled = next;
        Some(next)
    }
}

impl Default for ClusterSwitch {
    fn default() -> Self {
        Self::new(1000, 500)
    }
}
