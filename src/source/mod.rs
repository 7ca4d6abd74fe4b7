//! Snapshot source seam
//!
//! The physics that moves platforms lives outside this crate. The hub and the
//! control path only see it through [`SnapshotSource`].

mod memory;

pub use memory::InMemorySource;

use crate::error::SourceError;
use crate::types::{PlatformSnapshot, SimulationStatus, SnapshotBatch, Statistics};
use crate::utils::time::now_millis;

/// Read and control access to the simulation producing platform states
pub trait SnapshotSource: Send + Sync {
    fn is_running(&self) -> bool;

    /// Simulation clock in seconds
    fn current_time_seconds(&self) -> f64;

    fn all_entities(&self) -> Vec<PlatformSnapshot>;

    fn statistics(&self) -> Statistics;

    /// Simulation speed multiplier
    fn speed(&self) -> f64 {
        1.0
    }

    fn start(&self) -> Result<(), SourceError>;

    fn stop(&self) -> Result<(), SourceError>;

    fn reset(&self) -> Result<(), SourceError>;

    /// Take a full snapshot batch stamped with the current wall clock
    fn snapshot(&self) -> SnapshotBatch {
        SnapshotBatch::new(self.all_entities(), now_millis())
    }

    fn status(&self) -> SimulationStatus {
        SimulationStatus {
            running: self.is_running(),
            time: self.current_time_seconds(),
            platform_count: self.statistics().total,
            speed: self.speed(),
        }
    }
}
