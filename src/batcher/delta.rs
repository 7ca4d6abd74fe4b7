//! Delta reconstruction against last-known platform state

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::FeedError;
use crate::types::PlatformSnapshot;

/// Field that marks a record as a partial update
pub const DELTA_FLAG: &str = "delta";

/// Whether a wire record carries the delta tag
pub fn is_delta(record: &Value) -> bool {
    record
        .get(DELTA_FLAG)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Recursively merge `patch` into `target`.
///
/// Objects merge key by key; any other value replaces what was there.
pub fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                match existing.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Last known full record per platform id
#[derive(Debug, Default)]
pub struct DeltaTracker {
    last_known: HashMap<String, Value>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turn one wire record into a full snapshot.
    ///
    /// Delta-tagged records are merged into the last known state for their id; a
    /// delta for an unseen id is taken as-is. The merged record becomes the new
    /// last known state even when it does not decode.
    pub fn reconstruct(&mut self, mut record: Value) -> Result<PlatformSnapshot, FeedError> {
        let fields = record
            .as_object_mut()
            .ok_or_else(|| FeedError::protocol("platform record is not an object"))?;
        let is_delta = fields
            .remove(DELTA_FLAG)
            .and_then(|flag| flag.as_bool())
            .unwrap_or(false);
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| FeedError::protocol("platform record without id"))?
            .to_string();

        let full = match self.last_known.remove(&id) {
            Some(mut prior) if is_delta => {
                merge(&mut prior, record);
                prior
            }
            _ => record,
        };
        self.last_known.insert(id.clone(), full.clone());

        serde_json::from_value(full)
            .map_err(|e| FeedError::protocol(format!("platform {}: {}", id, e)))
    }

    /// Remember a typed snapshot as the last known state
    pub fn record(&mut self, snapshot: &PlatformSnapshot) -> Result<(), FeedError> {
        let value = serde_json::to_value(snapshot)?;
        self.last_known.insert(snapshot.id.clone(), value);
        Ok(())
    }

    pub fn forget(&mut self, id: &str) -> bool {
        self.last_known.remove(id).is_some()
    }

    /// Keep only the given ids. Returns how many were dropped.
    pub fn retain(&mut self, ids: &HashSet<String>) -> usize {
        let before = self.last_known.len();
        self.last_known.retain(|id, _| ids.contains(id));
        before - self.last_known.len()
    }

    pub fn clear(&mut self) {
        self.last_known.clear();
    }

    pub fn len(&self) -> usize {
        self.last_known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use serde_json::json;

    fn full_record() -> Value {
        json!({
            "id": "x",
            "category": "airborne",
            "position": {"lat": 1.0, "lon": 2.0, "alt": 3.0},
            "speed": 5.0
        })
    }

    #[test]
    fn test_delta_merges_nested_fields() {
        let mut tracker = DeltaTracker::new();
        tracker.reconstruct(full_record()).unwrap();

        let merged = tracker
            .reconstruct(json!({"id": "x", "delta": true, "position": {"lat": 1.5}}))
            .unwrap();

        assert_eq!(merged.position.lat, 1.5);
        assert_eq!(merged.position.lon, 2.0);
        assert_eq!(merged.position.alt, 3.0);
        assert_eq!(merged.speed, 5.0);
        assert_eq!(merged.category, Category::Airborne);
    }

    #[test]
    fn test_delta_over_documented_base() {
        let mut tracker = DeltaTracker::new();
        tracker
            .reconstruct(json!({
                "id": "x",
                "category": "airborne",
                "position": {"lat": 1, "lon": 2},
                "speed": 10
            }))
            .unwrap();

        let merged = tracker
            .reconstruct(json!({"id": "x", "delta": true, "position": {"lat": 1.5}, "speed": 12}))
            .unwrap();

        assert_eq!(merged.position.lat, 1.5);
        assert_eq!(merged.position.lon, 2.0);
        assert_eq!(merged.speed, 12.0);
        assert_eq!(merged.category, Category::Airborne);

        let mut base = json!({"id": "x", "position": {"lat": 1, "lon": 2}, "speed": 10});
        merge(&mut base, json!({"position": {"lat": 1.5}, "speed": 12}));
        assert_eq!(
            base,
            json!({"id": "x", "position": {"lat": 1.5, "lon": 2}, "speed": 12})
        );
    }

    #[test]
    fn test_retain_drops_absent_ids() {
        let mut tracker = DeltaTracker::new();
        tracker.reconstruct(full_record()).unwrap();
        let mut other = full_record();
        other["id"] = json!("z");
        tracker.reconstruct(other).unwrap();

        let keep: HashSet<String> = ["z".to_string()].into_iter().collect();
        assert_eq!(tracker.retain(&keep), 1);
        assert_eq!(tracker.len(), 1);
        assert!(!tracker.forget("x"));
        assert!(!is_delta(&full_record()));
        assert!(is_delta(&json!({"id": "x", "delta": true})));
    }

    #[test]
    fn test_delta_without_prior_is_taken_as_is() {
        let mut tracker = DeltaTracker::new();
        let mut record = full_record();
        record["delta"] = json!(true);

        let snapshot = tracker.reconstruct(record).unwrap();
        assert_eq!(snapshot.position.lat, 1.0);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_full_record_replaces_prior() {
        let mut tracker = DeltaTracker::new();
        tracker.reconstruct(full_record()).unwrap();

        let replacement = json!({
            "id": "x",
            "category": "maritime",
            "position": {"lat": 9.0, "lon": 9.0}
        });
        let snapshot = tracker.reconstruct(replacement).unwrap();
        assert_eq!(snapshot.category, Category::Maritime);
        assert_eq!(snapshot.speed, 0.0);
    }

    #[test]
    fn test_incomplete_delta_is_rejected_but_remembered() {
        let mut tracker = DeltaTracker::new();
        let partial = json!({"id": "y", "delta": true, "position": {"lat": 1.0, "lon": 1.0}});
        assert!(tracker.reconstruct(partial).is_err());

        let completion = json!({"id": "y", "delta": true, "category": "land"});
        let snapshot = tracker.reconstruct(completion).unwrap();
        assert_eq!(snapshot.category, Category::Land);
        assert_eq!(snapshot.position.lat, 1.0);
    }

    #[test]
    fn test_record_without_id() {
        let mut tracker = DeltaTracker::new();
        let err = tracker.reconstruct(json!({"category": "land"})).unwrap_err();
        assert!(matches!(err, FeedError::Protocol(_)));
        assert!(tracker.reconstruct(json!([1, 2])).is_err());
    }

    #[test]
    fn test_merge_replaces_scalars_and_arrays() {
        let mut target = json!({"a": {"b": 1, "c": [1, 2]}, "d": 1});
        merge(&mut target, json!({"a": {"c": [3]}, "d": {"e": 2}}));
        assert_eq!(target, json!({"a": {"b": 1, "c": [3]}, "d": {"e": 2}}));
    }
}
