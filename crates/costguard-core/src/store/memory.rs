//! In-memory prediction store.

use super::{PredictionArtifact, PredictionStore, PutOutcome, StoreError, resolve_put};
use crate::analytics::Prediction;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Keeps serialized artifacts in a shared map.
///
/// Artifacts are held as JSON text so the decode path matches the persistent
/// stores. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPredictionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryPredictionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores raw text under `key`, bypassing encoding.
    pub fn insert_raw(&self, key: &str, content: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), content.to_string());
        }
    }

    /// Raw text stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn put(&self, key: &str, prediction: &Prediction) -> Result<PutOutcome, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Write("store lock poisoned".to_string()))?;

        let existing = entries
            .get(key)
            .and_then(|content| PredictionArtifact::from_json(key, content).ok())
            .map(|artifact| artifact.generated_at);

        if let Some(outcome) = resolve_put(existing, prediction.generated_at) {
            return Ok(outcome);
        }

        let json = PredictionArtifact::from(prediction).to_json()?;
        entries.insert(key.to_string(), json);
        Ok(PutOutcome::Written)
    }

    fn get(&self, key: &str) -> Result<Prediction, StoreError> {
        let content = {
            let entries = self
                .entries
                .lock()
                .map_err(|_| StoreError::Read("store lock poisoned".to_string()))?;
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?
        };

        PredictionArtifact::from_json(key, &content).map(Prediction::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn prediction(cost: f64) -> Prediction {
        Prediction {
            predicted_cost: cost,
            for_index: 3,
            for_date: None,
            generated_at: Utc::now(),
            model_version: None,
        }
    }

    #[test]
    fn test_clones_share_entries() {
        let store = InMemoryPredictionStore::new();
        let handle = store.clone();

        store.put("k", &prediction(1.0)).unwrap();
        assert_eq!(handle.len(), 1);
        assert!(handle.raw("k").unwrap().contains("predicted_cost"));
    }

    #[test]
    fn test_malformed_and_missing_are_distinct() {
        let store = InMemoryPredictionStore::new();
        store.insert_raw("bad", "[]");

        assert!(matches!(store.get("bad"), Err(StoreError::Malformed { .. })));
        assert_eq!(store.get("none"), Err(StoreError::NotFound("none".to_string())));
    }

    #[test]
    fn test_conditional_put() {
        let store = InMemoryPredictionStore::new();
        let newer = prediction(5.0);
        let mut older = prediction(1.0);
        older.generated_at = newer.generated_at - Duration::seconds(30);

        store.put("k", &newer).unwrap();
        assert!(matches!(
            store.put("k", &older).unwrap(),
            PutOutcome::Superseded { .. }
        ));
        assert_eq!(store.get("k").unwrap().predicted_cost, 5.0);
    }
}
