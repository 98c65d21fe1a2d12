//! SQLite-backed prediction store.

use super::{PredictionArtifact, PredictionStore, PutOutcome, StoreError};
use crate::analytics::Prediction;
use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Stores artifacts in a `predictions` table.
///
/// The newer-timestamp check and the write happen in one upsert statement,
/// so concurrent writers cannot interleave between them.
pub struct SqlitePredictionStore {
    conn: Mutex<Connection>,
}

impl SqlitePredictionStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Write(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Read(format!("failed to open {}: {}", path.display(), e)))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Read(format!("failed to open in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        debug!("Initializing prediction store schema");
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                generated_at_micros INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| StoreError::Write(format!("failed to create schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    fn insert_raw(&self, key: &str, payload: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO predictions (key, payload, generated_at_micros) VALUES (?1, ?2, 0)",
            params![key, payload],
        )
        .unwrap();
    }
}

impl PredictionStore for SqlitePredictionStore {
    fn put(&self, key: &str, prediction: &Prediction) -> Result<PutOutcome, StoreError> {
        let payload = PredictionArtifact::from(prediction).to_json()?;
        let micros = prediction.generated_at.timestamp_micros();

        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Write("connection lock poisoned".to_string()))?;

        let changed = conn
            .execute(
                r#"
                INSERT INTO predictions (key, payload, generated_at_micros)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    payload = excluded.payload,
                    generated_at_micros = excluded.generated_at_micros
                WHERE excluded.generated_at_micros >= predictions.generated_at_micros
                "#,
                params![key, payload, micros],
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;

        if changed > 0 {
            debug!(key, "Stored prediction artifact");
            return Ok(PutOutcome::Written);
        }

        let existing: i64 = conn
            .query_row(
                "SELECT generated_at_micros FROM predictions WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let existing_generated_at = DateTime::from_timestamp_micros(existing)
            .ok_or_else(|| StoreError::Malformed {
                key: key.to_string(),
                reason: format!("invalid stored timestamp {}", existing),
            })?;

        info!(key, %existing_generated_at, "Newer prediction already stored; skipping write");
        Ok(PutOutcome::Superseded {
            existing_generated_at,
        })
    }

    fn get(&self, key: &str) -> Result<Prediction, StoreError> {
        let payload: Option<String> = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| StoreError::Read("connection lock poisoned".to_string()))?;
            conn.query_row(
                "SELECT payload FROM predictions WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Read(e.to_string()))?
        };

        let payload = payload.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        PredictionArtifact::from_json(key, &payload).map(Prediction::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn prediction(cost: f64, generated_at: chrono::DateTime<Utc>) -> Prediction {
        Prediction {
            predicted_cost: cost,
            for_index: 59,
            for_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 15),
            generated_at,
            model_version: Some("ols-linear/v1".to_string()),
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let store = SqlitePredictionStore::open_in_memory().unwrap();
        let stored = prediction(42.0, Utc::now());

        assert_eq!(store.put("daily", &stored).unwrap(), PutOutcome::Written);
        assert_eq!(store.get("daily").unwrap(), stored);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let store = SqlitePredictionStore::open_in_memory().unwrap();
        assert_eq!(store.get("daily"), Err(StoreError::NotFound("daily".to_string())));
    }

    #[test]
    fn test_corrupted_payload_is_malformed() {
        let store = SqlitePredictionStore::open_in_memory().unwrap();
        store.insert_raw("daily", "not json");
        assert!(matches!(store.get("daily"), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn test_older_write_is_rejected_atomically() {
        let store = SqlitePredictionStore::open_in_memory().unwrap();
        let now = Utc::now();

        store.put("daily", &prediction(30.0, now)).unwrap();
        let outcome = store
            .put("daily", &prediction(10.0, now - Duration::days(1)))
            .unwrap();

        match outcome {
            PutOutcome::Superseded { existing_generated_at } => {
                assert_eq!(existing_generated_at.timestamp_micros(), now.timestamp_micros());
            }
            PutOutcome::Written => panic!("older prediction must not overwrite a newer one"),
        }
        assert_eq!(store.get("daily").unwrap().predicted_cost, 30.0);
    }

    #[test]
    fn test_same_timestamp_retry_overwrites() {
        let store = SqlitePredictionStore::open_in_memory().unwrap();
        let now = Utc::now();

        store.put("daily", &prediction(30.0, now)).unwrap();
        assert_eq!(store.put("daily", &prediction(31.0, now)).unwrap(), PutOutcome::Written);
        assert_eq!(store.get("daily").unwrap().predicted_cost, 31.0);
    }

    #[test]
    fn test_file_database_persists_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/predictions.db");
        let stored = prediction(8.0, Utc::now());

        SqlitePredictionStore::open(&path).unwrap().put("daily", &stored).unwrap();
        let reopened = SqlitePredictionStore::open(&path).unwrap();

        assert_eq!(reopened.get("daily").unwrap(), stored);
    }
}
