//! Serialized form of a prediction bridging the forecast and verify runs.

use super::StoreError;
use crate::analytics::Prediction;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Persisted prediction record.
///
/// `generated_at` is the version of the record: a store never replaces an
/// artifact with one carrying an older timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionArtifact {
    /// Forecast cost.
    pub predicted_cost: f64,
    /// RFC 3339 generation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Version of the model that produced the forecast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Day index the forecast is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_index: Option<usize>,
    /// Calendar day the forecast is for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_date: Option<NaiveDate>,
}

impl From<&Prediction> for PredictionArtifact {
    fn from(prediction: &Prediction) -> Self {
        Self {
            predicted_cost: prediction.predicted_cost,
            generated_at: prediction.generated_at,
            model_version: prediction.model_version.clone(),
            for_index: Some(prediction.for_index),
            for_date: prediction.for_date,
        }
    }
}

impl From<PredictionArtifact> for Prediction {
    /// Artifacts without `for_index` map to index 0.
    fn from(artifact: PredictionArtifact) -> Self {
        Self {
            predicted_cost: artifact.predicted_cost,
            for_index: artifact.for_index.unwrap_or_default(),
            for_date: artifact.for_date,
            generated_at: artifact.generated_at,
            model_version: artifact.model_version,
        }
    }
}

impl PredictionArtifact {
    /// Encodes the artifact as JSON.
    pub fn to_json(&self) -> Result<String, StoreError> {
        if !self.predicted_cost.is_finite() {
            return Err(StoreError::Write(format!(
                "refusing to persist non-finite predicted cost {}",
                self.predicted_cost
            )));
        }
        serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Write(format!("failed to encode artifact: {}", e)))
    }

    /// Decodes an artifact stored under `key`.
    pub fn from_json(key: &str, content: &str) -> Result<Self, StoreError> {
        let artifact: Self =
            serde_json::from_str(content).map_err(|e| StoreError::Malformed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if !artifact.predicted_cost.is_finite() {
            return Err(StoreError::Malformed {
                key: key.to_string(),
                reason: "predicted_cost is not a finite number".to_string(),
            });
        }

        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_minimal_record() {
        let artifact = PredictionArtifact::from_json(
            "k",
            r#"{"predicted_cost": 4.25, "generated_at": "2025-02-01T06:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(artifact.predicted_cost, 4.25);
        assert_eq!(artifact.generated_at, Utc.with_ymd_and_hms(2025, 2, 1, 6, 0, 0).unwrap());
        assert_eq!(artifact.model_version, None);

        let prediction: Prediction = artifact.into();
        assert_eq!(prediction.for_index, 0);
        assert_eq!(prediction.for_date, None);
    }

    #[test]
    fn test_decode_accepts_offsets_and_unknown_fields() {
        let artifact = PredictionArtifact::from_json(
            "k",
            r#"{"predicted_cost": 1, "generated_at": "2025-02-01T08:00:00+02:00",
                "model_version": "ols-linear/v1", "source": "legacy"}"#,
        )
        .unwrap();

        assert_eq!(artifact.generated_at, Utc.with_ymd_and_hms(2025, 2, 1, 6, 0, 0).unwrap());
        assert_eq!(artifact.model_version.as_deref(), Some("ols-linear/v1"));
    }

    #[test]
    fn test_decode_missing_timestamp_is_malformed() {
        let err = PredictionArtifact::from_json("predicted_cost.json", r#"{"predicted_cost": 3.0}"#)
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref key, .. } if key == "predicted_cost.json"));
    }

    #[test]
    fn test_decode_wrong_type_is_malformed() {
        let err = PredictionArtifact::from_json(
            "k",
            r#"{"predicted_cost": "lots", "generated_at": "2025-02-01T06:00:00Z"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }

    #[test]
    fn test_encode_rejects_non_finite() {
        let artifact = PredictionArtifact {
            predicted_cost: f64::NAN,
            generated_at: Utc::now(),
            model_version: None,
            for_index: None,
            for_date: None,
        };
        assert!(matches!(artifact.to_json(), Err(StoreError::Write(_))));
    }

    #[test]
    fn test_encode_uses_rfc3339_timestamp() {
        let artifact = PredictionArtifact {
            predicted_cost: 2.5,
            generated_at: Utc.with_ymd_and_hms(2025, 2, 1, 6, 0, 0).unwrap(),
            model_version: Some("ols-linear/v1".to_string()),
            for_index: Some(30),
            for_date: NaiveDate::from_ymd_opt(2025, 2, 1),
        };

        let json = artifact.to_json().unwrap();
        assert!(json.contains("\"generated_at\": \"2025-02-01T06:00:00Z\""));
        assert!(json.contains("\"for_date\": \"2025-02-01\""));
        assert_eq!(PredictionArtifact::from_json("k", &json).unwrap(), artifact);
    }
}
