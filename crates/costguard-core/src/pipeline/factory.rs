//! Builds a [`Pipeline`] from a validated [`Config`].

use super::{Pipeline, PipelineSettings};
use crate::analytics::AnomalyDetector;
use crate::config::{Config, ConfigError, NotifierKind, SourceKind, StoreKind};
use crate::error::Result;
use crate::notify::{AlertDispatcher, LogNotifier, Notifier, WebhookNotifier};
use crate::sources::{CostDataSource, HttpCostSource, JsonFileCostSource};
use crate::store::{
    FilePredictionStore, InMemoryPredictionStore, PredictionStore, SqlitePredictionStore,
};
use std::time::Duration;
use tracing::debug;

impl Pipeline {
    /// Validates `config` and constructs the configured adapters.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let source = build_source(config)?;
        let store = build_store(config)?;
        let notifier = build_notifier(config)?;

        let mut dispatcher = AlertDispatcher::new(notifier, config.notifier.channel.clone())
            .with_alert_on(config.notifier.alert_on);
        if let Some(subject) = &config.notifier.subject {
            dispatcher = dispatcher.with_subject(subject.clone());
        }

        let detector = AnomalyDetector::new(&config.policy)?;
        debug!(
            policy = %config.policy.kind,
            value = config.policy.effective_value(),
            "Built pipeline from configuration"
        );

        Ok(Self::new(source, store, dispatcher, detector).with_settings(PipelineSettings {
            store_key: config.store.key.clone(),
            history_days: config.source.history_days,
            verify_granularity: config.source.granularity,
        }))
    }
}

fn missing(what: &str) -> ConfigError {
    ConfigError::Missing(what.to_string())
}

fn build_source(config: &Config) -> Result<Box<dyn CostDataSource>> {
    let source = &config.source;
    Ok(match source.kind {
        SourceKind::File => {
            let path = source.path.as_ref().ok_or_else(|| missing("source.path"))?;
            Box::new(JsonFileCostSource::new(path))
        }
        SourceKind::Http => {
            let url = source.url.as_ref().ok_or_else(|| missing("source.url"))?;
            Box::new(HttpCostSource::new(
                url.clone(),
                Duration::from_secs(source.timeout_secs),
            )?)
        }
    })
}

fn build_store(config: &Config) -> Result<Box<dyn PredictionStore>> {
    let store = &config.store;
    Ok(match store.kind {
        StoreKind::File => {
            let path = store.path.as_ref().ok_or_else(|| missing("store.path"))?;
            Box::new(FilePredictionStore::new(path)?)
        }
        StoreKind::Sqlite => {
            let path = store.path.as_ref().ok_or_else(|| missing("store.path"))?;
            Box::new(SqlitePredictionStore::open(path)?)
        }
        StoreKind::Memory => Box::new(InMemoryPredictionStore::new()),
    })
}

fn build_notifier(config: &Config) -> Result<Box<dyn Notifier>> {
    let notifier = &config.notifier;
    Ok(match notifier.kind {
        NotifierKind::Log => Box::new(LogNotifier::new()),
        NotifierKind::Webhook => {
            let url = notifier.url.as_ref().ok_or_else(|| missing("notifier.url"))?;
            let mut webhook =
                WebhookNotifier::new(url.clone(), Duration::from_secs(notifier.timeout_secs))?;
            if let Some(token) = &notifier.token {
                webhook = webhook.with_token(token.clone());
            }
            Box::new(webhook)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_builds_file_pipeline() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.source.path = Some(dir.path().join("billing.json"));
        config.store.path = Some(dir.path().join("predictions"));
        config.store.key = "latest.json".to_string();

        let pipeline = Pipeline::from_config(&config).unwrap();

        assert_eq!(pipeline.settings().store_key, "latest.json");
        assert!(dir.path().join("predictions").is_dir());
    }

    #[test]
    fn test_from_config_rejects_invalid_threshold() {
        let mut config = Config::default();
        config.source.path = Some(PathBuf::from("billing.json"));
        config.store.kind = StoreKind::Memory;
        config.policy.value = Some(-2.0);

        let err = Pipeline::from_config(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ThresholdConfig);
    }
}
