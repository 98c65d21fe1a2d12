//! CLI configuration loading and merging.

use anyhow::Context;
use costguard_core::Config;
use std::path::Path;
use tracing::debug;

/// Load configuration.
///
/// Configuration precedence:
/// 1. Environment variables (COSTGUARD_*)
/// 2. `--config` file, or else:
///    a. Local config file (./costguard.toml)
///    b. Global config file (~/.costguard/config.toml)
/// 3. Defaults
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match explicit {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::discover_and_load().context("Failed to load configuration")?,
    };

    config
        .apply_env_overrides()
        .context("Invalid COSTGUARD_* environment override")?;

    debug!(
        explicit = ?explicit,
        source = ?config.source.kind,
        store = ?config.store.kind,
        policy = %config.policy.kind,
        notifier = ?config.notifier.kind,
        "Resolved configuration"
    );
    Ok(config)
}
