//! Configuration management for database and propagator settings.

/// Database configuration and connection management
pub mod database;

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Propagator tuning knobs, surfaced through the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PropagatorConfig {
    /// Bounded retry budget for the persistence steps.
    pub max_persist_attempts: u32,
    /// Backoff between retry attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Whether deleting a transaction retracts its monthly total
    /// contribution. Off by default: totals read as an append-only
    /// historical ledger.
    pub reverse_totals_on_delete: bool,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        PropagatorConfig {
            max_persist_attempts: 3,
            retry_backoff_ms: 100,
            reverse_totals_on_delete: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database connection string; empty means use the environment default.
    pub database_url: String,
    pub propagator: PropagatorConfig,
}

/// Loads the application configuration.
///
/// Reads the TOML file named by `BALANCEBOOK_CONFIG` when set, otherwise
/// falls back to defaults. The database URL defers to `DATABASE_URL` when
/// the file leaves it empty.
pub fn load_app_configuration() -> Result<AppConfig> {
    let mut config = match std::env::var("BALANCEBOOK_CONFIG") {
        Ok(path) => read_config_file(Path::new(&path))?,
        Err(_) => AppConfig::default(),
    };
    if config.database_url.is_empty() {
        config.database_url = database::get_database_url();
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config = toml::from_str(&raw).map_err(|e| Error::Config {
        message: format!("failed to parse {}: {e}", path.display()),
    })?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PropagatorConfig::default();
        assert!(config.max_persist_attempts >= 1);
        assert!(!config.reverse_totals_on_delete);
    }

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            database_url = "sqlite::memory:"

            [propagator]
            max_persist_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.propagator.max_persist_attempts, 5);
        assert_eq!(config.propagator.retry_backoff_ms, 100);
    }
}
