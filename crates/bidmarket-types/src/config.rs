//! Configuration types for the Bidmarket service.
//!
//! Every field has a default, so a partial JSON file (or none at all) is a
//! valid configuration.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{BidmarketError, Result, constants};

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Ledger store connection settings.
    pub store: StoreConfig,
    /// Settlement engine settings.
    pub engine: EngineConfig,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            log_filter: constants::DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BidmarketError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| BidmarketError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.engine.validate()
    }
}

/// Ledger store (SQLite) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite URL, e.g. `sqlite://bidmarket.db` or `sqlite::memory:`.
    pub url: String,
    /// Connection pool size.
    pub max_connections: u32,
    /// How long a workflow waits for another workflow's write lock.
    pub busy_timeout_ms: u64,
    /// How long a workflow waits for a pooled connection.
    pub acquire_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: constants::DEFAULT_DATABASE_URL.to_string(),
            max_connections: constants::DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: constants::DEFAULT_BUSY_TIMEOUT_MS,
            acquire_timeout_ms: constants::DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(BidmarketError::Configuration("store.url is empty".into()));
        }
        if self.max_connections == 0 {
            return Err(BidmarketError::Configuration(
                "store.max_connections must be > 0".into(),
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(BidmarketError::Configuration(
                "store.acquire_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Settlement engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for one PlaceBid / ApproveTrade unit of work.
    pub workflow_timeout_ms: u64,
    /// Measure total supply before and after every workflow and refuse to
    /// commit on drift.
    pub verify_conservation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_timeout_ms: constants::DEFAULT_WORKFLOW_TIMEOUT_MS,
            verify_conservation: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.workflow_timeout_ms == 0 {
            return Err(BidmarketError::Configuration(
                "engine.workflow_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ServiceConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.store.url, "sqlite://bidmarket.db");
        assert_eq!(cfg.engine.workflow_timeout(), Duration::from_millis(2000));
        assert!(!cfg.engine.verify_conservation);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ServiceConfig::from_json(r#"{ "store": { "url": "sqlite::memory:" } }"#).unwrap();
        assert_eq!(cfg.store.url, "sqlite::memory:");
        assert_eq!(cfg.store.max_connections, constants::DEFAULT_MAX_CONNECTIONS);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ServiceConfig::from_json(r#"{ "engine": { "workflow_timeout_ms": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, BidmarketError::Configuration(_)));
    }

    #[test]
    fn zero_pool_rejected() {
        let err =
            ServiceConfig::from_json(r#"{ "store": { "max_connections": 0 } }"#).unwrap_err();
        assert!(format!("{err}").contains("max_connections"));
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = ServiceConfig::load("/nonexistent/bidmarket.json").unwrap_err();
        assert!(matches!(err, BidmarketError::Configuration(_)));
    }
}
