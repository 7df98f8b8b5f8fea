//! Application context: configuration, store, engine and queries.

use std::path::{Path, PathBuf};

use bidmarket_ledger::LedgerStore;
use bidmarket_settlement::{MarketQueries, SettlementEngine};
use bidmarket_types::ServiceConfig;

/// Configuration file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_PATH: &str = "./config/config.json";

/// Resolve the service configuration from an optional file and overrides.
pub fn resolve_config(
    path: Option<&Path>,
    database: Option<&str>,
) -> anyhow::Result<ServiceConfig> {
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut config = match path {
        Some(path) => ServiceConfig::load(path)?,
        None if fallback.is_file() => ServiceConfig::load(&fallback)?,
        None => ServiceConfig::default(),
    };
    if let Some(url) = database {
        config.store.url = url.to_string();
    }
    config.validate()?;
    Ok(config)
}

/// Wires the ledger store to the engine and the query facade.
pub struct AppContext {
    pub config: ServiceConfig,
    pub store: LedgerStore,
    pub engine: SettlementEngine,
    pub queries: MarketQueries,
}

impl AppContext {
    /// Connect to the configured store and make sure the schema exists.
    pub async fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let store = LedgerStore::connect(&config.store).await?;
        store.migrate().await?;
        Ok(Self::with_store(config, store))
    }

    #[must_use]
    pub fn with_store(config: ServiceConfig, store: LedgerStore) -> Self {
        Self {
            engine: SettlementEngine::new(store.clone(), config.engine.clone()),
            queries: MarketQueries::new(store.clone()),
            store,
            config,
        }
    }
}
