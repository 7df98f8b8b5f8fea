//! Ledger Store: connection pool, schema provisioning, and the unit of work.
//!
//! The store is the only shared mutable resource in the system. Each
//! workflow borrows one pooled connection for its whole duration through a
//! [`UnitOfWork`] and gives it back on commit or rollback.

use std::{
    ops::{Deref, DerefMut},
    str::FromStr,
    time::Duration,
};

use bidmarket_types::{BidmarketError, Result, StoreConfig};
use sqlx::{
    Sqlite, SqliteConnection, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::schema::SCHEMA;

/// Map a driver error onto the storage class of the error taxonomy.
pub fn storage(err: sqlx::Error) -> BidmarketError {
    BidmarketError::Storage(err.to_string())
}

/// Handle to the ledger database. Cheap to clone: clones share the pool.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Open (creating if missing) the database described by `config`.
    ///
    /// Every connection runs with `foreign_keys = ON`, WAL journaling and the
    /// configured busy timeout. An in-memory URL is pinned to a single
    /// connection, since each SQLite memory connection is its own database.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        if !config.url.starts_with("sqlite:") {
            return Err(BidmarketError::Configuration(format!(
                "store.url must be an sqlite: URL, got {:?}",
                config.url
            )));
        }
        let in_memory = is_memory_url(&config.url);
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| BidmarketError::Configuration(format!("bad store.url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let max_connections = if in_memory { 1 } else { config.max_connections };
        let pool = pool_options(max_connections, config.acquire_timeout(), in_memory)
            .connect_with(options)
            .await
            .map_err(storage)?;

        tracing::info!(
            url = %config.url,
            max_connections,
            "Ledger store connected"
        );
        Ok(Self { pool })
    }

    /// A fresh, migrated in-memory store on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let store = Self::connect(&StoreConfig {
            url: "sqlite::memory:".to_string(),
            ..StoreConfig::default()
        })
        .await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Create all tables and indexes if they don't exist.
    pub async fn migrate(&self) -> Result<()> {
        let mut uow = self.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *uow)
                .await
                .map_err(storage)?;
        }
        uow.commit().await?;
        tracing::debug!(statements = SCHEMA.len(), "Ledger schema ensured");
        Ok(())
    }

    /// Open a unit of work on a pooled connection.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(UnitOfWork { tx })
    }

    /// The underlying pool, for read-only queries outside a unit of work.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn pool_options(
    max_connections: u32,
    acquire_timeout: Duration,
    in_memory: bool,
) -> SqlitePoolOptions {
    let options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout);
    if in_memory {
        // Dropping the last connection would drop the database.
        options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options
    }
}

/// One atomic unit of work: a transaction every storage call in a workflow
/// goes through.
///
/// Dropping a `UnitOfWork` without calling [`UnitOfWork::commit`] rolls it
/// back, so an early `?` return, a timeout, or a cancelled request never
/// leaves partial effects.
#[derive(Debug)]
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Make every write of this unit of work durable.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage)
    }

    /// Discard every write of this unit of work.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(storage)
    }
}

impl Deref for UnitOfWork {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for UnitOfWork {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}
