//! System-wide constants for the Bidmarket settlement engine.

/// Maximum decimal places accepted for prices, amounts and balances.
pub const MONEY_SCALE: u32 = 8;

/// Default deadline for a single PlaceBid / ApproveTrade unit of work.
pub const DEFAULT_WORKFLOW_TIMEOUT_MS: u64 = 2000;

/// Default SQLite busy timeout (wait for the write lock held by another workflow).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Default wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 3000;

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Default database location when no configuration is given.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bidmarket.db";

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Maximum length of an issuer or investor display name.
pub const MAX_NAME_LEN: usize = 255;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Bidmarket";
