//! # bidmarket-settlement
//!
//! **Settlement Engine**: the PlaceBid and ApproveTrade workflows, bid
//! lifecycle resolution, payout idempotency, and read-side queries.
//!
//! ## Architecture
//!
//! Every workflow runs inside one [`bidmarket_ledger::UnitOfWork`]:
//! 1. Locks the invoice (PlaceBid) or bid (ApproveTrade) row
//! 2. Escrows the investor's funds (PlaceBid)
//! 3. Supersedes and refunds standing bids
//! 4. Resolves the bid against the invoice price
//! 5. Pays the issuer at most once per bid
//! 6. Optionally checks supply conservation, then commits
//!
//! ## Bid Lifecycle
//!
//! ```text
//! pending --[amount == price]--> approved --[ApproveTrade]--> closed
//! pending --[ApproveTrade]--> closed
//! pending | approved --[superseded, refunded]--> closed
//! ```

pub mod engine;
pub mod facade;
pub mod idempotency;
pub mod resolver;
pub mod supply_conservation;

pub use engine::SettlementEngine;
pub use facade::{AuditReport, MarketQueries};
pub use idempotency::{PayoutGuard, PayoutOutcome};
pub use supply_conservation::{SupplyConservation, SupplySnapshot};
