//! # bidmarket-ledger
//!
//! **Ledger Store**: durable SQLite persistence for issuers, investors,
//! invoices, bids and payouts, plus the balance operations that move money
//! between them.
//!
//! ## Architecture
//!
//! 1. **LedgerStore**: connection pool, pragmas, schema provisioning
//! 2. **UnitOfWork**: one transaction per workflow; drop means rollback
//! 3. **Repos**: typed row access, one repo per table
//! 4. **Balance**: check / debit / credit and supply aggregations
//!
//! ## Money Flow
//!
//! ```text
//! investor.balance --debit--> bid escrow --payout--> issuer.balance
//!                  <--refund--
//! ```
//!
//! Nothing here commits on its own; the settlement engine decides when a unit
//! of work is complete.

pub mod balance;
pub mod repos;
pub mod schema;
pub mod store;

pub use repos::{BidRepo, InvestorRepo, InvoiceRepo, IssuerRepo, PayoutRepo};
pub use store::{LedgerStore, UnitOfWork, storage};
