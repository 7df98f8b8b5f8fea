//! # bidmarket-types
//!
//! Shared types, errors, and configuration for the **Bidmarket** invoice
//! settlement engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`IssuerId`], [`InvestorId`], [`InvoiceId`], [`BidId`]
//! - **Parties**: [`Issuer`], [`Investor`]
//! - **Invoice model**: [`Invoice`], [`InvoiceStatus`]
//! - **Bid model**: [`Bid`], [`BidStatus`], [`RefundedBid`], [`Payout`]
//! - **Configuration**: [`ServiceConfig`], [`StoreConfig`], [`EngineConfig`]
//! - **Errors**: [`BidmarketError`] with `BM_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: system-wide limits and defaults

pub mod bid;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod party;

pub use bid::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use invoice::*;
pub use party::*;

// Constants and money helpers are accessed via their module path
// (`bidmarket_types::constants::FOO`, `bidmarket_types::money::ensure_positive`).
