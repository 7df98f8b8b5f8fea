//! Supply conservation invariant checker.
//!
//! Invariant held by every workflow:
//! ```text
//! Σ investor.balance + Σ issuer.balance + Σ unpaid live bid amounts == const
//! ```
//!
//! Money only moves between investors, escrow and issuers. A workflow that
//! changes the total has a bug and must not commit.

use bidmarket_ledger::balance;
use bidmarket_types::{BidmarketError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;

/// Point-in-time breakdown of total supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupplySnapshot {
    pub investors: Decimal,
    pub issuers: Decimal,
    pub escrow: Decimal,
}

impl SupplySnapshot {
    /// Read all three components on `conn`.
    pub async fn measure(conn: &mut SqliteConnection) -> Result<Self> {
        Ok(Self {
            investors: balance::total_investor_balance(conn).await?,
            issuers: balance::total_issuer_balance(conn).await?,
            escrow: balance::live_escrow_total(conn).await?,
        })
    }

    /// Sum of the three components.
    ///
    /// # Errors
    /// `SupplyInvariantViolation` if the sum overflows.
    pub fn total(&self) -> Result<Decimal> {
        self.investors
            .checked_add(self.issuers)
            .and_then(|sum| sum.checked_add(self.escrow))
            .ok_or_else(|| BidmarketError::SupplyInvariantViolation {
                reason: format!("total supply overflows: {self:?}"),
            })
    }
}

/// Compares supply before and after a workflow.
pub struct SupplyConservation;

impl SupplyConservation {
    /// # Errors
    /// Returns [`BidmarketError::SupplyInvariantViolation`] if the totals differ.
    pub fn verify(before: &SupplySnapshot, after: &SupplySnapshot) -> Result<()> {
        let (was, now) = (before.total()?, after.total()?);
        if was != now {
            return Err(BidmarketError::SupplyInvariantViolation {
                reason: format!(
                    "supply {was} != {now} (investors {} -> {}, issuers {} -> {}, escrow {} -> {})",
                    before.investors,
                    after.investors,
                    before.issuers,
                    after.issuers,
                    before.escrow,
                    after.escrow,
                ),
            });
        }
        Ok(())
    }
}
