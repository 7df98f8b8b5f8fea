//! Payout idempotency guard: prevents paying an issuer twice for one bid.
//!
//! The `payout` table is keyed by bid id. Inserting the row and crediting
//! the issuer happen in the same unit of work, so either both are durable or
//! neither is, and a second attempt finds the row and does nothing.

use bidmarket_ledger::{PayoutRepo, balance};
use bidmarket_types::{Bid, IssuerId, Payout, Result};
use chrono::Utc;
use sqlx::SqliteConnection;

/// Outcome of [`PayoutGuard::settle_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutOutcome {
    /// This call paid the issuer.
    Paid,
    /// The bid had been paid earlier; nothing changed.
    AlreadyPaid,
}

/// Pays an issuer for a bid at most once.
pub struct PayoutGuard;

impl PayoutGuard {
    /// Record the payout for `bid` and credit `issuer_id` by its amount,
    /// unless the bid was already paid out.
    pub async fn settle_once(
        conn: &mut SqliteConnection,
        bid: &Bid,
        issuer_id: IssuerId,
    ) -> Result<PayoutOutcome> {
        let payout = Payout {
            bid_id: bid.id,
            issuer_id,
            amount: bid.amount,
            paid_at: Utc::now(),
        };
        if !PayoutRepo::insert_if_absent(conn, &payout).await? {
            tracing::debug!(bid = %bid.id, "Payout already recorded, skipping credit");
            return Ok(PayoutOutcome::AlreadyPaid);
        }
        balance::credit_issuer(conn, issuer_id, bid.amount).await?;
        Ok(PayoutOutcome::Paid)
    }

    /// Whether `bid` has been paid out.
    pub async fn is_paid(conn: &mut SqliteConnection, bid: &Bid) -> Result<bool> {
        PayoutRepo::exists(conn, bid.id).await
    }
}
