//! Bid types.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  price match  ┌──────────┐  approve trade  ┌────────┐
//!   │ PENDING ├──────────────▶│ APPROVED ├────────────────▶│ CLOSED │
//!   └────┬────┘               └────┬─────┘                 └────────┘
//!        │   superseded / manual approval     superseded        ▲
//!        └──────────────────────────┴───────────────────────────┘
//! ```
//!
//! A bid in PENDING or APPROVED is *live*: its amount is held in escrow
//! until it is refunded (superseded) or paid out to the issuer. Bids are
//! never deleted.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BidId, BidmarketError, InvestorId, InvoiceId, IssuerId, Result, money};

/// Lifecycle status of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    /// Escrowed, amount differs from the asking price.
    Pending,
    /// Escrowed, amount equals the asking price; the invoice is closed to it.
    Approved,
    /// Terminal: either superseded and refunded, or settled by ApproveTrade.
    Closed,
}

impl BidStatus {
    /// Transitions are **monotonic** (never go backwards):
    /// - `Pending → Approved` (price match)
    /// - `Pending | Approved → Closed` (superseded or trade approved)
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Approved) | (Self::Pending | Self::Approved, Self::Closed)
        )
    }

    /// Whether a bid in this status still holds escrow.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = BidmarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "closed" => Ok(Self::Closed),
            other => Err(BidmarketError::CorruptRecord {
                entity: "bid",
                reason: format!("unknown status {other:?}"),
            }),
        }
    }
}

/// A bid placed by an investor on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub investor_id: InvestorId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// A new bid with a fresh id.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `amount` is not strictly positive.
    pub fn new(
        investor_id: InvestorId,
        invoice_id: InvoiceId,
        amount: Decimal,
        status: BidStatus,
    ) -> Result<Self> {
        Ok(Self {
            id: BidId::new(),
            investor_id,
            invoice_id,
            amount: money::ensure_positive("amount", amount)?,
            status,
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// This bid moved to `target`, if the state machine allows it.
    pub fn with_status(&self, target: BidStatus) -> Result<Self> {
        if !self.status.can_transition_to(target) {
            return Err(BidmarketError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(Self {
            status: target,
            ..self.clone()
        })
    }
}

/// A live bid that was closed by a newer bid and must be refunded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundedBid {
    pub bid_id: BidId,
    pub investor_id: InvestorId,
    pub amount: Decimal,
}

/// Record that an issuer was credited for a bid. One per bid, ever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub bid_id: BidId,
    pub issuer_id: IssuerId,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(status: BidStatus) -> Bid {
        Bid::new(InvestorId::new(), InvoiceId::new(), Decimal::new(100, 0), status).unwrap()
    }

    #[test]
    fn state_transitions_valid() {
        assert!(BidStatus::Pending.can_transition_to(BidStatus::Approved));
        assert!(BidStatus::Pending.can_transition_to(BidStatus::Closed));
        assert!(BidStatus::Approved.can_transition_to(BidStatus::Closed));
    }

    #[test]
    fn state_transitions_invalid() {
        assert!(!BidStatus::Closed.can_transition_to(BidStatus::Pending));
        assert!(!BidStatus::Closed.can_transition_to(BidStatus::Approved));
        assert!(!BidStatus::Closed.can_transition_to(BidStatus::Closed));
        assert!(!BidStatus::Approved.can_transition_to(BidStatus::Pending));
    }

    #[test]
    fn live_statuses() {
        assert!(BidStatus::Pending.is_live());
        assert!(BidStatus::Approved.is_live());
        assert!(!BidStatus::Closed.is_live());
    }

    #[test]
    fn new_rejects_non_positive_amount() {
        let err = Bid::new(
            InvestorId::new(),
            InvoiceId::new(),
            Decimal::new(-100, 2),
            BidStatus::Pending,
        )
        .unwrap_err();
        assert!(matches!(err, BidmarketError::InvalidArgument { .. }));
    }

    #[test]
    fn closed_bid_cannot_reopen() {
        let closed = bid(BidStatus::Approved).with_status(BidStatus::Closed).unwrap();
        let err = closed.with_status(BidStatus::Approved).unwrap_err();
        assert!(matches!(err, BidmarketError::InvalidTransition { .. }));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&BidStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        assert_eq!("pending".parse::<BidStatus>().unwrap(), BidStatus::Pending);
    }
}
