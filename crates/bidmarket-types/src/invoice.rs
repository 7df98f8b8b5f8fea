//! Invoice types.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  approved bid settles  ┌────────┐
//!   │ OPEN ├───────────────────────▶│ CLOSED │
//!   └──────┘                        └────────┘
//! ```
//!
//! CLOSED is terminal. The closing bid's investor is recorded exactly once.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BidmarketError, InvestorId, InvoiceId, IssuerId, Result, money};

/// Lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Open,
    Closed,
}

impl InvoiceStatus {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BidmarketError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(BidmarketError::CorruptRecord {
                entity: "invoice",
                reason: format!("unknown status {other:?}"),
            }),
        }
    }
}

/// An invoice listed by an issuer at a fixed asking price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub issuer_id: IssuerId,
    /// Set once, to the investor whose bid closed the invoice.
    pub investor_id: Option<InvestorId>,
    pub status: InvoiceStatus,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// A new open invoice with no investor.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `price` is not strictly positive.
    pub fn open(issuer_id: IssuerId, price: Decimal) -> Result<Self> {
        Ok(Self {
            id: InvoiceId::new(),
            issuer_id,
            investor_id: None,
            status: InvoiceStatus::Open,
            price: money::ensure_positive("price", price)?,
            created_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == InvoiceStatus::Open
    }

    /// Whether the invoice is closed and was closed to `investor_id`.
    #[must_use]
    pub fn is_closed_to(&self, investor_id: InvestorId) -> bool {
        self.status == InvoiceStatus::Closed && self.investor_id == Some(investor_id)
    }

    /// The closed form of this invoice, settled to `investor_id`.
    ///
    /// Closing an invoice already closed to the same investor is a no-op;
    /// closing it to anyone else is a conflict.
    pub fn closed_to(&self, investor_id: InvestorId) -> Result<Self> {
        match (self.status, self.investor_id) {
            (InvoiceStatus::Open, _) => Ok(Self {
                investor_id: Some(investor_id),
                status: InvoiceStatus::Closed,
                ..self.clone()
            }),
            (InvoiceStatus::Closed, Some(current)) if current == investor_id => Ok(self.clone()),
            (InvoiceStatus::Closed, Some(current)) => {
                Err(BidmarketError::InvoiceAlreadyClosedWithDifferentInvestor {
                    invoice_id: self.id,
                    investor_id: current,
                })
            }
            (InvoiceStatus::Closed, None) => Err(BidmarketError::CorruptRecord {
                entity: "invoice",
                reason: format!("invoice {} is closed without an investor", self.id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(price: i64) -> Invoice {
        Invoice::open(IssuerId::new(), Decimal::new(price, 0)).unwrap()
    }

    #[test]
    fn open_starts_without_investor() {
        let inv = invoice(100);
        assert!(inv.is_open());
        assert_eq!(inv.investor_id, None);
    }

    #[test]
    fn open_rejects_non_positive_price() {
        let err = Invoice::open(IssuerId::new(), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, BidmarketError::InvalidArgument { .. }));
    }

    #[test]
    fn close_sets_investor_once() {
        let inv = invoice(100);
        let alice = InvestorId::new();
        let closed = inv.closed_to(alice).unwrap();
        assert!(closed.is_closed_to(alice));
        // Idempotent for the same investor.
        assert_eq!(closed.closed_to(alice).unwrap(), closed);
    }

    #[test]
    fn close_to_other_investor_conflicts() {
        let closed = invoice(100).closed_to(InvestorId::new()).unwrap();
        let err = closed.closed_to(InvestorId::new()).unwrap_err();
        assert!(matches!(
            err,
            BidmarketError::InvoiceAlreadyClosedWithDifferentInvestor { .. }
        ));
    }

    #[test]
    fn status_parses_persisted_form() {
        assert_eq!("closed".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Closed);
        assert!("CLOSED".parse::<InvoiceStatus>().is_err());
    }
}
