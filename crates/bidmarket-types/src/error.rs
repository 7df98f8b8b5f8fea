//! Error types for the Bidmarket settlement engine.
//!
//! All errors use the `BM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Not found
//! - 2xx: Funds
//! - 3xx: Invalid argument
//! - 4xx: Conflict (state does not allow the operation)
//! - 5xx: Invariant violations
//! - 6xx: Storage
//! - 7xx: Timeout
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{BidId, BidStatus, InvestorId, InvoiceId, IssuerId};

/// Central error enum for all Bidmarket operations.
#[derive(Debug, Error)]
pub enum BidmarketError {
    // =================================================================
    // Not Found (1xx)
    // =================================================================
    #[error("BM_ERR_100: Investor not found: {0}")]
    InvestorNotFound(InvestorId),

    #[error("BM_ERR_101: Issuer not found: {0}")]
    IssuerNotFound(IssuerId),

    #[error("BM_ERR_102: Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    #[error("BM_ERR_103: Bid not found: {0}")]
    BidNotFound(BidId),

    // =================================================================
    // Funds (2xx)
    // =================================================================
    /// The investor's balance is below the requested bid amount.
    #[error("BM_ERR_200: Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    // =================================================================
    // Invalid Argument (3xx)
    // =================================================================
    /// Non-positive amount or price, malformed id, negative opening balance.
    #[error("BM_ERR_300: Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    // =================================================================
    // Conflict (4xx)
    // =================================================================
    /// The invoice is closed and accepts no further bids.
    #[error("BM_ERR_400: Invoice already closed: {0}")]
    InvoiceClosed(InvoiceId),

    /// The invoice was closed to an investor other than the bid's.
    #[error(
        "BM_ERR_401: Invoice {invoice_id} already closed with different investor {investor_id}"
    )]
    InvoiceAlreadyClosedWithDifferentInvestor {
        invoice_id: InvoiceId,
        investor_id: InvestorId,
    },

    /// The bid was superseded and refunded; it can never be approved.
    #[error("BM_ERR_402: Bid was superseded and refunded: {0}")]
    BidSuperseded(BidId),

    /// A bid status change outside the lifecycle state machine.
    #[error("BM_ERR_403: Invalid bid transition: {from} -> {to}")]
    InvalidTransition { from: BidStatus, to: BidStatus },

    // =================================================================
    // Invariant (5xx)
    // =================================================================
    /// Supply conservation invariant violated. The workflow is aborted.
    #[error("BM_ERR_500: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Storage (6xx)
    // =================================================================
    /// Connection, statement or commit failure in the ledger store.
    #[error("BM_ERR_600: Storage error: {0}")]
    Storage(String),

    /// A persisted row could not be decoded into its record type.
    #[error("BM_ERR_601: Corrupt {entity} record: {reason}")]
    CorruptRecord { entity: &'static str, reason: String },

    // =================================================================
    // Timeout (7xx)
    // =================================================================
    /// The workflow deadline expired; the unit of work was rolled back.
    #[error("BM_ERR_700: Workflow timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("BM_ERR_900: Configuration error: {0}")]
    Configuration(String),

    #[error("BM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("BM_ERR_902: I/O error: {0}")]
    Io(String),
}

/// Taxonomy class of a [`BidmarketError`], for mapping onto transport
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InsufficientFunds,
    InvalidArgument,
    Conflict,
    Invariant,
    Storage,
    Timeout,
    Internal,
}

impl BidmarketError {
    /// The taxonomy class this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvestorNotFound(_)
            | Self::IssuerNotFound(_)
            | Self::InvoiceNotFound(_)
            | Self::BidNotFound(_) => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::InvoiceClosed(_)
            | Self::InvoiceAlreadyClosedWithDifferentInvestor { .. }
            | Self::BidSuperseded(_)
            | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::SupplyInvariantViolation { .. } => ErrorKind::Invariant,
            Self::Storage(_) | Self::CorruptRecord { .. } => ErrorKind::Storage,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Configuration(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may retry the same request. The engine itself never
    /// retries: debits and credits are not idempotent without a request id.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timeout { .. })
    }

    /// Shorthand for [`BidmarketError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BidmarketError>;

impl From<std::io::Error> for BidmarketError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BidmarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BidmarketError::BidNotFound(BidId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("BM_ERR_103"), "Got: {msg}");
    }

    #[test]
    fn insufficient_funds_display() {
        let err = BidmarketError::InsufficientFunds {
            needed: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("BM_ERR_200"));
        assert!(msg.contains("100"));
        assert!(msg.contains("50"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = BidmarketError::InvalidTransition {
            from: BidStatus::Closed,
            to: BidStatus::Approved,
        };
        let msg = format!("{err}");
        assert!(msg.contains("closed -> approved"), "Got: {msg}");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            BidmarketError::InvoiceNotFound(InvoiceId::new()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BidmarketError::InvoiceClosed(InvoiceId::new()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(BidmarketError::Timeout { after_ms: 5 }.kind(), ErrorKind::Timeout);
        assert_eq!(BidmarketError::invalid("x").kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn only_storage_and_timeout_are_retryable() {
        assert!(BidmarketError::Storage("busy".into()).is_retryable());
        assert!(BidmarketError::Timeout { after_ms: 1 }.is_retryable());
        assert!(!BidmarketError::BidSuperseded(BidId::new()).is_retryable());
        assert!(
            !BidmarketError::InsufficientFunds {
                needed: Decimal::ONE,
                available: Decimal::ZERO,
            }
            .is_retryable()
        );
    }

    #[test]
    fn all_errors_have_bm_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BidmarketError::InvestorNotFound(InvestorId::new())),
            Box::new(BidmarketError::IssuerNotFound(IssuerId::new())),
            Box::new(BidmarketError::Storage("disk".into())),
            Box::new(BidmarketError::CorruptRecord {
                entity: "bid",
                reason: "bad status".into(),
            }),
            Box::new(BidmarketError::SupplyInvariantViolation {
                reason: "drift".into(),
            }),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("BM_ERR_"),
                "Error missing BM_ERR_ prefix: {msg}"
            );
        }
    }
}
