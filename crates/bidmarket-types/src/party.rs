//! Issuers and investors: the two kinds of balance-holding parties.
//!
//! Both are created administratively and live for the lifetime of the
//! service. Their balances only move through the ledger's balance
//! operations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BidmarketError, InvestorId, IssuerId, Result, constants, money};

/// An issuer lists invoices and is credited when a bid settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub id: IssuerId,
    pub name: String,
    pub balance: Decimal,
}

impl Issuer {
    /// Validate and build a new issuer with a fresh id.
    pub fn onboard(name: impl Into<String>, balance: Decimal) -> Result<Self> {
        Ok(Self {
            id: IssuerId::new(),
            name: validate_name(name.into())?,
            balance: money::ensure_non_negative("issuer balance", balance)?,
        })
    }
}

/// An investor places bids; bid amounts are escrowed out of its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    pub id: InvestorId,
    pub name: String,
    pub balance: Decimal,
}

impl Investor {
    /// Validate and build a new investor with a fresh id.
    pub fn onboard(name: impl Into<String>, balance: Decimal) -> Result<Self> {
        Ok(Self {
            id: InvestorId::new(),
            name: validate_name(name.into())?,
            balance: money::ensure_non_negative("investor balance", balance)?,
        })
    }
}

fn validate_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BidmarketError::invalid("name must not be empty"));
    }
    if trimmed.len() > constants::MAX_NAME_LEN {
        return Err(BidmarketError::invalid(format!(
            "name longer than {} bytes",
            constants::MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}
