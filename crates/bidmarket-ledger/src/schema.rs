//! Database schema and row types.
//!
//! Ids, decimals and statuses are stored as TEXT. Decimals are never stored
//! as REAL: SQLite would round them, and every balance movement is computed
//! in Rust on [`Decimal`] before being written back.

use std::str::FromStr;

use bidmarket_types::{
    Bid, BidStatus, BidmarketError, Investor, Invoice, InvoiceStatus, Issuer, Payout, Result,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// DDL applied by [`crate::LedgerStore::migrate`]. Every statement is
/// idempotent.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS issuer (
        id      TEXT PRIMARY KEY NOT NULL,
        name    TEXT NOT NULL,
        balance TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS investor (
        id      TEXT PRIMARY KEY NOT NULL,
        name    TEXT NOT NULL,
        balance TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS invoice (
        id          TEXT PRIMARY KEY NOT NULL,
        issuer_id   TEXT NOT NULL REFERENCES issuer(id),
        investor_id TEXT REFERENCES investor(id),
        status      TEXT NOT NULL CHECK (status IN ('open', 'closed')),
        price       TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )",
    r"
    CREATE TABLE IF NOT EXISTS bid (
        id          TEXT PRIMARY KEY NOT NULL,
        investor_id TEXT NOT NULL REFERENCES investor(id),
        invoice_id  TEXT NOT NULL REFERENCES invoice(id),
        amount      TEXT NOT NULL,
        status      TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'closed')),
        created_at  TEXT NOT NULL
    )",
    r"
    CREATE INDEX IF NOT EXISTS idx_bid_invoice_status ON bid (invoice_id, status)",
    r"
    CREATE TABLE IF NOT EXISTS payout (
        bid_id    TEXT PRIMARY KEY NOT NULL REFERENCES bid(id),
        issuer_id TEXT NOT NULL REFERENCES issuer(id),
        amount    TEXT NOT NULL,
        paid_at   TEXT NOT NULL
    )",
];

/// Row type for the `issuer` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssuerRow {
    pub id: String,
    pub name: String,
    pub balance: String,
}

/// Row type for the `investor` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvestorRow {
    pub id: String,
    pub name: String,
    pub balance: String,
}

/// Row type for the `invoice` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvoiceRow {
    pub id: String,
    pub issuer_id: String,
    pub investor_id: Option<String>,
    pub status: String,
    pub price: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for the `bid` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BidRow {
    pub id: String,
    pub investor_id: String,
    pub invoice_id: String,
    pub amount: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Row type for the `payout` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayoutRow {
    pub bid_id: String,
    pub issuer_id: String,
    pub amount: String,
    pub paid_at: DateTime<Utc>,
}

// === Decoding ===

pub(crate) fn decimal(entity: &'static str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| BidmarketError::CorruptRecord {
        entity,
        reason: format!("bad decimal {raw:?}: {e}"),
    })
}

fn id<T>(entity: &'static str, raw: &str) -> Result<T>
where
    T: FromStr<Err = BidmarketError>,
{
    raw.parse().map_err(|e: BidmarketError| BidmarketError::CorruptRecord {
        entity,
        reason: e.to_string(),
    })
}

impl TryFrom<IssuerRow> for Issuer {
    type Error = BidmarketError;

    fn try_from(row: IssuerRow) -> Result<Self> {
        Ok(Self {
            id: id("issuer", &row.id)?,
            name: row.name,
            balance: decimal("issuer", &row.balance)?,
        })
    }
}

impl TryFrom<InvestorRow> for Investor {
    type Error = BidmarketError;

    fn try_from(row: InvestorRow) -> Result<Self> {
        Ok(Self {
            id: id("investor", &row.id)?,
            name: row.name,
            balance: decimal("investor", &row.balance)?,
        })
    }
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = BidmarketError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        Ok(Self {
            id: id("invoice", &row.id)?,
            issuer_id: id("invoice", &row.issuer_id)?,
            investor_id: row
                .investor_id
                .as_deref()
                .map(|raw| id("invoice", raw))
                .transpose()?,
            status: InvoiceStatus::from_str(&row.status)?,
            price: decimal("invoice", &row.price)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<BidRow> for Bid {
    type Error = BidmarketError;

    fn try_from(row: BidRow) -> Result<Self> {
        Ok(Self {
            id: id("bid", &row.id)?,
            investor_id: id("bid", &row.investor_id)?,
            invoice_id: id("bid", &row.invoice_id)?,
            amount: decimal("bid", &row.amount)?,
            status: BidStatus::from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<PayoutRow> for Payout {
    type Error = BidmarketError;

    fn try_from(row: PayoutRow) -> Result<Self> {
        Ok(Self {
            bid_id: id("payout", &row.bid_id)?,
            issuer_id: id("payout", &row.issuer_id)?,
            amount: decimal("payout", &row.amount)?,
            paid_at: row.paid_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_row_decodes() {
        let bid = Bid::new(
            bidmarket_types::InvestorId::new(),
            bidmarket_types::InvoiceId::new(),
            Decimal::new(10050, 2),
            BidStatus::Pending,
        )
        .unwrap();
        let row = BidRow {
            id: bid.id.to_string(),
            investor_id: bid.investor_id.to_string(),
            invoice_id: bid.invoice_id.to_string(),
            amount: bid.amount.to_string(),
            status: bid.status.as_str().to_string(),
            created_at: bid.created_at,
        };
        assert_eq!(Bid::try_from(row).unwrap(), bid);
    }

    #[test]
    fn bad_decimal_is_corrupt_record() {
        let row = IssuerRow {
            id: bidmarket_types::IssuerId::new().to_string(),
            name: "Acme".into(),
            balance: "12.3.4".into(),
        };
        let err = Issuer::try_from(row).unwrap_err();
        assert!(matches!(err, BidmarketError::CorruptRecord { entity: "issuer", .. }));
    }

    #[test]
    fn bad_status_is_corrupt_record() {
        let row = InvoiceRow {
            id: bidmarket_types::InvoiceId::new().to_string(),
            issuer_id: bidmarket_types::IssuerId::new().to_string(),
            investor_id: None,
            status: "settled".into(),
            price: "10".into(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            Invoice::try_from(row),
            Err(BidmarketError::CorruptRecord { entity: "invoice", .. })
        ));
    }
}
