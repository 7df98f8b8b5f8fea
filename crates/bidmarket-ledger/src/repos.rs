//! Repositories over the ledger tables.
//!
//! Each repo is a unit struct with associated async functions taking the
//! connection to run on. Inside a workflow that is the [`crate::UnitOfWork`];
//! read-only callers pass a pooled connection.

use bidmarket_types::{
    Bid, BidId, BidStatus, BidmarketError, Investor, InvestorId, Invoice, InvoiceId,
    InvoiceStatus, Issuer, IssuerId, Payout, Result,
};
use futures::{StreamExt, stream::BoxStream};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    schema::{BidRow, InvestorRow, InvoiceRow, IssuerRow, PayoutRow},
    store::storage,
};

const BID_COLUMNS: &str = "id, investor_id, invoice_id, amount, status, created_at";

// ============================================================================
// Issuer
// ============================================================================

pub struct IssuerRepo;

impl IssuerRepo {
    pub async fn insert(conn: &mut SqliteConnection, issuer: &Issuer) -> Result<()> {
        sqlx::query("INSERT INTO issuer (id, name, balance) VALUES (?, ?, ?)")
            .bind(issuer.id.to_string())
            .bind(&issuer.name)
            .bind(issuer.balance.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: IssuerId) -> Result<Option<Issuer>> {
        sqlx::query_as::<_, IssuerRow>("SELECT id, name, balance FROM issuer WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?
            .map(Issuer::try_from)
            .transpose()
    }

    /// Like [`IssuerRepo::get`], with absence as `IssuerNotFound`.
    pub async fn require(conn: &mut SqliteConnection, id: IssuerId) -> Result<Issuer> {
        Self::get(conn, id)
            .await?
            .ok_or(BidmarketError::IssuerNotFound(id))
    }
}

// ============================================================================
// Investor
// ============================================================================

pub struct InvestorRepo;

impl InvestorRepo {
    pub async fn insert(conn: &mut SqliteConnection, investor: &Investor) -> Result<()> {
        sqlx::query("INSERT INTO investor (id, name, balance) VALUES (?, ?, ?)")
            .bind(investor.id.to_string())
            .bind(&investor.name)
            .bind(investor.balance.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: InvestorId) -> Result<Option<Investor>> {
        sqlx::query_as::<_, InvestorRow>("SELECT id, name, balance FROM investor WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?
            .map(Investor::try_from)
            .transpose()
    }

    pub async fn require(conn: &mut SqliteConnection, id: InvestorId) -> Result<Investor> {
        Self::get(conn, id)
            .await?
            .ok_or(BidmarketError::InvestorNotFound(id))
    }

    /// Every investor, streamed row by row in id order.
    ///
    /// The stream holds one pooled connection until it is dropped or
    /// exhausted.
    pub fn stream(pool: &SqlitePool) -> BoxStream<'_, Result<Investor>> {
        sqlx::query_as::<_, InvestorRow>("SELECT id, name, balance FROM investor ORDER BY id")
            .fetch(pool)
            .map(|row| row.map_err(storage).and_then(Investor::try_from))
            .boxed()
    }
}

// ============================================================================
// Invoice
// ============================================================================

pub struct InvoiceRepo;

impl InvoiceRepo {
    pub async fn insert(conn: &mut SqliteConnection, invoice: &Invoice) -> Result<()> {
        sqlx::query(
            "INSERT INTO invoice (id, issuer_id, investor_id, status, price, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(invoice.id.to_string())
        .bind(invoice.issuer_id.to_string())
        .bind(invoice.investor_id.map(|id| id.to_string()))
        .bind(invoice.status.as_str())
        .bind(invoice.price.to_string())
        .bind(invoice.created_at)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: InvoiceId) -> Result<Option<Invoice>> {
        sqlx::query_as::<_, InvoiceRow>(
            "SELECT id, issuer_id, investor_id, status, price, created_at \
             FROM invoice WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .map(Invoice::try_from)
        .transpose()
    }

    pub async fn require(conn: &mut SqliteConnection, id: InvoiceId) -> Result<Invoice> {
        Self::get(conn, id)
            .await?
            .ok_or(BidmarketError::InvoiceNotFound(id))
    }

    /// Take the database write lock on behalf of `id`'s workflow.
    ///
    /// A no-op write is issued before any read, so no other writer can
    /// interleave between this workflow's reads and its writes. Fails with
    /// `InvoiceNotFound` when no row matched.
    pub async fn lock(conn: &mut SqliteConnection, id: InvoiceId) -> Result<()> {
        let result = sqlx::query("UPDATE invoice SET status = status WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(BidmarketError::InvoiceNotFound(id));
        }
        Ok(())
    }

    /// Persist `invoice.status` and `invoice.investor_id`.
    pub async fn update_closure(conn: &mut SqliteConnection, invoice: &Invoice) -> Result<()> {
        let result = sqlx::query("UPDATE invoice SET status = ?, investor_id = ? WHERE id = ?")
            .bind(invoice.status.as_str())
            .bind(invoice.investor_id.map(|id| id.to_string()))
            .bind(invoice.id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(BidmarketError::InvoiceNotFound(invoice.id));
        }
        Ok(())
    }

    pub async fn count_by_status(
        conn: &mut SqliteConnection,
        status: InvoiceStatus,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invoice WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(count)
    }

    /// Closed invoices whose winning bid was never paid out. Zero in a
    /// healthy ledger.
    pub async fn closed_without_payout(conn: &mut SqliteConnection) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM invoice \
             WHERE status = 'closed' AND NOT EXISTS ( \
                SELECT 1 FROM payout JOIN bid ON bid.id = payout.bid_id \
                WHERE bid.invoice_id = invoice.id \
             )",
        )
        .fetch_one(&mut *conn)
        .await
        .map_err(storage)?;
        Ok(count)
    }
}

// ============================================================================
// Bid
// ============================================================================

pub struct BidRepo;

impl BidRepo {
    pub async fn insert(conn: &mut SqliteConnection, bid: &Bid) -> Result<()> {
        sqlx::query(
            "INSERT INTO bid (id, investor_id, invoice_id, amount, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(bid.id.to_string())
        .bind(bid.investor_id.to_string())
        .bind(bid.invoice_id.to_string())
        .bind(bid.amount.to_string())
        .bind(bid.status.as_str())
        .bind(bid.created_at)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
        Ok(())
    }

    pub async fn get(conn: &mut SqliteConnection, id: BidId) -> Result<Option<Bid>> {
        sqlx::query_as::<_, BidRow>(&format!("SELECT {BID_COLUMNS} FROM bid WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await
            .map_err(storage)?
            .map(Bid::try_from)
            .transpose()
    }

    pub async fn require(conn: &mut SqliteConnection, id: BidId) -> Result<Bid> {
        Self::get(conn, id).await?.ok_or(BidmarketError::BidNotFound(id))
    }

    /// Bid-keyed counterpart of [`InvoiceRepo::lock`].
    pub async fn lock(conn: &mut SqliteConnection, id: BidId) -> Result<()> {
        let result = sqlx::query("UPDATE bid SET status = status WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(BidmarketError::BidNotFound(id));
        }
        Ok(())
    }

    pub async fn set_status(
        conn: &mut SqliteConnection,
        id: BidId,
        status: BidStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE bid SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(BidmarketError::BidNotFound(id));
        }
        Ok(())
    }

    /// Every bid on an invoice, oldest first.
    pub async fn for_invoice(
        conn: &mut SqliteConnection,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(&format!(
            "SELECT {BID_COLUMNS} FROM bid WHERE invoice_id = ? ORDER BY created_at, id"
        ))
        .bind(invoice_id.to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Bid::try_from).collect()
    }

    /// Pending and approved bids on an invoice, oldest first.
    pub async fn live_for_invoice(
        conn: &mut SqliteConnection,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Bid>> {
        let rows = sqlx::query_as::<_, BidRow>(&format!(
            "SELECT {BID_COLUMNS} FROM bid \
             WHERE invoice_id = ? AND status IN ('pending', 'approved') \
             ORDER BY created_at, id"
        ))
        .bind(invoice_id.to_string())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage)?;
        rows.into_iter().map(Bid::try_from).collect()
    }

    /// Number of invoices carrying more than one live bid. Zero in a healthy
    /// ledger.
    pub async fn invoices_with_multiple_live_bids(conn: &mut SqliteConnection) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM ( \
                SELECT invoice_id FROM bid WHERE status IN ('pending', 'approved') \
                GROUP BY invoice_id HAVING COUNT(*) > 1 \
             )",
        )
        .fetch_one(&mut *conn)
        .await
        .map_err(storage)?;
        Ok(count)
    }

    pub async fn count_by_status(conn: &mut SqliteConnection, status: BidStatus) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bid WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(count)
    }
}

// ============================================================================
// Payout
// ============================================================================

/// One row per bid whose amount has been paid to the issuer.
pub struct PayoutRepo;

impl PayoutRepo {
    /// Record a payout unless one already exists for the bid.
    ///
    /// Returns `true` if this call inserted the row, `false` if the bid was
    /// already paid out.
    pub async fn insert_if_absent(conn: &mut SqliteConnection, payout: &Payout) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO payout (bid_id, issuer_id, amount, paid_at) VALUES (?, ?, ?, ?)",
        )
        .bind(payout.bid_id.to_string())
        .bind(payout.issuer_id.to_string())
        .bind(payout.amount.to_string())
        .bind(payout.paid_at)
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get(conn: &mut SqliteConnection, bid_id: BidId) -> Result<Option<Payout>> {
        sqlx::query_as::<_, PayoutRow>(
            "SELECT bid_id, issuer_id, amount, paid_at FROM payout WHERE bid_id = ?",
        )
        .bind(bid_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?
        .map(Payout::try_from)
        .transpose()
    }

    pub async fn exists(conn: &mut SqliteConnection, bid_id: BidId) -> Result<bool> {
        let (found,): (i64,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM payout WHERE bid_id = ?)")
                .bind(bid_id.to_string())
                .fetch_one(&mut *conn)
                .await
                .map_err(storage)?;
        Ok(found != 0)
    }

    pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payout")
            .fetch_one(&mut *conn)
            .await
            .map_err(storage)?;
        Ok(count)
    }
}
