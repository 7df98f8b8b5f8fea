//! Balance operations on issuer and investor accounts.
//!
//! Every function runs on the connection of an open [`crate::UnitOfWork`]
//! and never commits on its own: a failure later in the workflow rolls the
//! movement back with everything else. Arithmetic happens on [`Decimal`]
//! in Rust; the database only stores the result.

use bidmarket_types::{BidmarketError, InvestorId, InvoiceId, IssuerId, Result, money};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

use crate::{schema::decimal, store::storage};

/// Read an investor's balance and check it covers `amount`.
///
/// Returns the balance read.
///
/// # Errors
/// - `InvestorNotFound` if the investor does not exist
/// - `InsufficientFunds` if balance < amount
pub async fn check_sufficient_balance(
    conn: &mut SqliteConnection,
    investor_id: InvestorId,
    amount: Decimal,
) -> Result<Decimal> {
    let available = investor_balance(conn, investor_id).await?;
    if available < amount {
        return Err(BidmarketError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    Ok(available)
}

/// Escrow `amount` out of an investor's balance. Returns the new balance.
///
/// Callers check sufficiency first in the same unit of work; this still
/// refuses to drive a balance negative.
pub async fn debit_investor(
    conn: &mut SqliteConnection,
    investor_id: InvestorId,
    amount: Decimal,
) -> Result<Decimal> {
    let available = check_sufficient_balance(conn, investor_id, amount).await?;
    let balance = money::checked_sub("investor balance", available, amount)?;
    write_investor_balance(conn, investor_id, balance).await?;
    tracing::debug!(
        investor = %investor_id,
        amount = %amount,
        balance = %balance,
        "Investor debited"
    );
    Ok(balance)
}

/// Return `amount` to an investor (refund of a superseded bid).
/// Returns the new balance, or `InvalidArgument` if it would overflow.
pub async fn credit_investor(
    conn: &mut SqliteConnection,
    investor_id: InvestorId,
    amount: Decimal,
) -> Result<Decimal> {
    let current = investor_balance(conn, investor_id).await?;
    let balance = money::checked_add("investor balance", current, amount)?;
    write_investor_balance(conn, investor_id, balance).await?;
    tracing::debug!(
        investor = %investor_id,
        amount = %amount,
        balance = %balance,
        "Investor credited"
    );
    Ok(balance)
}

/// Pay `amount` to an issuer (trade payout). Returns the new balance.
///
/// # Errors
/// `InvalidArgument` if the new balance would overflow.
pub async fn credit_issuer(
    conn: &mut SqliteConnection,
    issuer_id: IssuerId,
    amount: Decimal,
) -> Result<Decimal> {
    let current = issuer_balance(conn, issuer_id).await?;
    let balance = money::checked_add("issuer balance", current, amount)?;
    sqlx::query("UPDATE issuer SET balance = ? WHERE id = ?")
        .bind(balance.to_string())
        .bind(issuer_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
    tracing::debug!(
        issuer = %issuer_id,
        amount = %amount,
        balance = %balance,
        "Issuer credited"
    );
    Ok(balance)
}

/// Current balance of one investor.
pub async fn investor_balance(
    conn: &mut SqliteConnection,
    investor_id: InvestorId,
) -> Result<Decimal> {
    let row: Option<(String,)> = sqlx::query_as("SELECT balance FROM investor WHERE id = ?")
        .bind(investor_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?;
    let (raw,) = row.ok_or(BidmarketError::InvestorNotFound(investor_id))?;
    decimal("investor", &raw)
}

/// Current balance of one issuer.
pub async fn issuer_balance(conn: &mut SqliteConnection, issuer_id: IssuerId) -> Result<Decimal> {
    let row: Option<(String,)> = sqlx::query_as("SELECT balance FROM issuer WHERE id = ?")
        .bind(issuer_id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage)?;
    let (raw,) = row.ok_or(BidmarketError::IssuerNotFound(issuer_id))?;
    decimal("issuer", &raw)
}

async fn write_investor_balance(
    conn: &mut SqliteConnection,
    investor_id: InvestorId,
    balance: Decimal,
) -> Result<()> {
    let result = sqlx::query("UPDATE investor SET balance = ? WHERE id = ?")
        .bind(balance.to_string())
        .bind(investor_id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(storage)?;
    if result.rows_affected() == 0 {
        return Err(BidmarketError::InvestorNotFound(investor_id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

/// Sum of all investor balances.
pub async fn total_investor_balance(conn: &mut SqliteConnection) -> Result<Decimal> {
    sum_column(conn, "investor", "SELECT balance FROM investor").await
}

/// Sum of all issuer balances.
pub async fn total_issuer_balance(conn: &mut SqliteConnection) -> Result<Decimal> {
    sum_column(conn, "issuer", "SELECT balance FROM issuer").await
}

/// Funds currently held in escrow: live bids that have not been paid out.
pub async fn live_escrow_total(conn: &mut SqliteConnection) -> Result<Decimal> {
    sum_column(
        conn,
        "bid",
        "SELECT amount FROM bid \
         WHERE status IN ('pending', 'approved') \
           AND NOT EXISTS (SELECT 1 FROM payout WHERE payout.bid_id = bid.id)",
    )
    .await
}

/// Sum of live bid amounts on one invoice.
pub async fn live_bid_total(conn: &mut SqliteConnection, invoice_id: InvoiceId) -> Result<Decimal> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT amount FROM bid WHERE invoice_id = ? AND status IN ('pending', 'approved')",
    )
    .bind(invoice_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .map_err(storage)?;
    sum_rows("bid", &rows)
}

async fn sum_column(
    conn: &mut SqliteConnection,
    entity: &'static str,
    sql: &'static str,
) -> Result<Decimal> {
    let rows: Vec<(String,)> = sqlx::query_as(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage)?;
    sum_rows(entity, &rows)
}

/// A stored total that overflows `Decimal` means the ledger itself is broken.
fn sum_rows(entity: &'static str, rows: &[(String,)]) -> Result<Decimal> {
    rows.iter().try_fold(Decimal::ZERO, |acc, (raw,)| {
        let value = decimal(entity, raw)?;
        acc.checked_add(value)
            .ok_or_else(|| BidmarketError::SupplyInvariantViolation {
                reason: format!("{entity} total overflows at {acc} + {value}"),
            })
    })
}

#[cfg(test)]
mod tests {
    use bidmarket_types::{Bid, BidStatus, Investor, Invoice, Issuer};

    use super::*;
    use crate::{
        LedgerStore,
        repos::{BidRepo, InvestorRepo, InvoiceRepo, IssuerRepo},
    };

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    async fn setup() -> (LedgerStore, Investor, Issuer) {
        let store = LedgerStore::in_memory().await.unwrap();
        let investor = Investor::onboard("Alice", dec(1000)).unwrap();
        let issuer = Issuer::onboard("Acme", dec(0)).unwrap();
        let mut uow = store.begin().await.unwrap();
        InvestorRepo::insert(&mut uow, &investor).await.unwrap();
        IssuerRepo::insert(&mut uow, &issuer).await.unwrap();
        uow.commit().await.unwrap();
        (store, investor, issuer)
    }

    #[tokio::test]
    async fn check_insufficient_fails() {
        let (store, alice, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        let err = check_sufficient_balance(&mut uow, alice.id, dec(1001))
            .await
            .unwrap_err();
        assert!(matches!(err, BidmarketError::InsufficientFunds { .. }));
        assert_eq!(
            check_sufficient_balance(&mut uow, alice.id, dec(1000)).await.unwrap(),
            dec(1000)
        );
    }

    #[tokio::test]
    async fn check_unknown_investor_not_found() {
        let (store, _, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        let ghost = InvestorId::new();
        let err = check_sufficient_balance(&mut uow, ghost, dec(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BidmarketError::InvestorNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn debit_then_credit_restores() {
        let (store, alice, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            debit_investor(&mut uow, alice.id, Decimal::new(25050, 2)).await.unwrap(),
            Decimal::new(74950, 2)
        );
        assert_eq!(
            credit_investor(&mut uow, alice.id, Decimal::new(25050, 2)).await.unwrap(),
            dec(1000)
        );
    }

    #[tokio::test]
    async fn debit_refuses_overdraft() {
        let (store, alice, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        assert!(debit_investor(&mut uow, alice.id, dec(2000)).await.is_err());
        assert_eq!(investor_balance(&mut uow, alice.id).await.unwrap(), dec(1000));
    }

    #[tokio::test]
    async fn credit_unknown_issuer_not_found() {
        let (store, _, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        let err = credit_issuer(&mut uow, IssuerId::new(), dec(5)).await.unwrap_err();
        assert!(matches!(err, BidmarketError::IssuerNotFound(_)));
    }

    #[tokio::test]
    async fn decimal_arithmetic_is_exact() {
        let (store, _, acme) = setup().await;
        let mut uow = store.begin().await.unwrap();
        // 0.1 added ten times must be exactly 1 (REAL storage would drift).
        for _ in 0..10 {
            credit_issuer(&mut uow, acme.id, Decimal::new(1, 1)).await.unwrap();
        }
        assert_eq!(issuer_balance(&mut uow, acme.id).await.unwrap(), dec(1));
        assert_eq!(total_issuer_balance(&mut uow).await.unwrap(), dec(1));
        assert_eq!(total_investor_balance(&mut uow).await.unwrap(), dec(1000));
    }

    #[tokio::test]
    async fn uncommitted_debit_is_rolled_back() {
        let (store, alice, _) = setup().await;
        {
            let mut uow = store.begin().await.unwrap();
            debit_investor(&mut uow, alice.id, dec(400)).await.unwrap();
            uow.rollback().await.unwrap();
        }
        let mut uow = store.begin().await.unwrap();
        assert_eq!(investor_balance(&mut uow, alice.id).await.unwrap(), dec(1000));
    }

    #[tokio::test]
    async fn credit_past_decimal_range_is_rejected() {
        let (store, alice, _) = setup().await;
        let rich = Issuer::onboard("Vault", Decimal::MAX).unwrap();
        let mut uow = store.begin().await.unwrap();
        IssuerRepo::insert(&mut uow, &rich).await.unwrap();

        let err = credit_issuer(&mut uow, rich.id, dec(10)).await.unwrap_err();
        assert!(matches!(err, BidmarketError::InvalidArgument { .. }), "got: {err:?}");
        assert_eq!(issuer_balance(&mut uow, rich.id).await.unwrap(), Decimal::MAX);

        // Acme holds 0, so the sum still fits.
        assert_eq!(total_issuer_balance(&mut uow).await.unwrap(), Decimal::MAX);

        credit_investor(&mut uow, alice.id, Decimal::MAX - dec(1000)).await.unwrap();
        assert!(credit_investor(&mut uow, alice.id, dec(1)).await.is_err());
    }

    #[tokio::test]
    async fn overflowing_total_is_an_invariant_violation() {
        let (store, _, _) = setup().await;
        let mut uow = store.begin().await.unwrap();
        for name in ["Vault", "Reserve"] {
            let issuer = Issuer::onboard(name, Decimal::MAX).unwrap();
            IssuerRepo::insert(&mut uow, &issuer).await.unwrap();
        }
        let err = total_issuer_balance(&mut uow).await.unwrap_err();
        assert!(matches!(err, BidmarketError::SupplyInvariantViolation { .. }));
    }

    #[tokio::test]
    async fn live_bid_total_skips_closed_bids() {
        let (store, alice, acme) = setup().await;
        let invoice = Invoice::open(acme.id, dec(100)).unwrap();
        let other = Invoice::open(acme.id, dec(100)).unwrap();
        let mut uow = store.begin().await.unwrap();
        InvoiceRepo::insert(&mut uow, &invoice).await.unwrap();
        InvoiceRepo::insert(&mut uow, &other).await.unwrap();
        assert_eq!(live_bid_total(&mut uow, invoice.id).await.unwrap(), Decimal::ZERO);

        let old = Bid::new(alice.id, invoice.id, dec(40), BidStatus::Pending).unwrap();
        let standing = Bid::new(alice.id, invoice.id, dec(60), BidStatus::Pending).unwrap();
        let elsewhere = Bid::new(alice.id, other.id, dec(7), BidStatus::Pending).unwrap();
        for bid in [&old, &standing, &elsewhere] {
            BidRepo::insert(&mut uow, bid).await.unwrap();
        }
        assert_eq!(live_bid_total(&mut uow, invoice.id).await.unwrap(), dec(100));

        BidRepo::set_status(&mut uow, old.id, BidStatus::Closed).await.unwrap();
        assert_eq!(live_bid_total(&mut uow, invoice.id).await.unwrap(), dec(60));
        assert_eq!(live_bid_total(&mut uow, other.id).await.unwrap(), dec(7));
    }
}
