//! Read-side queries, invoice creation and onboarding.

use bidmarket_ledger::{
    BidRepo, InvestorRepo, InvoiceRepo, IssuerRepo, LedgerStore, PayoutRepo, storage,
};
use bidmarket_types::{
    Bid, BidId, Investor, InvestorId, Invoice, InvoiceId, InvoiceStatus, Issuer, IssuerId, Result,
};
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Sqlite, pool::PoolConnection};

use crate::supply_conservation::SupplySnapshot;

/// Ledger health summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub supply: SupplySnapshot,
    pub total_supply: Decimal,
    pub open_invoices: i64,
    pub closed_invoices: i64,
    pub payouts: i64,
    /// Must be zero: at most one live bid per invoice.
    pub invoices_with_multiple_live_bids: i64,
    /// Must be zero: every closed invoice has been paid out.
    pub closed_invoices_without_payout: i64,
}

impl AuditReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.invoices_with_multiple_live_bids == 0 && self.closed_invoices_without_payout == 0
    }
}

#[derive(Debug, Clone)]
pub struct MarketQueries {
    store: LedgerStore,
}

impl MarketQueries {
    #[must_use]
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    async fn conn(&self) -> Result<PoolConnection<Sqlite>> {
        self.store.pool().acquire().await.map_err(storage)
    }

    /// Create an open invoice of `price` owned by `issuer_id`.
    ///
    /// # Errors
    /// - `InvalidArgument` if `price` ≤ 0
    /// - `IssuerNotFound`
    pub async fn create_invoice(&self, issuer_id: IssuerId, price: Decimal) -> Result<Invoice> {
        let invoice = Invoice::open(issuer_id, price)?;
        let mut uow = self.store.begin().await?;
        IssuerRepo::require(&mut uow, issuer_id).await?;
        InvoiceRepo::insert(&mut uow, &invoice).await?;
        uow.commit().await?;
        tracing::info!(
            invoice = %invoice.id,
            issuer = %issuer_id,
            price = %price,
            "Invoice created"
        );
        Ok(invoice)
    }

    pub async fn onboard_issuer(&self, name: &str, balance: Decimal) -> Result<Issuer> {
        let issuer = Issuer::onboard(name, balance)?;
        let mut uow = self.store.begin().await?;
        IssuerRepo::insert(&mut uow, &issuer).await?;
        uow.commit().await?;
        tracing::info!(issuer = %issuer.id, name = %issuer.name, "Issuer onboarded");
        Ok(issuer)
    }

    pub async fn onboard_investor(&self, name: &str, balance: Decimal) -> Result<Investor> {
        let investor = Investor::onboard(name, balance)?;
        let mut uow = self.store.begin().await?;
        InvestorRepo::insert(&mut uow, &investor).await?;
        uow.commit().await?;
        tracing::info!(investor = %investor.id, name = %investor.name, "Investor onboarded");
        Ok(investor)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice> {
        InvoiceRepo::require(&mut *self.conn().await?, id).await
    }

    pub async fn get_issuer(&self, id: IssuerId) -> Result<Issuer> {
        IssuerRepo::require(&mut *self.conn().await?, id).await
    }

    pub async fn get_investor(&self, id: InvestorId) -> Result<Investor> {
        InvestorRepo::require(&mut *self.conn().await?, id).await
    }

    pub async fn get_bid(&self, id: BidId) -> Result<Bid> {
        BidRepo::require(&mut *self.conn().await?, id).await
    }

    /// Every bid ever placed on the invoice, oldest first.
    pub async fn bids_for_invoice(&self, id: InvoiceId) -> Result<Vec<Bid>> {
        let mut conn = self.conn().await?;
        InvoiceRepo::require(&mut conn, id).await?;
        BidRepo::for_invoice(&mut conn, id).await
    }

    /// Lazy stream of every investor. A row that fails to load yields an
    /// `Err` item; callers should stop at the first one.
    pub fn investors(&self) -> BoxStream<'_, Result<Investor>> {
        InvestorRepo::stream(self.store.pool())
    }

    /// Consistent snapshot of supply totals and ledger invariants.
    pub async fn audit(&self) -> Result<AuditReport> {
        let mut uow = self.store.begin().await?;
        let supply = SupplySnapshot::measure(&mut uow).await?;
        let report = AuditReport {
            total_supply: supply.total()?,
            supply,
            open_invoices: InvoiceRepo::count_by_status(&mut uow, InvoiceStatus::Open).await?,
            closed_invoices: InvoiceRepo::count_by_status(&mut uow, InvoiceStatus::Closed).await?,
            payouts: PayoutRepo::count(&mut uow).await?,
            invoices_with_multiple_live_bids: BidRepo::invoices_with_multiple_live_bids(&mut uow)
                .await?,
            closed_invoices_without_payout: InvoiceRepo::closed_without_payout(&mut uow).await?,
        };
        uow.rollback().await?;
        if !report.is_healthy() {
            tracing::error!(?report, "Ledger audit failed");
        }
        Ok(report)
    }
}
