//! Settlement Engine: the PlaceBid and ApproveTrade workflows.
//!
//! Each workflow runs as exactly one [`UnitOfWork`]:
//! 1. Take the write lock (no-op write on the invoice or bid row)
//! 2. Re-read every balance and status it depends on
//! 3. Move money and update statuses
//! 4. Optionally re-measure total supply
//! 5. Commit
//!
//! Any error, timeout or cancellation before step 5 drops the unit of work
//! and rolls every effect back.

use std::future::Future;

use bidmarket_ledger::{BidRepo, InvoiceRepo, LedgerStore, UnitOfWork, balance};
use bidmarket_types::{
    Bid, BidId, BidStatus, BidmarketError, EngineConfig, InvestorId, InvoiceId, RefundedBid,
    Result, money,
};
use rust_decimal::Decimal;

use crate::{
    idempotency::{PayoutGuard, PayoutOutcome},
    resolver,
    supply_conservation::{SupplyConservation, SupplySnapshot},
};

/// Runs settlement workflows against an injected [`LedgerStore`].
///
/// Holds no state of its own between calls; clones share the store.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    store: LedgerStore,
    config: EngineConfig,
}

/// What a workflow did, for logging.
struct Settled {
    bid: Bid,
    refunds: Vec<RefundedBid>,
    payout: Option<PayoutOutcome>,
}

impl SettlementEngine {
    #[must_use]
    pub fn new(store: LedgerStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Place a bid of `amount` by `investor_id` on `invoice_id`.
    ///
    /// The amount is escrowed from the investor, every standing bid on the
    /// invoice is superseded and refunded, and the new bid is approved iff
    /// `amount` equals the invoice price exactly. An approved bid closes the
    /// invoice and pays the issuer in the same unit of work.
    ///
    /// # Errors
    /// - `InvalidArgument` if `amount` ≤ 0 (checked before any storage access)
    /// - `InvoiceNotFound` / `InvestorNotFound`
    /// - `InvoiceClosed` if the invoice is no longer open
    /// - `InsufficientFunds` if the investor cannot cover `amount`
    /// - `Timeout` if the workflow exceeds the configured deadline
    pub async fn place_bid(
        &self,
        investor_id: InvestorId,
        invoice_id: InvoiceId,
        amount: Decimal,
    ) -> Result<Bid> {
        money::ensure_positive("amount", amount)?;

        match self
            .with_deadline(self.run_place_bid(investor_id, invoice_id, amount))
            .await
        {
            Ok(settled) => {
                tracing::info!(
                    bid = %settled.bid.id,
                    invoice = %invoice_id,
                    investor = %investor_id,
                    status = %settled.bid.status,
                    refunds = settled.refunds.len(),
                    "Bid placed"
                );
                Ok(settled.bid)
            }
            Err(err) => {
                tracing::warn!(
                    invoice = %invoice_id,
                    investor = %investor_id,
                    amount = %amount,
                    error = %err,
                    "PlaceBid rejected"
                );
                Err(err)
            }
        }
    }

    /// Settle the trade represented by `bid_id`.
    ///
    /// Closes the invoice to the bid's investor, refunds any other live bid,
    /// pays the issuer if the bid has not been paid yet and closes the bid.
    /// Approving a bid that was already settled returns it unchanged.
    ///
    /// # Errors
    /// - `BidNotFound`
    /// - `BidSuperseded` if the bid was refunded by a newer bid
    /// - `InvoiceAlreadyClosedWithDifferentInvestor`
    /// - `Timeout`
    pub async fn approve_trade(&self, bid_id: BidId) -> Result<Bid> {
        match self.with_deadline(self.run_approve_trade(bid_id)).await {
            Ok(settled) => {
                tracing::info!(
                    bid = %bid_id,
                    invoice = %settled.bid.invoice_id,
                    investor = %settled.bid.investor_id,
                    refunds = settled.refunds.len(),
                    paid = ?settled.payout,
                    "Trade approved"
                );
                Ok(settled.bid)
            }
            Err(err) => {
                tracing::warn!(bid = %bid_id, error = %err, "ApproveTrade rejected");
                Err(err)
            }
        }
    }

    async fn run_place_bid(
        &self,
        investor_id: InvestorId,
        invoice_id: InvoiceId,
        amount: Decimal,
    ) -> Result<Settled> {
        let mut uow = self.store.begin().await?;

        InvoiceRepo::lock(&mut uow, invoice_id).await?;
        let invoice = InvoiceRepo::require(&mut uow, invoice_id).await?;
        if !invoice.is_open() {
            return Err(BidmarketError::InvoiceClosed(invoice_id));
        }
        let before = self.measure_supply(&mut uow).await?;

        balance::check_sufficient_balance(&mut uow, investor_id, amount).await?;
        balance::debit_investor(&mut uow, investor_id, amount).await?;

        let refunds = resolver::supersede_standing_bids(&mut uow, invoice_id, None).await?;
        resolver::refund(&mut uow, &refunds).await?;

        let bid = Bid::new(
            investor_id,
            invoice_id,
            amount,
            resolver::resolve(amount, invoice.price),
        )?;
        BidRepo::insert(&mut uow, &bid).await?;

        let mut payout = None;
        if bid.status == BidStatus::Approved {
            let closed = invoice.closed_to(investor_id)?;
            InvoiceRepo::update_closure(&mut uow, &closed).await?;
            payout = Some(PayoutGuard::settle_once(&mut uow, &bid, invoice.issuer_id).await?);
        }

        self.verify_standing(&mut uow, invoice_id, bid.amount).await?;
        self.verify_supply(&mut uow, before).await?;
        uow.commit().await?;
        Ok(Settled {
            bid,
            refunds,
            payout,
        })
    }

    async fn run_approve_trade(&self, bid_id: BidId) -> Result<Settled> {
        let mut uow = self.store.begin().await?;

        BidRepo::lock(&mut uow, bid_id).await?;
        let bid = BidRepo::require(&mut uow, bid_id).await?;
        let invoice = InvoiceRepo::require(&mut uow, bid.invoice_id).await?;

        if !bid.is_live() {
            if !PayoutGuard::is_paid(&mut uow, &bid).await? {
                return Err(BidmarketError::BidSuperseded(bid_id));
            }
            // Replay of a settled trade: the invoice must agree on the winner.
            if invoice.closed_to(bid.investor_id)? != invoice {
                return Err(BidmarketError::CorruptRecord {
                    entity: "invoice",
                    reason: format!("invoice {} is open but bid {bid_id} was paid", invoice.id),
                });
            }
            return Ok(Settled {
                bid,
                refunds: Vec::new(),
                payout: Some(PayoutOutcome::AlreadyPaid),
            });
        }

        let before = self.measure_supply(&mut uow).await?;

        let closed = invoice.closed_to(bid.investor_id)?;
        if closed != invoice {
            InvoiceRepo::update_closure(&mut uow, &closed).await?;
        }

        let refunds = resolver::supersede_standing_bids(&mut uow, invoice.id, Some(bid_id)).await?;
        resolver::refund(&mut uow, &refunds).await?;

        let payout = PayoutGuard::settle_once(&mut uow, &bid, invoice.issuer_id).await?;

        let settled = bid.with_status(BidStatus::Closed)?;
        BidRepo::set_status(&mut uow, settled.id, settled.status).await?;

        self.verify_standing(&mut uow, invoice.id, Decimal::ZERO).await?;
        self.verify_supply(&mut uow, before).await?;
        uow.commit().await?;
        Ok(Settled {
            bid: settled,
            refunds,
            payout: Some(payout),
        })
    }

    /// Bound `workflow` by the configured deadline. On expiry the workflow
    /// future is dropped, which rolls back its unit of work.
    async fn with_deadline<T>(&self, workflow: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.workflow_timeout(), workflow)
            .await
            .unwrap_or(Err(BidmarketError::Timeout {
                after_ms: self.config.workflow_timeout_ms,
            }))
    }

    async fn measure_supply(&self, uow: &mut UnitOfWork) -> Result<Option<SupplySnapshot>> {
        if !self.config.verify_conservation {
            return Ok(None);
        }
        SupplySnapshot::measure(uow).await.map(Some)
    }

    /// With conservation checks on, the live bids left on `invoice_id` must
    /// add up to `expected`: the new bid after PlaceBid, nothing after
    /// ApproveTrade.
    async fn verify_standing(
        &self,
        uow: &mut UnitOfWork,
        invoice_id: InvoiceId,
        expected: Decimal,
    ) -> Result<()> {
        if !self.config.verify_conservation {
            return Ok(());
        }
        let standing = balance::live_bid_total(uow, invoice_id).await?;
        if standing != expected {
            tracing::error!(
                invoice = %invoice_id,
                standing = %standing,
                expected = %expected,
                "Standing bids out of step, rolling back"
            );
            return Err(BidmarketError::SupplyInvariantViolation {
                reason: format!(
                    "invoice {invoice_id} holds {standing} in live bids, expected {expected}"
                ),
            });
        }
        Ok(())
    }

    async fn verify_supply(
        &self,
        uow: &mut UnitOfWork,
        before: Option<SupplySnapshot>,
    ) -> Result<()> {
        let Some(before) = before else {
            return Ok(());
        };
        let after = SupplySnapshot::measure(uow).await?;
        SupplyConservation::verify(&before, &after).inspect_err(|err| {
            tracing::error!(error = %err, "Supply drift detected, rolling back");
        })
    }
}
