//! Bid lifecycle resolver.
//!
//! Decides what happens to the bids of an invoice when a new bid arrives or
//! a trade is approved:
//! 1. Every live bid other than the one being kept is closed
//! 2. Each closed bid that was never paid out is refunded to its investor
//! 3. A new bid approves iff its amount equals the invoice price exactly

use bidmarket_ledger::{BidRepo, PayoutRepo, balance};
use bidmarket_types::{BidId, BidStatus, InvoiceId, RefundedBid, Result};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;

/// Close every pending or approved bid on `invoice_id` except `keep`.
///
/// Returns the bids to refund. A bid that already has a payout is closed but
/// left out of the list: its funds belong to the issuer.
pub async fn supersede_standing_bids(
    conn: &mut SqliteConnection,
    invoice_id: InvoiceId,
    keep: Option<BidId>,
) -> Result<Vec<RefundedBid>> {
    let live = BidRepo::live_for_invoice(conn, invoice_id).await?;
    let mut refunds = Vec::with_capacity(live.len());

    for bid in live.into_iter().filter(|bid| Some(bid.id) != keep) {
        let closed = bid.with_status(BidStatus::Closed)?;
        BidRepo::set_status(conn, closed.id, closed.status).await?;

        if PayoutRepo::exists(conn, bid.id).await? {
            tracing::warn!(
                bid = %bid.id,
                invoice = %invoice_id,
                "Paid-out bid closed without refund"
            );
            continue;
        }
        refunds.push(RefundedBid {
            bid_id: bid.id,
            investor_id: bid.investor_id,
            amount: bid.amount,
        });
    }

    Ok(refunds)
}

/// Status of a freshly placed bid against the invoice's asking price.
#[must_use]
pub fn resolve(bid_amount: Decimal, invoice_price: Decimal) -> BidStatus {
    if bid_amount == invoice_price {
        BidStatus::Approved
    } else {
        BidStatus::Pending
    }
}

/// Credit each displaced investor with the amount of their refunded bid.
pub async fn refund(conn: &mut SqliteConnection, refunds: &[RefundedBid]) -> Result<()> {
    for refunded in refunds {
        balance::credit_investor(conn, refunded.investor_id, refunded.amount).await?;
        tracing::debug!(
            bid = %refunded.bid_id,
            investor = %refunded.investor_id,
            amount = %refunded.amount,
            "Superseded bid refunded"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bidmarket_ledger::{InvestorRepo, InvoiceRepo, IssuerRepo, LedgerStore};
    use bidmarket_types::{Bid, Investor, Invoice, Issuer, Payout};
    use chrono::Utc;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn exact_price_approves() {
        assert_eq!(resolve(dec(100), dec(100)), BidStatus::Approved);
        assert_eq!(resolve(Decimal::new(10000, 2), dec(100)), BidStatus::Approved);
    }

    #[test]
    fn near_price_stays_pending() {
        assert_eq!(resolve(Decimal::new(9999, 2), dec(100)), BidStatus::Pending);
        assert_eq!(resolve(Decimal::new(10001, 2), dec(100)), BidStatus::Pending);
    }

    struct Fixture {
        store: LedgerStore,
        alice: Investor,
        bob: Investor,
        issuer: Issuer,
        invoice: Invoice,
    }

    async fn fixture() -> Fixture {
        let store = LedgerStore::in_memory().await.unwrap();
        let issuer = Issuer::onboard("Acme", Decimal::ZERO).unwrap();
        let alice = Investor::onboard("Alice", dec(100)).unwrap();
        let bob = Investor::onboard("Bob", dec(100)).unwrap();
        let invoice = Invoice::open(issuer.id, dec(100)).unwrap();
        let mut uow = store.begin().await.unwrap();
        IssuerRepo::insert(&mut uow, &issuer).await.unwrap();
        InvestorRepo::insert(&mut uow, &alice).await.unwrap();
        InvestorRepo::insert(&mut uow, &bob).await.unwrap();
        InvoiceRepo::insert(&mut uow, &invoice).await.unwrap();
        uow.commit().await.unwrap();
        Fixture {
            store,
            alice,
            bob,
            issuer,
            invoice,
        }
    }

    #[tokio::test]
    async fn supersede_closes_all_but_kept() {
        let f = fixture().await;
        let mut uow = f.store.begin().await.unwrap();
        let a = Bid::new(f.alice.id, f.invoice.id, dec(40), BidStatus::Pending).unwrap();
        let b = Bid::new(f.bob.id, f.invoice.id, dec(60), BidStatus::Pending).unwrap();
        BidRepo::insert(&mut uow, &a).await.unwrap();
        BidRepo::insert(&mut uow, &b).await.unwrap();

        let refunds = supersede_standing_bids(&mut uow, f.invoice.id, Some(b.id))
            .await
            .unwrap();
        assert_eq!(
            refunds,
            vec![RefundedBid {
                bid_id: a.id,
                investor_id: f.alice.id,
                amount: dec(40),
            }]
        );
        let live = BidRepo::live_for_invoice(&mut uow, f.invoice.id).await.unwrap();
        assert_eq!(live.iter().map(|bid| bid.id).collect::<Vec<_>>(), vec![b.id]);
    }

    #[tokio::test]
    async fn supersede_with_no_live_bids_is_empty() {
        let f = fixture().await;
        let mut uow = f.store.begin().await.unwrap();
        let refunds = supersede_standing_bids(&mut uow, f.invoice.id, None).await.unwrap();
        assert!(refunds.is_empty());
    }

    #[tokio::test]
    async fn paid_out_bid_is_closed_without_refund() {
        let f = fixture().await;
        let mut uow = f.store.begin().await.unwrap();
        let paid = Bid::new(f.alice.id, f.invoice.id, dec(100), BidStatus::Approved).unwrap();
        BidRepo::insert(&mut uow, &paid).await.unwrap();
        PayoutRepo::insert_if_absent(
            &mut uow,
            &Payout {
                bid_id: paid.id,
                issuer_id: f.issuer.id,
                amount: paid.amount,
                paid_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let refunds = supersede_standing_bids(&mut uow, f.invoice.id, None).await.unwrap();
        assert!(refunds.is_empty());
        let stored = BidRepo::require(&mut uow, paid.id).await.unwrap();
        assert_eq!(stored.status, BidStatus::Closed);
    }

    #[tokio::test]
    async fn refund_credits_each_investor() {
        let f = fixture().await;
        let mut uow = f.store.begin().await.unwrap();
        let refunds = vec![
            RefundedBid {
                bid_id: BidId::new(),
                investor_id: f.alice.id,
                amount: dec(10),
            },
            RefundedBid {
                bid_id: BidId::new(),
                investor_id: f.bob.id,
                amount: Decimal::new(255, 1),
            },
        ];
        refund(&mut uow, &refunds).await.unwrap();
        assert_eq!(balance::investor_balance(&mut uow, f.alice.id).await.unwrap(), dec(110));
        assert_eq!(
            balance::investor_balance(&mut uow, f.bob.id).await.unwrap(),
            Decimal::new(1255, 1)
        );
    }
}
