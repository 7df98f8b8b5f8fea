//! CLI commands. Each returns the JSON document to print.

use std::io::Write;

use bidmarket_types::{BidId, InvestorId, InvoiceId, IssuerId, constants};
use futures::StreamExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::context::AppContext;

/// Ensure the schema exists and report the ledger state.
pub async fn init(ctx: &AppContext) -> anyhow::Result<Value> {
    ctx.store.migrate().await?;
    let report = ctx.queries.audit().await?;
    Ok(json!({
        "engine": constants::ENGINE_NAME,
        "version": constants::VERSION,
        "database": ctx.config.store.url,
        "initialized": true,
        "audit": report,
    }))
}

pub async fn onboard_issuer(
    ctx: &AppContext,
    name: &str,
    balance: Decimal,
) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.onboard_issuer(name, balance).await?)?)
}

pub async fn onboard_investor(
    ctx: &AppContext,
    name: &str,
    balance: Decimal,
) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.onboard_investor(name, balance).await?)?)
}

pub async fn create_invoice(
    ctx: &AppContext,
    issuer: IssuerId,
    price: Decimal,
) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.create_invoice(issuer, price).await?)?)
}

pub async fn place_bid(
    ctx: &AppContext,
    investor: InvestorId,
    invoice: InvoiceId,
    amount: Decimal,
) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.engine.place_bid(investor, invoice, amount).await?)?)
}

pub async fn approve_trade(ctx: &AppContext, bid: BidId) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.engine.approve_trade(bid).await?)?)
}

pub async fn invoice(ctx: &AppContext, id: InvoiceId) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.get_invoice(id).await?)?)
}

pub async fn issuer(ctx: &AppContext, id: IssuerId) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.get_issuer(id).await?)?)
}

pub async fn bids(ctx: &AppContext, invoice: InvoiceId) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(ctx.queries.bids_for_invoice(invoice).await?)?)
}

pub async fn audit(ctx: &AppContext) -> anyhow::Result<Value> {
    let report = ctx.queries.audit().await?;
    if !report.is_healthy() {
        anyhow::bail!("ledger audit failed: {}", serde_json::to_string(&report)?);
    }
    Ok(serde_json::to_value(report)?)
}

/// Stream every investor to `out`, one JSON object per line, as rows
/// arrive. Returns the number written.
pub async fn investors(ctx: &AppContext, out: &mut impl Write) -> anyhow::Result<usize> {
    let mut stream = ctx.queries.investors();
    let mut written = 0;
    while let Some(investor) = stream.next().await {
        serde_json::to_writer(&mut *out, &investor?)?;
        writeln!(out)?;
        written += 1;
    }
    Ok(written)
}
