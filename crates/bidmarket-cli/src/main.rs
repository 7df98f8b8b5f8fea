//! Bidmarket CLI - Main entry point

use std::path::PathBuf;

use bidmarket_cli::{AppContext, commands, context::resolve_config};
use bidmarket_types::{BidId, InvestorId, InvoiceId, IssuerId, constants};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bidmarket")]
#[command(about = "Bidmarket - invoice marketplace settlement", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults to ./config/config.json if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite URL, overrides store.url
    #[arg(short, long)]
    database: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema if missing
    Init,

    /// Register an issuer
    OnboardIssuer {
        name: String,
        #[arg(long, default_value = "0")]
        balance: Decimal,
    },

    /// Register an investor with an opening balance
    OnboardInvestor {
        name: String,
        #[arg(long, default_value = "0")]
        balance: Decimal,
    },

    /// Put an invoice up for bidding
    CreateInvoice {
        /// Issuer ID
        issuer: IssuerId,
        /// Asking price
        price: Decimal,
    },

    /// Bid on an invoice; escrows the amount
    PlaceBid {
        /// Investor ID
        investor: InvestorId,
        /// Invoice ID
        invoice: InvoiceId,
        /// Bid amount
        amount: Decimal,
    },

    /// Settle the trade for a bid
    ApproveTrade {
        /// Bid ID
        bid: BidId,
    },

    /// Show an invoice
    Invoice { id: InvoiceId },

    /// Show an issuer
    Issuer { id: IssuerId },

    /// Stream all investors as JSON lines
    Investors,

    /// List every bid on an invoice
    Bids { invoice: InvoiceId },

    /// Check supply conservation and ledger invariants
    Audit,
}

fn init_tracing(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = resolve_config(cli.config.as_deref(), cli.database.as_deref())?;
    init_tracing(&config.log_filter, cli.log_json);

    tracing::debug!(
        engine = constants::ENGINE_NAME,
        version = constants::VERSION,
        database = %config.store.url,
        "Starting"
    );
    let ctx = AppContext::new(config).await?;

    let output = match cli.command {
        Commands::Init => commands::init(&ctx).await?,
        Commands::OnboardIssuer { name, balance } => {
            commands::onboard_issuer(&ctx, &name, balance).await?
        }
        Commands::OnboardInvestor { name, balance } => {
            commands::onboard_investor(&ctx, &name, balance).await?
        }
        Commands::CreateInvoice { issuer, price } => {
            commands::create_invoice(&ctx, issuer, price).await?
        }
        Commands::PlaceBid {
            investor,
            invoice,
            amount,
        } => commands::place_bid(&ctx, investor, invoice, amount).await?,
        Commands::ApproveTrade { bid } => commands::approve_trade(&ctx, bid).await?,
        Commands::Invoice { id } => commands::invoice(&ctx, id).await?,
        Commands::Issuer { id } => commands::issuer(&ctx, id).await?,
        Commands::Bids { invoice } => commands::bids(&ctx, invoice).await?,
        Commands::Audit => commands::audit(&ctx).await?,
        Commands::Investors => {
            let written = commands::investors(&ctx, &mut std::io::stdout().lock()).await?;
            tracing::debug!(investors = written, "Investors streamed");
            ctx.store.close().await;
            return Ok(());
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    ctx.store.close().await;
    Ok(())
}
