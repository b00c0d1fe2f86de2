//! Hyperliquid Signal Bot
//!
//! Receives buy/sell/close webhooks (TradingView alerts and the like) and
//! reconciles a Hyperliquid perpetuals account against each one.

mod api;
mod error;
mod models;
mod server;
mod trading;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, level_filters::LevelFilter, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{
    ClearinghouseState, ExchangeClient, InfoClient, OpenOrderResponse, MAINNET_API_URL, TESTNET_API_URL,
};
use crate::models::{Action, Signal};
use crate::server::WebhookServer;
use crate::trading::{DryRunExchange, Exchange, Reconciler, SizingPolicy, TradingConfig};

/// Hyperliquid webhook signal bot CLI.
#[derive(Parser)]
#[command(name = "hlsignal")]
#[command(about = "Trade a Hyperliquid account from webhook signals", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG overrides it.
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Private key of the signing wallet (hex, 0x optional)
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Account to trade. Defaults to the signer's address.
    #[arg(long, env = "ACCOUNT_ADDRESS")]
    account_address: Option<String>,

    /// Shared secret webhook callers must send as "password"
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,

    /// Market traded on buy/sell signals
    #[arg(long, env = "SYMBOL", default_value = "ETH")]
    symbol: String,

    /// Leverage applied to reserved equity
    #[arg(long, env = "LEVERAGE", default_value = "1.0")]
    leverage: Decimal,

    /// Share of equity used for sizing
    #[arg(long, env = "RESERVED_FRACTION", default_value = "0.98")]
    reserved_fraction: Decimal,

    /// Raise smaller positive targets to this size
    #[arg(long, env = "MIN_ORDER_SIZE")]
    min_order_size: Option<Decimal>,

    /// Sizing when a position is open (compound, rebalance)
    #[arg(long, env = "SIZING_POLICY", default_value = "compound")]
    sizing_policy: SizingPolicy,

    /// Price tolerance for market orders (0.05 = 5%)
    #[arg(long, env = "SLIPPAGE", default_value = "0.05")]
    slippage: Decimal,

    /// Handle one signal at a time per account
    #[arg(long, env = "SERIALIZE_SIGNALS", default_value_t = true, action = ArgAction::Set)]
    serialize_signals: bool,

    /// Use the Hyperliquid testnet
    #[arg(long, env = "HYPERLIQUID_TESTNET")]
    testnet: bool,

    /// Override the API base URL
    #[arg(long, env = "HYPERLIQUID_API_URL")]
    api_url: Option<String>,

    /// Log orders instead of sending them
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Webhook listen port
    #[arg(short, long, env = "PORT", default_value = "5000")]
    port: u16,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default)
    Serve,

    /// Reconcile the account against one signal and exit
    Signal {
        /// buy, sell or close
        action: String,
    },

    /// Show equity, positions and open orders
    Status,

    /// Show current configuration
    Config,
}

impl Cli {
    fn trading_config(&self) -> TradingConfig {
        TradingConfig {
            symbol: self.symbol.clone(),
            leverage: self.leverage,
            reserved_fraction: self.reserved_fraction,
            min_order_size: self.min_order_size,
            sizing_policy: self.sizing_policy,
            slippage: self.slippage,
            serialize_signals: self.serialize_signals,
            ..TradingConfig::default()
        }
    }

    fn api_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.clone(),
            None if self.testnet => TESTNET_API_URL.to_string(),
            None => MAINNET_API_URL.to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(log_level).into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.trading_config();
    config.validate()?;

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            let engine = build_engine(&cli, config)?;

            println!("\n=== Hyperliquid Signal Bot ===");
            println!("Account:  {}", engine.account());
            println!("Symbol:   {}", engine.config().symbol);
            println!("Mode:     {}", if engine.is_dry_run() { "DRY RUN (no real trades)" } else { "LIVE TRADING" });
            println!("Webhook:  http://0.0.0.0:{}/webhook", cli.port);
            println!("\nPress Ctrl+C to stop.\n");

            let addr = format!("0.0.0.0:{}", cli.port);
            WebhookServer::new(Arc::new(engine)).serve(&addr).await?;
        }

        Commands::Signal { action } => {
            let action = Action::parse(action).ok_or_else(|| anyhow!("Unsupported action '{}'", action))?;
            let engine = build_engine(&cli, config)?;

            let report = engine.handle(Signal::new(action)).await?;
            println!("\n{}", report);
        }

        Commands::Status => {
            let info = InfoClient::new(cli.api_url())?;
            let account = match &cli.account_address {
                Some(address) => address.clone(),
                None => signer_account(&cli, info.clone())?,
            };

            let (state, orders) = tokio::try_join!(
                info.clearinghouse_state(&account),
                info.open_order_details(&account)
            )?;
            let mark = info.mid_price(&config.symbol).await?;

            print_status(&account, &config.symbol, mark, &state, &orders);
        }

        Commands::Config => {
            println!("\n=== Signal Bot Configuration ===\n");
            println!("Account:");
            println!("  Private Key:          {}", redacted(&cli.private_key));
            println!("  Account Address:      {}", cli.account_address.as_deref().unwrap_or("(signer address)"));
            println!("  Webhook Secret:       {}", redacted(&cli.webhook_secret));

            println!("\nPosition Sizing:");
            println!("  Symbol:               {}", config.symbol);
            println!("  Policy:               {}", config.sizing_policy);
            println!("  Leverage:             {}x", config.leverage);
            println!("  Reserved Fraction:    {}%", config.reserved_fraction * Decimal::from(100));
            match config.min_order_size {
                Some(floor) => println!("  Min Order Size:       {}", floor),
                None => println!("  Min Order Size:       (none)"),
            }
            println!("  Size Decimals:        {}", config.size_decimals);

            println!("\nExecution:");
            println!("  Slippage Tolerance:   {}%", config.slippage * Decimal::from(100));
            println!("  Serialize Signals:    {}", config.serialize_signals);
            println!("  Dry Run:              {}", cli.dry_run);

            println!("\nNetwork:");
            println!("  API URL:              {}", cli.api_url());
            println!("  Port:                 {}", cli.port);
        }
    }

    Ok(())
}

/// Wire the exchange client, optional dry-run wrapper and reconciler.
fn build_engine(cli: &Cli, config: TradingConfig) -> Result<Reconciler> {
    let info = InfoClient::new(cli.api_url())?;
    let is_mainnet = !cli.testnet;

    let (exchange, signer): (Arc<dyn Exchange>, Option<String>) = match &cli.private_key {
        Some(key) => {
            let client = ExchangeClient::new(key, info, is_mainnet, config.slippage)?;
            let address = format!("{:#x}", client.address());
            let exchange: Arc<dyn Exchange> = Arc::new(client);
            (exchange, Some(address))
        }
        None if cli.dry_run => {
            warn!("No private key configured, dry run will only read account state");
            let exchange: Arc<dyn Exchange> = Arc::new(info);
            (exchange, None)
        }
        None => return Err(anyhow!("PRIVATE_KEY is required to sign orders")),
    };

    let account = cli
        .account_address
        .clone()
        .or(signer)
        .context("ACCOUNT_ADDRESS is required when no private key is configured")?;

    let exchange: Arc<dyn Exchange> = if cli.dry_run {
        Arc::new(DryRunExchange::new(exchange))
    } else {
        exchange
    };

    info!(
        account = %account,
        symbol = %config.symbol,
        policy = %config.sizing_policy,
        testnet = cli.testnet,
        dry_run = cli.dry_run,
        "Reconciler ready"
    );

    let engine = Reconciler::new(exchange, config, account, cli.webhook_secret.clone());
    if !engine.requires_credential() {
        warn!("WEBHOOK_SECRET not set, webhook requests are not authenticated");
    }

    Ok(engine)
}

fn signer_account(cli: &Cli, info: InfoClient) -> Result<String> {
    let key = cli
        .private_key
        .as_deref()
        .context("Set ACCOUNT_ADDRESS or PRIVATE_KEY to select an account")?;
    let client = ExchangeClient::new(key, info, !cli.testnet, cli.slippage)?;
    Ok(format!("{:#x}", client.address()))
}

fn print_status(
    account: &str,
    symbol: &str,
    mark: Option<Decimal>,
    state: &ClearinghouseState,
    orders: &[OpenOrderResponse],
) {
    let margin = &state.margin_summary;

    println!("\n=== Account: {} ===", account);
    println!("Equity:         ${}", margin.account_value);
    if let Some(withdrawable) = state.withdrawable {
        println!("Withdrawable:   ${}", withdrawable);
    }
    if let Some(notional) = margin.total_ntl_pos {
        println!("Open Notional:  ${}", notional);
    }
    if let Some(used) = margin.total_margin_used {
        println!("Margin Used:    ${}", used);
    }
    match mark {
        Some(price) => println!("Mid ({}):      {}", symbol, price),
        None => println!("Mid ({}):      (no quote)", symbol),
    }

    let positions: Vec<_> = state
        .asset_positions
        .iter()
        .map(|p| &p.position)
        .filter(|p| !p.szi.is_zero())
        .collect();

    println!("\n--- Open Positions ({}) ---", positions.len());
    for pos in positions {
        let side = if pos.szi > Decimal::ZERO { "LONG" } else { "SHORT" };
        let entry = pos.entry_px.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        let pnl = pos.unrealized_pnl.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<8} {:<5} {:>12} @ {:<12} (P&L: ${})",
            pos.coin,
            side,
            pos.szi.abs(),
            entry,
            pnl
        );
    }

    println!("\n--- Open Orders ({}) ---", orders.len());
    for order in orders {
        let side = if order.side == "B" { "BUY" } else { "SELL" };
        let px = order.limit_px.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        let sz = order.sz.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!("  {:<8} {:<5} {:>12} @ {:<12} #{}", order.coin, side, sz, px, order.oid);
    }
}

fn redacted(secret: &Option<String>) -> &'static str {
    match secret.as_deref() {
        Some(s) if !s.is_empty() => "********",
        _ => "(not set)",
    }
}
