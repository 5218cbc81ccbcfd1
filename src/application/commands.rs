//! CLI commands and handlers
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::application::poller::PriceMonitor;
use crate::application::relay::{DryRunSubmitter, PriceRelay};
use crate::application::server::ApiServer;
use crate::application::services::{build_price_source, build_registry, describe_failures};
use crate::application::tracker::PriceTracker;
use crate::domain::alert::AlertRule;
use crate::domain::portfolio::Portfolio;
use crate::domain::price::{BatchConsumer, FanOut, SeriesSummary};
use crate::infrastructure::hermes::HermesClient;
use crate::infrastructure::retry::RetryPolicy;
use crate::shared::config::{AppConfig, ServiceMode};
use crate::shared::errors::{AppError, FeedError};
use crate::shared::types::{FeedSymbol, NormalizedQuote, PriceBatch};
use crate::shared::utils::format_price;

#[derive(Parser)]
#[command(name = "pythfeed", version)]
#[command(about = "Pyth Network price feeds: queries, streaming, alerts and a small HTTP API")]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./pythfeed.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Price service implementation (full, simple)
    #[arg(long, global = true)]
    pub mode: Option<ServiceMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the registered symbols and their feed ids
    Symbols,

    /// Latest price for one symbol
    Price {
        /// e.g. BTC/USD or btc-usd
        symbol: String,
    },

    /// Latest prices for several symbols
    Prices {
        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// Print prices on an interval
    Stream {
        #[arg(short, long, num_args = 1.., required = true)]
        symbols: Vec<String>,

        /// Seconds between polls
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Stream prices with alerts and analytics
    Track {
        #[arg(short, long, num_args = 1.., required = true)]
        symbols: Vec<String>,

        /// Alert rule, e.g. "BTC/USD>45000" or "ETH/USD<2000"
        #[arg(short, long)]
        alert: Vec<AlertRule>,

        #[arg(short, long)]
        interval: Option<u64>,

        #[arg(short, long)]
        duration: Option<u64>,

        /// Analytics window in seconds
        #[arg(short, long)]
        window: Option<u64>,

        /// Write history and alerts to this JSON file when done
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Value a set of holdings at current prices
    Portfolio {
        /// Holding as SYMBOL=QUANTITY, e.g. BTC/USD=0.5
        #[arg(long = "holding", required = true, value_parser = parse_holding)]
        holdings: Vec<(FeedSymbol, f64)>,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch attestations and hand them to a dry-run submitter
    Relay {
        #[arg(short, long, num_args = 1.., required = true)]
        symbols: Vec<String>,
    },
}

fn parse_holding(input: &str) -> Result<(FeedSymbol, f64), String> {
    let (symbol, quantity) = input
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=QUANTITY, got '{}'", input))?;
    let symbol = FeedSymbol::parse(symbol).map_err(|e| e.to_string())?;
    let quantity: f64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity in '{}'", input))?;
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(format!("quantity must be a non-negative number in '{}'", input));
    }
    Ok((symbol, quantity))
}

impl Cli {
    /// Fold command-line overrides into the loaded config
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.service.mode = mode;
        }
        match &self.command {
            Commands::Stream { interval, .. } => {
                if let Some(interval) = interval {
                    config.tracker.interval_secs = *interval;
                }
            }
            Commands::Track { interval, window, .. } => {
                if let Some(interval) = interval {
                    config.tracker.interval_secs = *interval;
                }
                if let Some(window) = window {
                    config.tracker.analytics_window_secs = *window;
                }
            }
            Commands::Serve { host, port } => {
                if let Some(host) = host {
                    config.server.host = host.clone();
                }
                if let Some(port) = port {
                    config.server.port = *port;
                }
            }
            _ => {}
        }
    }
}

/// Prints every batch to stdout
pub struct ConsolePrinter;

impl ConsolePrinter {
    pub fn format_quote(quote: &NormalizedQuote) -> String {
        format!(
            "{:<10} {:>18} ± {:<14} {}",
            quote.symbol.as_str(),
            format_price(quote.price_f64()),
            format_price(quote.confidence_f64()),
            quote.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

impl BatchConsumer for ConsolePrinter {
    fn on_batch(&self, batch: &PriceBatch) {
        println!("📊 {}", batch.fetched_at.format("%H:%M:%S"));
        for quote in batch.quotes.values() {
            println!("  {}", Self::format_quote(quote));
        }
        for symbol in &batch.unknown {
            println!("  ⚠️  {}: unknown symbol", symbol);
        }
        for failure in describe_failures(&batch.failures) {
            println!("  ❌ {}", failure);
        }
    }

    fn on_error(&self, error: &FeedError) {
        println!("❌ {}", error);
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Execute the selected command
    pub async fn execute(command: Commands, config: AppConfig) -> Result<(), AppError> {
        match command {
            Commands::Symbols => Self::execute_symbols_command(&config),
            Commands::Price { symbol } => Self::execute_price_command(symbol, &config).await,
            Commands::Prices { symbols } => Self::execute_prices_command(symbols, &config).await,
            Commands::Stream { symbols, duration, .. } => {
                Self::execute_stream_command(symbols, duration, &config).await
            }
            Commands::Track { symbols, alert, duration, export, .. } => {
                Self::execute_track_command(symbols, alert, duration, export, &config).await
            }
            Commands::Portfolio { holdings } => Self::execute_portfolio_command(holdings, &config).await,
            Commands::Serve { .. } => Self::execute_serve_command(&config).await,
            Commands::Relay { symbols } => Self::execute_relay_command(symbols, &config).await,
        }
    }

    fn execute_symbols_command(config: &AppConfig) -> Result<(), AppError> {
        let registry = build_registry(config)?;
        println!("📋 {} symbols", registry.len());
        for symbol in registry.symbols() {
            if let Some(feed_id) = registry.feed_id(&symbol) {
                println!("  {:<10} {}", symbol.as_str(), feed_id);
            }
        }
        Ok(())
    }

    async fn execute_price_command(symbol: String, config: &AppConfig) -> Result<(), AppError> {
        let source = build_price_source(config)?;
        let quote = source.latest_price(&symbol).await?;
        println!("{}", ConsolePrinter::format_quote(&quote));
        Ok(())
    }

    async fn execute_prices_command(symbols: Vec<String>, config: &AppConfig) -> Result<(), AppError> {
        let source = build_price_source(config)?;
        let batch = source.latest_prices(&symbols).await?;
        ConsolePrinter.on_batch(&batch);
        Ok(())
    }

    async fn execute_stream_command(
        symbols: Vec<String>,
        duration: Option<u64>,
        config: &AppConfig,
    ) -> Result<(), AppError> {
        let monitor = PriceMonitor::new(build_price_source(config)?, config.tracker.stop_timeout());
        monitor
            .start(symbols, config.tracker.interval(), Arc::new(ConsolePrinter))
            .await;
        wait_for_exit(duration).await;
        monitor.stop().await;
        Ok(())
    }

    async fn execute_track_command(
        symbols: Vec<String>,
        alerts: Vec<AlertRule>,
        duration: Option<u64>,
        export: Option<PathBuf>,
        config: &AppConfig,
    ) -> Result<(), AppError> {
        let source = build_price_source(config)?;
        let tracker = Arc::new(PriceTracker::new(config.tracker.analytics_window()));
        for rule in alerts {
            if !source.registry().contains(&rule.symbol) {
                warn!("Alert on {} will never fire: symbol is not registered", rule.symbol);
            }
            tracker.add_rule(rule);
        }

        let consumers = FanOut::new()
            .with(Arc::new(ConsolePrinter))
            .with(tracker.clone());
        let monitor = PriceMonitor::new(source, config.tracker.stop_timeout());
        monitor
            .start(symbols.clone(), config.tracker.interval(), Arc::new(consumers))
            .await;
        wait_for_exit(duration).await;
        monitor.stop().await;

        println!("\n📈 Analytics ({}s window)", tracker.window().num_seconds());
        for symbol in &symbols {
            let Ok(symbol) = FeedSymbol::parse(symbol) else {
                continue;
            };
            match tracker.summarize(&symbol) {
                SeriesSummary::Stats(stats) => println!(
                    "  {:<10} n={} last={} min={} max={} avg={} σ={:.4} change={:+.2}%",
                    stats.symbol.as_str(),
                    stats.data_points,
                    format_price(stats.current_price),
                    format_price(stats.lowest_price),
                    format_price(stats.highest_price),
                    format_price(stats.average_price),
                    stats.volatility,
                    stats.price_change_percent
                ),
                SeriesSummary::NoRecentData { symbol, .. } => println!("  {:<10} no recent data", symbol.as_str()),
                SeriesSummary::NoHistory { symbol } => println!("  {:<10} no history", symbol.as_str()),
            }
        }

        let fired = tracker.fired();
        if !fired.is_empty() {
            println!("\n🚨 {} alerts fired", fired.len());
            for rule in fired {
                println!("  {}", rule);
            }
        }

        if let Some(path) = export {
            let path = tracker.export_to_file(Some(&path))?;
            println!("\n💾 Exported to {}", path.display());
        }
        Ok(())
    }

    async fn execute_portfolio_command(
        holdings: Vec<(FeedSymbol, f64)>,
        config: &AppConfig,
    ) -> Result<(), AppError> {
        let mut portfolio = Portfolio::new();
        for (symbol, quantity) in holdings {
            portfolio.add_holding(symbol, quantity);
        }

        let source = build_price_source(config)?;
        let symbols: Vec<String> = portfolio.symbols().iter().map(ToString::to_string).collect();
        let batch = source.latest_prices(&symbols).await?;
        let valuation = portfolio.valuation(&batch.quotes);

        println!("💼 Portfolio value: {}", format_price(valuation.total_value));
        for (symbol, holding) in &valuation.holdings {
            let price = holding
                .price
                .map(format_price)
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "  {:<10} qty={:<12} price={:<18} value={:<18} {:>6.2}%",
                symbol.as_str(),
                holding.quantity,
                price,
                format_price(holding.value),
                holding.percentage
            );
        }
        Ok(())
    }

    async fn execute_serve_command(config: &AppConfig) -> Result<(), AppError> {
        let server = ApiServer::new(build_price_source(config)?, &config.server.host, config.server.port)?;
        server.run().await
    }

    async fn execute_relay_command(symbols: Vec<String>, config: &AppConfig) -> Result<(), AppError> {
        let relay = PriceRelay::new(
            Arc::new(build_registry(config)?),
            Arc::new(HermesClient::from_config(&config.hermes)?),
            RetryPolicy::from_config(&config.request),
            Arc::new(DryRunSubmitter::new()),
        );
        let report = relay.relay(&symbols).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

async fn wait_for_exit(duration: Option<u64>) {
    match duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            info!("Press Ctrl-C to stop");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
