//! Prediction Market Autopilot
//!
//! Paper-trades Polymarket listings through the full research, sizing and
//! risk pipeline, keeping every decision in an append-only ledger.

use chrono::Utc;
use clap::{Parser, Subcommand};
use polymarket_autopilot::{
    analysis::{NoSignals, SignalFeed},
    client::{GammaClient, NewsFeed, PaperExchange},
    config::Config,
    model::{LlmReasoner, NoReasoner, Reasoner},
    monitor::Monitor,
    pipeline::Autopilot,
    risk::RiskState,
    scanner::{MarketFilter, QuantitativeScorer},
    storage::Ledger,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "autopilot")]
#[command(about = "Pattern-driven paper trading for prediction markets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run trading cycles until interrupted
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Minutes between cycles (overrides runtime.cycle_interval_secs)
        #[arg(long)]
        interval_mins: Option<u64>,
        /// Starting capital for a fresh ledger
        #[arg(long)]
        capital: Option<Decimal>,
    },
    /// Show the markets that pass the filter, best first
    Markets {
        /// Number of markets to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Replay the ledger and print the portfolio
    Replay,
    /// Clear a kill-switch halt
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            once,
            interval_mins,
            capital,
        } => run(config, once, interval_mins, capital).await,
        Commands::Markets { limit } => show_markets(config, limit).await,
        Commands::Replay => replay(config).await,
        Commands::Reset => reset(config).await,
    }
}

async fn run(
    mut config: Config,
    once: bool,
    interval_mins: Option<u64>,
    capital: Option<Decimal>,
) -> anyhow::Result<()> {
    if let Some(capital) = capital {
        config.runtime.initial_capital = capital;
        config.validate()?;
    }
    tracing::info!("Starting autopilot (paper trading)");

    let ledger = Ledger::new(&config.runtime.ledger_path);
    let state = ledger
        .open_or_init(config.runtime.initial_capital, Utc::now())
        .await?;
    let gamma = GammaClient::new(&config.gamma)?;
    let exchange = Arc::new(PaperExchange::from_portfolio(Box::new(gamma), &state.portfolio));

    let reasoner: Arc<dyn Reasoner> = match config.llm.clone() {
        Some(llm) => {
            tracing::info!("Reasoner: {} at {}", llm.model, llm.base_url);
            Arc::new(LlmReasoner::new(llm)?)
        }
        None => {
            tracing::warn!("No [llm] configured, confirmations will stay unconfirmed");
            Arc::new(NoReasoner)
        }
    };
    let signals: Arc<dyn SignalFeed> = match config.news.clone() {
        Some(news) => Arc::new(NewsFeed::new(news)?),
        None => {
            tracing::warn!("No [news] configured, event-driven detection limited to close times");
            Arc::new(NoSignals)
        }
    };

    let interval = Duration::from_secs(
        interval_mins
            .map(|m| m * 60)
            .unwrap_or(config.runtime.cycle_interval_secs),
    );
    let mut autopilot = Autopilot::open(&config, exchange, reasoner, signals).await?;
    autopilot.run(interval, once).await?;
    Ok(())
}

async fn show_markets(config: Config, limit: usize) -> anyhow::Result<()> {
    let client = GammaClient::new(&config.gamma)?;
    let markets = client.get_markets().await?;
    let now = Utc::now();

    let (eligible, stats) = MarketFilter::new(config.filter.clone()).apply_with_stats(&markets, now);
    let scoring = polymarket_autopilot::config::ScoringConfig {
        top_k: limit,
        ..config.scoring.clone()
    };
    let ranked = QuantitativeScorer::new(scoring).rank(eligible);

    println!(
        "\n{} listings, {} eligible (liquidity {} / volume {} / closing {} / band {} rejected)\n",
        stats.total,
        stats.passed,
        stats.low_liquidity,
        stats.low_volume,
        stats.closing_soon,
        stats.price_out_of_band
    );
    println!(
        "{:<50} {:>6} {:>12} {:>12} {:>8} {:>6}",
        "Question", "Yes", "Liquidity", "Volume", "Closes", "Score"
    );
    println!("{}", "-".repeat(99));

    for scored in ranked {
        let market = &scored.market;
        let question: String = if market.question.chars().count() > 47 {
            format!("{}...", market.question.chars().take(47).collect::<String>())
        } else {
            market.question.clone()
        };
        let closes = market
            .hours_to_close(now)
            .map(|h| format!("{:.0}h", h))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<50} {:>5.0}% {:>12.0} {:>12.0} {:>8} {:>6.1}",
            question,
            market.price.unwrap_or(Decimal::ZERO) * Decimal::ONE_HUNDRED,
            market.liquidity.unwrap_or(Decimal::ZERO),
            market.volume.unwrap_or(Decimal::ZERO),
            closes,
            scored.score.total
        );
    }

    Ok(())
}

async fn replay(config: Config) -> anyhow::Result<()> {
    let ledger = Ledger::new(&config.runtime.ledger_path);
    let Some(state) = ledger.replay().await? else {
        println!("No ledger at {}", ledger.path().display());
        return Ok(());
    };

    let summary = state.portfolio.summary();
    println!("\nLedger: {} ({} decisions)\n", ledger.path().display(), state.decisions);
    match &state.risk_state {
        RiskState::Active => println!("State: active"),
        RiskState::Halted { reason, since } => println!("State: HALTED since {} ({})", since, reason),
    }
    println!("Initial capital: {:.2}", summary.initial_capital);
    println!(
        "Balance: {:.2} (available {:.2}, return {:.2}%)",
        summary.balance,
        summary.available,
        summary.total_return() * Decimal::ONE_HUNDRED
    );
    println!(
        "Realized P&L: {:.2} | Unrealized P&L: {:.2} | Drawdown: {:.1}%",
        summary.realized_pnl,
        summary.unrealized_pnl,
        summary.drawdown * Decimal::ONE_HUNDRED
    );
    println!(
        "Closed trades: {} ({} won, {} lost, {:.1}% hit rate)",
        summary.closed_trades,
        summary.wins,
        summary.losses,
        summary.win_rate() * Decimal::ONE_HUNDRED
    );

    if !state.portfolio.positions().is_empty() {
        println!("\nOpen positions:");
        for p in state.portfolio.positions() {
            println!(
                "  {}{} {} {:.2} @ {:.4} (stop {:.4}, target {:.4})",
                if p.is_hedge { "[hedge] " } else { "" },
                p.side,
                p.market_id,
                p.size,
                p.entry_price,
                p.stop_loss,
                p.take_profit
            );
        }
    }

    let monitor = Monitor::new(1000);
    monitor.load_history(state.portfolio.closed_positions()).await;
    let stats = monitor.get_stats().await;
    if stats.total_trades > 0 {
        println!(
            "\nWin rate {:.1}%, avg P&L {:.2}, best {:.2}, worst {:.2}, sharpe {}",
            stats.win_rate * Decimal::ONE_HUNDRED,
            stats.avg_pnl_per_trade,
            stats.best_trade.unwrap_or_default(),
            stats.worst_trade.unwrap_or_default(),
            stats
                .sharpe_ratio
                .map(|s| s.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    Ok(())
}

async fn reset(config: Config) -> anyhow::Result<()> {
    let ledger = Ledger::new(&config.runtime.ledger_path);
    if ledger.reset(Utc::now()).await? {
        println!("Halt cleared, admissions resume on the next cycle");
    } else {
        println!("Not halted, nothing to reset");
    }
    Ok(())
}
