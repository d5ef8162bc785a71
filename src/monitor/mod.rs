//! Cycle reporting and trade performance

#[cfg(test)]
mod tests;

use crate::portfolio::PortfolioSummary;
use crate::types::{ClosedPosition, PositionState, Side, TradeDecision};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Performance monitor over closed trades
pub struct Monitor {
    trades: RwLock<VecDeque<TradeRecord>>,
    max_history: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub closed_at: DateTime<Utc>,
    pub market_id: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub state: PositionState,
    pub is_hedge: bool,
}

impl From<&ClosedPosition> for TradeRecord {
    fn from(closed: &ClosedPosition) -> Self {
        Self {
            closed_at: closed.closed_at,
            market_id: closed.position.market_id.clone(),
            side: closed.position.side,
            size: closed.position.size,
            entry_price: closed.position.entry_price,
            exit_price: closed.exit_price,
            pnl: closed.pnl,
            state: closed.state,
            is_hedge: closed.position.is_hedge,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub stopped_out: usize,
    pub timed_out: usize,
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    pub avg_pnl_per_trade: Decimal,
    pub best_trade: Option<Decimal>,
    pub worst_trade: Option<Decimal>,
    /// Mean over standard deviation of per-trade returns
    pub sharpe_ratio: Option<Decimal>,
}

/// What one pipeline cycle did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub markets_seen: usize,
    pub eligible: usize,
    pub shortlisted: usize,
    pub confirmations: usize,
    pub opened: usize,
    pub hedged: usize,
    pub closed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub halted: bool,
    pub halt_reason: Option<String>,
    /// Why the cycle stopped early, if it did
    pub aborted: Option<String>,
    pub portfolio: Option<PortfolioSummary>,
    /// Every decision ledgered this cycle, in order
    pub decisions: Vec<TradeDecision>,
    /// Differences between the venue account and the ledger
    pub venue_drift: Vec<String>,
}

impl Monitor {
    pub fn new(max_history: usize) -> Self {
        Self {
            trades: RwLock::new(VecDeque::with_capacity(max_history)),
            max_history,
        }
    }

    pub async fn record_trade(&self, record: TradeRecord) {
        let mut trades = self.trades.write().await;
        if trades.len() >= self.max_history {
            trades.pop_front();
        }
        trades.push_back(record);
    }

    /// Seed history from positions closed before this run
    pub async fn load_history(&self, closed: &[ClosedPosition]) {
        for c in closed {
            self.record_trade(TradeRecord::from(c)).await;
        }
    }

    pub async fn get_stats(&self) -> PerformanceStats {
        let trades = self.trades.read().await;

        let total_trades = trades.len();
        if total_trades == 0 {
            return PerformanceStats::default();
        }

        let winning = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
        let losing = trades.iter().filter(|t| t.pnl < Decimal::ZERO).count();
        let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
        let count = Decimal::from(total_trades);

        PerformanceStats {
            total_trades,
            winning_trades: winning,
            losing_trades: losing,
            stopped_out: trades
                .iter()
                .filter(|t| t.state == PositionState::ClosedStop)
                .count(),
            timed_out: trades
                .iter()
                .filter(|t| t.state == PositionState::ClosedTimeout)
                .count(),
            win_rate: Decimal::from(winning) / count,
            total_pnl,
            avg_pnl_per_trade: total_pnl / count,
            best_trade: trades.iter().map(|t| t.pnl).max(),
            worst_trade: trades.iter().map(|t| t.pnl).min(),
            sharpe_ratio: sharpe(trades.iter()),
        }
    }

    pub async fn log_stats(&self) {
        let stats = self.get_stats().await;
        info!(
            "Performance: {} trades, {:.1}% win rate, {:.2} total PnL",
            stats.total_trades,
            stats.win_rate * Decimal::ONE_HUNDRED,
            stats.total_pnl
        );
    }

    pub fn log_cycle(&self, summary: &CycleSummary) {
        if let Some(reason) = &summary.aborted {
            warn!("Cycle {} aborted: {}", summary.cycle, reason);
        }
        info!(
            "Cycle {}: {} markets, {} eligible, {} shortlisted, {} confirmations | opened {} hedged {} closed {} skipped {} failed {}",
            summary.cycle,
            summary.markets_seen,
            summary.eligible,
            summary.shortlisted,
            summary.confirmations,
            summary.opened,
            summary.hedged,
            summary.closed,
            summary.skipped,
            summary.failed
        );
        if summary.halted {
            warn!(
                "Trading HALTED: {}",
                summary.halt_reason.as_deref().unwrap_or("kill switch")
            );
        }
        if let Some(p) = &summary.portfolio {
            info!(
                "Portfolio: balance {:.2}, available {:.2}, {} open ({} hedges), daily P&L {:.2}, drawdown {:.1}%",
                p.balance,
                p.available,
                p.open_positions,
                p.hedges,
                p.daily_pnl,
                p.drawdown * Decimal::ONE_HUNDRED
            );
        }
    }

    /// End-of-run report
    pub async fn log_final_stats(&self, portfolio: &PortfolioSummary) {
        let equity = portfolio.balance + portfolio.unrealized_pnl;
        let total_pnl = equity - portfolio.initial_capital;
        info!("============================================================");
        info!("FINAL STATISTICS");
        info!("============================================================");
        info!("Initial capital: {:.2}", portfolio.initial_capital);
        info!("Final equity: {:.2}", equity);
        info!(
            "Total P&L: {:.2} ({:.1}%)",
            total_pnl,
            if portfolio.initial_capital.is_zero() {
                Decimal::ZERO
            } else {
                total_pnl / portfolio.initial_capital * Decimal::ONE_HUNDRED
            }
        );
        info!("Realized P&L: {:.2}", portfolio.realized_pnl);
        info!("Unrealized P&L: {:.2}", portfolio.unrealized_pnl);
        info!(
            "Open positions: {} | Closed positions: {}",
            portfolio.open_positions, portfolio.closed_trades
        );
        self.log_stats().await;
        info!("============================================================");
    }
}

fn sharpe<'a>(trades: impl Iterator<Item = &'a TradeRecord>) -> Option<Decimal> {
    let returns: Vec<Decimal> = trades
        .filter(|t| !t.size.is_zero())
        .map(|t| t.pnl / t.size)
        .collect();
    if returns.len() < 2 {
        return None;
    }

    let n = Decimal::from(returns.len());
    let mean = returns.iter().sum::<Decimal>() / n;
    let variance = returns
        .iter()
        .map(|r| (*r - mean) * (*r - mean))
        .sum::<Decimal>()
        / (n - Decimal::ONE);
    let std_dev = variance.sqrt()?;
    if std_dev.is_zero() {
        return None;
    }
    Some((mean / std_dev).round_dp(4))
}
