//! Risk management: admission limits, exits and the kill switch
//!
//! Admission checks run in a fixed order and the first failure wins:
//!
//! 1. not halted
//! 2. drawdown below the kill-switch level (otherwise halt)
//! 3. open positions below the concurrent cap (hedges count)
//! 4. no open non-hedge position on the same market
//! 5. size within available balance
//! 6. worst-case daily loss within the daily limit
//!
//! A halt persists until an explicit [`RiskManager::reset`]. After a reset
//! the kill switch measures drawdown from the balance at the reset, so the
//! losses that caused the halt do not trip it again.

#[cfg(test)]
mod tests;

use crate::config::RiskConfig;
use crate::error::Result;
use crate::portfolio::Portfolio;
use crate::types::{ClosedPosition, Market, MarketStatus, Position, PositionState, ReasonCode, Side};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RiskState {
    Active,
    Halted { reason: String, since: DateTime<Utc> },
}

/// Position the pipeline would like to open
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub confidence: Decimal,
    /// Main position protected, for hedges
    pub hedges: Option<Uuid>,
}

impl Proposal {
    pub fn is_hedge(&self) -> bool {
        self.hedges.is_some()
    }
}

/// Position that should leave the book this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub position_id: Uuid,
    pub market_id: String,
    pub exit_price: Decimal,
    pub state: PositionState,
    pub reason: ReasonCode,
}

pub struct RiskManager {
    config: RiskConfig,
    state: RiskState,
    last_reset: Option<DateTime<Utc>>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: RiskState::Active,
            last_reset: None,
        }
    }

    /// Restore a manager from persisted state
    pub fn with_state(
        config: RiskConfig,
        state: RiskState,
        last_reset: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            config,
            state,
            last_reset,
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, RiskState::Halted { .. })
    }

    /// Trip the kill switch if drawdown reached the limit. Returns true only
    /// on the transition into halted.
    pub fn check_kill_switch(&mut self, portfolio: &Portfolio, now: DateTime<Utc>) -> bool {
        if self.is_halted() {
            return false;
        }
        let drawdown = self.drawdown(portfolio);
        if drawdown < self.config.kill_switch_drawdown {
            return false;
        }

        let reason = format!(
            "drawdown {:.2}% reached kill switch {:.2}%",
            drawdown * Decimal::ONE_HUNDRED,
            self.config.kill_switch_drawdown * Decimal::ONE_HUNDRED
        );
        warn!("KILL SWITCH: {}", reason);
        self.state = RiskState::Halted { reason, since: now };
        true
    }

    /// Drawdown the kill switch acts on
    pub fn drawdown(&self, portfolio: &Portfolio) -> Decimal {
        match self.last_reset {
            Some(at) => portfolio.drawdown_since(at),
            None => portfolio.drawdown(),
        }
    }

    /// Clear a halt and rebase the kill switch on the current balance.
    /// Returns whether there was a halt.
    pub fn reset(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_halted() {
            return false;
        }
        info!("Risk manager reset, admissions resumed");
        self.state = RiskState::Active;
        self.last_reset = Some(now);
        true
    }

    /// Run the admission checks. `Err(KillSwitch)` means this call halted.
    pub fn evaluate(
        &mut self,
        proposal: &Proposal,
        portfolio: &Portfolio,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), ReasonCode> {
        if self.is_halted() {
            return Err(ReasonCode::Halted);
        }
        if self.check_kill_switch(portfolio, now) {
            return Err(ReasonCode::KillSwitch);
        }
        if portfolio.open_count() >= self.config.max_concurrent {
            return Err(ReasonCode::ConcurrentLimit);
        }
        if !proposal.is_hedge() && portfolio.has_open_position(&proposal.market_id) {
            return Err(ReasonCode::Duplicate);
        }
        if proposal.size <= Decimal::ZERO || proposal.size > portfolio.available() {
            return Err(ReasonCode::InsufficientCapital);
        }

        let worst_case = proposal.size * self.config.stop_loss_pct;
        let projected = portfolio.daily_pnl() - worst_case;
        let limit = self.config.max_daily_loss_pct * portfolio.initial_capital();
        if -projected > limit {
            return Err(ReasonCode::DailyLossLimit);
        }
        Ok(())
    }

    /// Materialize an admitted proposal with its exit levels
    pub fn build_position(&self, proposal: &Proposal, now: DateTime<Utc>) -> Position {
        let (floor, ceiling) = (Decimal::new(1, 2), Decimal::new(99, 2));
        let stop_loss = (proposal.price * (Decimal::ONE - self.config.stop_loss_pct)).clamp(floor, ceiling);
        let take_profit =
            (proposal.price * (Decimal::ONE + self.config.take_profit_pct)).clamp(floor, ceiling);

        Position {
            id: Uuid::new_v4(),
            market_id: proposal.market_id.clone(),
            question: proposal.question.clone(),
            side: proposal.side,
            entry_price: proposal.price,
            size: proposal.size,
            opened_at: now,
            stop_loss,
            take_profit,
            is_hedge: proposal.is_hedge(),
            hedges: proposal.hedges,
            hedge_id: None,
            confidence: proposal.confidence,
            current_price: proposal.price,
        }
    }

    /// Record an opened position (and its hedge link) in the portfolio
    pub fn open(&self, portfolio: &mut Portfolio, position: Position) -> Result<()> {
        portfolio.open_position(position)
    }

    /// Positions that should close given this cycle's snapshot
    pub fn review_positions(
        &self,
        portfolio: &Portfolio,
        markets: &[Market],
        now: DateTime<Utc>,
    ) -> Vec<ExitSignal> {
        portfolio
            .positions()
            .iter()
            .filter_map(|position| {
                let market = markets.iter().find(|m| m.id == position.market_id);
                self.review(position, market, now)
            })
            .collect()
    }

    fn review(
        &self,
        position: &Position,
        market: Option<&Market>,
        now: DateTime<Utc>,
    ) -> Option<ExitSignal> {
        let signal = |exit_price: Decimal, state: PositionState, reason: ReasonCode| ExitSignal {
            position_id: position.id,
            market_id: position.market_id.clone(),
            exit_price,
            state,
            reason,
        };

        if let Some(market) = market.filter(|m| m.status == MarketStatus::Settled) {
            let payout = market.price_of(position.side)?;
            let state = if position.pnl_at(payout) > Decimal::ZERO {
                PositionState::ClosedProfit
            } else {
                PositionState::ClosedLoss
            };
            return Some(signal(payout, state, ReasonCode::Settled));
        }

        let current = market
            .and_then(|m| m.price_of(position.side))
            .unwrap_or(position.current_price);

        if current <= position.stop_loss {
            return Some(signal(current, PositionState::ClosedStop, ReasonCode::StopLoss));
        }
        if current >= position.take_profit {
            return Some(signal(current, PositionState::ClosedProfit, ReasonCode::TakeProfit));
        }
        if now - position.opened_at >= Duration::hours(self.config.max_hold_hours) {
            return Some(signal(current, PositionState::ClosedTimeout, ReasonCode::Timeout));
        }
        None
    }

    /// Apply an exit to the portfolio
    pub fn close(
        &self,
        portfolio: &mut Portfolio,
        exit: &ExitSignal,
        now: DateTime<Utc>,
    ) -> Result<ClosedPosition> {
        let closed = portfolio.close_position(exit.position_id, exit.exit_price, exit.state, now)?;
        info!(
            "Closed {} {} on {}: {:?} pnl={:.2}",
            closed.position.side, closed.position.size, exit.market_id, exit.state, closed.pnl
        );
        Ok(closed)
    }
}
