//! Portfolio ledger state
//!
//! The single mutable record of capital and positions. Analysis stages only
//! ever see `&Portfolio`; every mutation is one validated, all-or-nothing
//! method call reached through the risk manager or ledger replay.


use crate::error::{BotError, Result};
use crate::types::{ClosedPosition, Market, Position, PositionState};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    initial_capital: Decimal,
    /// Settled capital: initial capital plus realized P&L
    balance: Decimal,
    positions: Vec<Position>,
    closed: Vec<ClosedPosition>,
    realized_pnl: Decimal,
    daily_pnl: Decimal,
    trading_day: NaiveDate,
    peak_balance: Decimal,
}

/// Point-in-time view for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub initial_capital: Decimal,
    pub balance: Decimal,
    pub available: Decimal,
    pub exposure: Decimal,
    pub open_positions: usize,
    pub hedges: usize,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub daily_pnl: Decimal,
    pub peak_balance: Decimal,
    pub drawdown: Decimal,
    pub closed_trades: usize,
    pub wins: usize,
    pub losses: usize,
}

impl PortfolioSummary {
    pub fn win_rate(&self) -> Decimal {
        if self.closed_trades == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.wins) / Decimal::from(self.closed_trades)
    }

    pub fn total_return(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.balance - self.initial_capital) / self.initial_capital
    }
}

impl Portfolio {
    pub fn new(initial_capital: Decimal, today: NaiveDate) -> Self {
        Self {
            initial_capital,
            balance: initial_capital,
            positions: Vec::new(),
            closed: Vec::new(),
            realized_pnl: Decimal::ZERO,
            daily_pnl: Decimal::ZERO,
            trading_day: today,
            peak_balance: initial_capital,
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.daily_pnl
    }

    pub fn trading_day(&self) -> NaiveDate {
        self.trading_day
    }

    pub fn peak_balance(&self) -> Decimal {
        self.peak_balance
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn closed_positions(&self) -> &[ClosedPosition] {
        &self.closed
    }

    pub fn position(&self, id: Uuid) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Capital committed to open positions
    pub fn exposure(&self) -> Decimal {
        self.positions.iter().map(|p| p.size).sum()
    }

    /// Balance not committed to open positions. Unrealized P&L never counts.
    pub fn available(&self) -> Decimal {
        self.balance - self.exposure()
    }

    /// Open positions, hedges included
    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Whether a non-hedge position is already open on `market_id`
    pub fn has_open_position(&self, market_id: &str) -> bool {
        self.positions
            .iter()
            .any(|p| !p.is_hedge && p.market_id == market_id)
    }

    /// Fractional drawdown of settled balance from its peak
    pub fn drawdown(&self) -> Decimal {
        if self.peak_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_balance - self.balance) / self.peak_balance).max(Decimal::ZERO)
    }

    /// Drawdown from the highest settled balance reached after `since`.
    /// Closes up to `since` only move the baseline.
    pub fn drawdown_since(&self, since: DateTime<Utc>) -> Decimal {
        let mut balance = self.initial_capital;
        let mut peak = balance;
        for closed in &self.closed {
            balance += closed.pnl;
            peak = if closed.closed_at <= since {
                balance
            } else {
                peak.max(balance)
            };
        }
        if peak <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((peak - self.balance) / peak).max(Decimal::ZERO)
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.unrealized_pnl()).sum()
    }

    /// Reset daily P&L when the UTC calendar day changes
    pub(crate) fn roll_day(&mut self, today: NaiveDate) {
        if today != self.trading_day {
            self.trading_day = today;
            self.daily_pnl = Decimal::ZERO;
        }
    }

    /// Record a newly filled position. A hedge is linked to its open main
    /// position in the same step.
    pub(crate) fn open_position(&mut self, position: Position) -> Result<()> {
        if position.size <= Decimal::ZERO {
            return Err(BotError::Validation(format!(
                "position size must be positive, got {}",
                position.size
            )));
        }
        if position.entry_price <= Decimal::ZERO || position.entry_price >= Decimal::ONE {
            return Err(BotError::Validation(format!(
                "entry price must be in (0, 1), got {}",
                position.entry_price
            )));
        }
        if position.size > self.available() {
            return Err(BotError::RiskLimit(format!(
                "size {} exceeds available balance {}",
                position.size,
                self.available()
            )));
        }
        if !position.is_hedge && self.has_open_position(&position.market_id) {
            return Err(BotError::RiskLimit(format!(
                "position already open on {}",
                position.market_id
            )));
        }
        if self.positions.iter().any(|p| p.id == position.id) {
            return Err(BotError::Validation(format!("duplicate position id {}", position.id)));
        }
        let main_idx = self.hedged_main(&position)?;

        let id = position.id;
        self.positions.push(position);
        if let Some(idx) = main_idx {
            self.positions[idx].hedge_id = Some(id);
        }
        Ok(())
    }

    /// Index of the main position a hedge protects
    fn hedged_main(&self, position: &Position) -> Result<Option<usize>> {
        let Some(main_id) = position.hedges else {
            if position.is_hedge {
                return Err(BotError::Validation(format!(
                    "hedge {} protects no position",
                    position.id
                )));
            }
            return Ok(None);
        };
        if !position.is_hedge {
            return Err(BotError::Validation(format!(
                "{} links to {main_id} but is not a hedge",
                position.id
            )));
        }
        let idx = self
            .positions
            .iter()
            .position(|p| p.id == main_id && !p.is_hedge)
            .ok_or_else(|| BotError::Validation(format!("no open main position {main_id}")))?;
        if let Some(existing) = self.positions[idx].hedge_id {
            return Err(BotError::Validation(format!(
                "{main_id} is already hedged by {existing}"
            )));
        }
        Ok(Some(idx))
    }

    /// Close a position, realizing P&L at `exit_price`
    pub(crate) fn close_position(
        &mut self,
        id: Uuid,
        exit_price: Decimal,
        state: PositionState,
        at: DateTime<Utc>,
    ) -> Result<ClosedPosition> {
        if !state.is_closed() {
            return Err(BotError::Validation(format!("{state:?} is not a closing state")));
        }
        if exit_price < Decimal::ZERO || exit_price > Decimal::ONE {
            return Err(BotError::Validation(format!("exit price {exit_price} out of range")));
        }
        let idx = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| BotError::Validation(format!("no open position {id}")))?;

        let mut position = self.positions.remove(idx);
        position.current_price = exit_price;
        let pnl = position.pnl_at(exit_price);

        self.balance += pnl;
        self.realized_pnl += pnl;
        self.daily_pnl += pnl;
        self.peak_balance = self.peak_balance.max(self.balance);

        let closed = ClosedPosition {
            position,
            exit_price,
            closed_at: at,
            pnl,
            state,
        };
        self.closed.push(closed.clone());
        Ok(closed)
    }

    /// Refresh marks from the cycle snapshot
    pub(crate) fn mark_prices(&mut self, markets: &[Market]) {
        for position in &mut self.positions {
            if let Some(price) = markets
                .iter()
                .find(|m| m.id == position.market_id)
                .and_then(|m| m.price_of(position.side))
            {
                position.current_price = price;
            }
        }
    }

    pub fn summary(&self) -> PortfolioSummary {
        let wins = self.closed.iter().filter(|c| c.pnl > Decimal::ZERO).count();
        let losses = self.closed.iter().filter(|c| c.pnl < Decimal::ZERO).count();
        PortfolioSummary {
            initial_capital: self.initial_capital,
            balance: self.balance,
            available: self.available(),
            exposure: self.exposure(),
            open_positions: self.positions.len(),
            hedges: self.positions.iter().filter(|p| p.is_hedge).count(),
            realized_pnl: self.realized_pnl,
            unrealized_pnl: self.unrealized_pnl(),
            daily_pnl: self.daily_pnl,
            peak_balance: self.peak_balance,
            drawdown: self.drawdown(),
            closed_trades: self.closed.len(),
            wins,
            losses,
        }
    }
}
