//! Core types shared across the pipeline

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Market lifecycle status as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
    Settled,
}

/// Binary market listing, immutable for the duration of a cycle.
///
/// Numeric fields are optional because upstream listings are frequently
/// incomplete; the filter drops anything missing a field it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    /// Implied probability of YES, in [0, 1]. For settled markets this is
    /// the settlement value.
    pub price: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub liquidity: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    pub status: MarketStatus,
    pub event_id: Option<String>,
}

impl Market {
    pub fn is_active(&self) -> bool {
        self.status == MarketStatus::Active
    }

    /// Price of buying the given side
    pub fn price_of(&self, side: Side) -> Option<Decimal> {
        self.price.map(|p| match side {
            Side::Yes => p,
            Side::No => Decimal::ONE - p,
        })
    }

    pub fn time_to_close(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.close_time.map(|t| t - now)
    }

    /// Hours until close, fractional. Negative once the market has closed.
    pub fn hours_to_close(&self, now: DateTime<Utc>) -> Option<Decimal> {
        self.time_to_close(now)
            .map(|d| Decimal::from(d.num_seconds()) / Decimal::from(3600))
    }
}

/// Markets sharing an event id
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub id: String,
    pub markets: Vec<Market>,
}

impl Event {
    /// Group a snapshot by event id. Markets without one are left out.
    pub fn group(markets: &[Market]) -> HashMap<String, Event> {
        let mut events: HashMap<String, Event> = HashMap::new();
        for market in markets {
            if let Some(event_id) = &market.event_id {
                events
                    .entry(event_id.clone())
                    .or_insert_with(|| Event {
                        id: event_id.clone(),
                        markets: Vec::new(),
                    })
                    .markets
                    .push(market.clone());
            }
        }
        events
    }

    /// Mean price of the other priced markets in this event
    pub fn sibling_mean_price(&self, market_id: &str) -> Option<Decimal> {
        let prices: Vec<Decimal> = self
            .markets
            .iter()
            .filter(|m| m.id != market_id)
            .filter_map(|m| m.price)
            .collect();

        if prices.is_empty() {
            return None;
        }
        Some(prices.iter().sum::<Decimal>() / Decimal::from(prices.len()))
    }
}

/// Outcome side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// The five pattern heuristics, in tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Mispricing,
    Momentum,
    Reversal,
    Arbitrage,
    EventDriven,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Mispricing,
        PatternKind::Momentum,
        PatternKind::Reversal,
        PatternKind::Arbitrage,
        PatternKind::EventDriven,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Mispricing => "mispricing",
            PatternKind::Momentum => "momentum",
            PatternKind::Reversal => "reversal",
            PatternKind::Arbitrage => "arbitrage",
            PatternKind::EventDriven => "event_driven",
        }
    }
}

/// Position lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Proposed,
    Admitted,
    Open,
    ClosedProfit,
    ClosedLoss,
    ClosedStop,
    ClosedTimeout,
}

impl PositionState {
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            PositionState::ClosedProfit
                | PositionState::ClosedLoss
                | PositionState::ClosedStop
                | PositionState::ClosedTimeout
        )
    }
}

/// Open position held by the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub market_id: String,
    pub question: String,
    pub side: Side,
    /// Price paid per share of `side`
    pub entry_price: Decimal,
    /// Capital committed, in currency
    pub size: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub is_hedge: bool,
    /// Main position this hedge protects
    pub hedges: Option<Uuid>,
    /// Hedge protecting this main position
    pub hedge_id: Option<Uuid>,
    pub confidence: Decimal,
    pub current_price: Decimal,
}

impl Position {
    /// P&L if the position were closed at `exit_price`
    pub fn pnl_at(&self, exit_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.size * (exit_price / self.entry_price - Decimal::ONE)
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.pnl_at(self.current_price)
    }
}

/// Position after it left the book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: Decimal,
    pub closed_at: DateTime<Utc>,
    pub pnl: Decimal,
    pub state: PositionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

/// Order sent to the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Idempotency key. Resubmitting the same order never fills twice.
    pub client_id: Uuid,
    pub market_id: String,
    pub action: OrderAction,
    pub side: Side,
    pub price: Decimal,
    /// Notional in currency
    pub size: Decimal,
}

impl Order {
    pub fn buy(market_id: &str, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            action: OrderAction::Buy,
            side,
            price,
            size,
        }
    }

    /// Sell the shares of `position` at `price`
    pub fn close(position: &Position, price: Decimal) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            market_id: position.market_id.clone(),
            action: OrderAction::Sell,
            side: position.side,
            price,
            size: position.size + position.pnl_at(price),
        }
    }

    /// Number of shares bought or sold
    pub fn shares(&self) -> Decimal {
        if self.price.is_zero() {
            return Decimal::ZERO;
        }
        self.size / self.price
    }
}

/// Why a decision was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    BelowPatternThreshold,
    AlreadyResolved,
    InsufficientEdge,
    InsufficientConfidence,
    NonPositiveKelly,
    Halted,
    KillSwitch,
    ConcurrentLimit,
    Duplicate,
    InsufficientCapital,
    DailyLossLimit,
    Admitted,
    HedgeProtection,
    StopLoss,
    TakeProfit,
    Timeout,
    Settled,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::BelowPatternThreshold => "below_pattern_threshold",
            ReasonCode::AlreadyResolved => "already_resolved",
            ReasonCode::InsufficientEdge => "insufficient_edge",
            ReasonCode::InsufficientConfidence => "insufficient_confidence",
            ReasonCode::NonPositiveKelly => "non_positive_kelly",
            ReasonCode::Halted => "halted",
            ReasonCode::KillSwitch => "kill_switch",
            ReasonCode::ConcurrentLimit => "concurrent_limit",
            ReasonCode::Duplicate => "duplicate",
            ReasonCode::InsufficientCapital => "insufficient_capital",
            ReasonCode::DailyLossLimit => "daily_loss_limit",
            ReasonCode::Admitted => "admitted",
            ReasonCode::HedgeProtection => "hedge_protection",
            ReasonCode::StopLoss => "stop_loss",
            ReasonCode::TakeProfit => "take_profit",
            ReasonCode::Timeout => "timeout",
            ReasonCode::Settled => "settled",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the pipeline wants done with a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TradeAction {
    Skip,
    Open {
        side: Side,
        size: Decimal,
        price: Decimal,
    },
    Close {
        position_id: Uuid,
        exit_price: Decimal,
        state: PositionState,
    },
    Hedge {
        position_id: Uuid,
        side: Side,
        size: Decimal,
        price: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub id: Uuid,
    pub market_id: String,
    pub action: TradeAction,
    pub reason: ReasonCode,
    pub timestamp: DateTime<Utc>,
}

impl TradeDecision {
    pub fn new(market_id: &str, action: TradeAction, reason: ReasonCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            market_id: market_id.to_string(),
            action,
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn skip(market_id: &str, reason: ReasonCode) -> Self {
        Self::new(market_id, TradeAction::Skip, reason)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.action, TradeAction::Skip)
    }
}
