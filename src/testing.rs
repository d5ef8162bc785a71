//! Shared fixtures for unit tests

use crate::analysis::{Detection, Direction, PatternScore};
use crate::types::{Market, MarketStatus, PatternKind, Position, Side};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Liquid, mid-priced market closing in 30 days
pub fn make_market(id: &str, price: Decimal) -> Market {
    Market {
        id: id.to_string(),
        question: format!("Will {id} happen?"),
        price: Some(price),
        volume: Some(dec!(50000)),
        liquidity: Some(dec!(20000)),
        close_time: Some(Utc::now() + Duration::days(30)),
        status: MarketStatus::Active,
        event_id: None,
    }
}

pub fn make_position(market_id: &str, side: Side, entry: Decimal, size: Decimal) -> Position {
    Position {
        id: Uuid::new_v4(),
        market_id: market_id.to_string(),
        question: format!("Will {market_id} happen?"),
        side,
        entry_price: entry,
        size,
        opened_at: Utc::now(),
        stop_loss: entry * dec!(0.8),
        take_profit: (entry * dec!(2)).min(dec!(0.99)),
        is_hedge: false,
        hedges: None,
        hedge_id: None,
        confidence: dec!(0.7),
        current_price: entry,
    }
}

pub fn make_hedge(main: &Position, size: Decimal) -> Position {
    let entry = Decimal::ONE - main.entry_price;
    Position {
        is_hedge: true,
        hedges: Some(main.id),
        ..make_position(&main.market_id, main.side.opposite(), entry, size)
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Pattern score with the given detector outputs, zeros elsewhere
pub fn make_score(entries: &[(PatternKind, Decimal, Option<Direction>)]) -> PatternScore {
    let detections = PatternKind::ALL
        .iter()
        .map(|kind| {
            let (score, direction) = entries
                .iter()
                .find(|(k, _, _)| k == kind)
                .map(|(_, s, d)| (*s, *d))
                .unwrap_or((Decimal::ZERO, None));
            Detection {
                kind: *kind,
                score,
                direction,
                reasons: Vec::new(),
            }
        })
        .collect();
    PatternScore::from_detections(detections)
}
