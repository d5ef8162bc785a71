//! Market analysis: price history, external signals and pattern detection
//!
//! Everything here is read-only with respect to the portfolio. The pipeline
//! assembles a [`MarketContext`] per shortlisted market and hands it to the
//! [`PatternEngine`].

pub mod history;
pub mod pattern;


pub use history::{MarketHistory, PriceHistory};
pub use pattern::{Detection, Direction, PatternDetector, PatternEngine, PatternScore};

use crate::error::Result;
use crate::types::Market;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// External news/attention signal for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSignal {
    pub headline: String,
    /// Publication time of the most recent relevant article
    pub published_at: DateTime<Utc>,
    /// Time of a scheduled event the coverage refers to, when known
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Recent article rate over the baseline rate
    pub attention_ratio: Option<Decimal>,
}

/// Source of signals that are not part of the market listing itself
#[async_trait]
pub trait SignalFeed: Send + Sync {
    /// Price of the same outcome on an independent venue
    async fn counterpart_price(&self, _market: &Market) -> Result<Option<Decimal>> {
        Ok(None)
    }

    async fn news(&self, _market: &Market) -> Result<Option<NewsSignal>> {
        Ok(None)
    }

    fn name(&self) -> &str;
}

/// Feed that never has anything to say
pub struct NoSignals;

#[async_trait]
impl SignalFeed for NoSignals {
    fn name(&self) -> &str {
        "none"
    }
}

/// Everything a detector may look at besides the market itself
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub now: DateTime<Utc>,
    /// Oldest first, current snapshot last
    pub prices: Vec<Decimal>,
    pub volumes: Vec<Decimal>,
    /// Mean price of the other markets in the same event
    pub sibling_mean: Option<Decimal>,
    pub counterpart_price: Option<Decimal>,
    pub news: Option<NewsSignal>,
}

impl MarketContext {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            now,
            prices: Vec::new(),
            volumes: Vec::new(),
            sibling_mean: None,
            counterpart_price: None,
            news: None,
        }
    }
}
