//! Rolling per-market price and volume history
//!
//! Listings only carry the current price, so trend detectors depend on
//! observations accumulated across cycles.

use crate::types::Market;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct MarketHistory {
    observations: VecDeque<Observation>,
}

impl MarketHistory {
    pub fn prices(&self) -> Vec<Decimal> {
        self.observations.iter().map(|o| o.price).collect()
    }

    /// Volumes, skipping observations that lacked one
    pub fn volumes(&self) -> Vec<Decimal> {
        self.observations.iter().filter_map(|o| o.volume).collect()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Bounded history for every market seen
pub struct PriceHistory {
    max_len: usize,
    markets: HashMap<String, MarketHistory>,
}

impl PriceHistory {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            markets: HashMap::new(),
        }
    }

    pub fn observe(&mut self, market_id: &str, observation: Observation) {
        let history = self.markets.entry(market_id.to_string()).or_default();
        // same-timestamp snapshots replace rather than duplicate
        if history.observations.back().map(|o| o.at) == Some(observation.at) {
            history.observations.pop_back();
        }
        history.observations.push_back(observation);
        while history.observations.len() > self.max_len {
            history.observations.pop_front();
        }
    }

    /// Record the current price of every priced market in a snapshot
    pub fn record(&mut self, markets: &[Market], at: DateTime<Utc>) {
        for market in markets {
            if let Some(price) = market.price {
                self.observe(
                    &market.id,
                    Observation {
                        at,
                        price,
                        volume: market.volume,
                    },
                );
            }
        }
    }

    pub fn get(&self, market_id: &str) -> Option<&MarketHistory> {
        self.markets.get(market_id)
    }

    pub fn tracked(&self) -> usize {
        self.markets.len()
    }

    /// Forget markets that no longer appear in listings
    pub fn retain(&mut self, markets: &[Market]) {
        self.markets
            .retain(|id, _| markets.iter().any(|m| &m.id == id));
    }
}
