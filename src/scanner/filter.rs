//! Hard-threshold market eligibility

use crate::config::FilterConfig;
use crate::types::Market;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::debug;

/// Why a market was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingField(&'static str),
    InvalidPrice,
    Inactive,
    LowLiquidity,
    LowVolume,
    ClosingSoon,
    PriceOutOfBand,
}

/// Per-reason rejection counts for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub total: usize,
    pub passed: usize,
    pub missing_fields: usize,
    pub invalid_price: usize,
    pub inactive: usize,
    pub low_liquidity: usize,
    pub low_volume: usize,
    pub closing_soon: usize,
    pub price_out_of_band: usize,
}

impl FilterStats {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::MissingField(_) => self.missing_fields += 1,
            Rejection::InvalidPrice => self.invalid_price += 1,
            Rejection::Inactive => self.inactive += 1,
            Rejection::LowLiquidity => self.low_liquidity += 1,
            Rejection::LowVolume => self.low_volume += 1,
            Rejection::ClosingSoon => self.closing_soon += 1,
            Rejection::PriceOutOfBand => self.price_out_of_band += 1,
        }
    }
}

pub struct MarketFilter {
    config: FilterConfig,
}

impl MarketFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Eligible subset of `markets`, in input order
    pub fn apply(&self, markets: &[Market], now: DateTime<Utc>) -> Vec<Market> {
        self.apply_with_stats(markets, now).0
    }

    pub fn apply_with_stats(
        &self,
        markets: &[Market],
        now: DateTime<Utc>,
    ) -> (Vec<Market>, FilterStats) {
        let mut stats = FilterStats {
            total: markets.len(),
            ..Default::default()
        };

        let eligible: Vec<Market> = markets
            .iter()
            .filter(|m| match self.check(m, now) {
                Ok(()) => true,
                Err(rejection) => {
                    stats.record(rejection);
                    false
                }
            })
            .cloned()
            .collect();

        stats.passed = eligible.len();
        debug!(
            "Filter: {}/{} passed (missing={} inactive={} liquidity={} volume={} closing={} band={})",
            stats.passed,
            stats.total,
            stats.missing_fields,
            stats.inactive,
            stats.low_liquidity,
            stats.low_volume,
            stats.closing_soon,
            stats.price_out_of_band
        );
        (eligible, stats)
    }

    /// Check one market. Missing data fails closed.
    pub fn check(&self, market: &Market, now: DateTime<Utc>) -> Result<(), Rejection> {
        if !market.is_active() {
            return Err(Rejection::Inactive);
        }
        let price = market.price.ok_or(Rejection::MissingField("price"))?;
        let liquidity = market.liquidity.ok_or(Rejection::MissingField("liquidity"))?;
        let volume = market.volume.ok_or(Rejection::MissingField("volume"))?;
        let close_time = market.close_time.ok_or(Rejection::MissingField("close_time"))?;

        if price < Decimal::ZERO || price > Decimal::ONE {
            return Err(Rejection::InvalidPrice);
        }
        if liquidity < self.config.min_liquidity {
            return Err(Rejection::LowLiquidity);
        }
        if volume < self.config.min_volume {
            return Err(Rejection::LowVolume);
        }
        if close_time - now < Duration::days(self.config.min_days_to_close) {
            return Err(Rejection::ClosingSoon);
        }
        if price < self.config.min_price || price > self.config.max_price {
            return Err(Rejection::PriceOutOfBand);
        }
        Ok(())
    }
}
