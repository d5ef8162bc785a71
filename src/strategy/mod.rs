//! Position sizing and hedging

pub mod hedging;


pub use hedging::{HedgePlan, HedgingManager};

use crate::config::StrategyConfig;
use crate::model::ProbabilityEstimate;
use crate::portfolio::Portfolio;
use crate::types::ReasonCode;
use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional Kelly sizing bounded by portfolio limits
pub struct PositionSizer {
    config: StrategyConfig,
}

impl PositionSizer {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Full Kelly fraction for a binary contract
    ///
    /// f* = (b * p - q) / b, where
    ///   p = probability the backed side wins
    ///   q = 1 - p
    ///   b = net odds = (1 - price) / price
    pub fn raw_kelly(probability: Decimal, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO || price >= Decimal::ONE {
            return Decimal::ZERO;
        }
        let b = (Decimal::ONE - price) / price;
        let q = Decimal::ONE - probability;
        (b * probability - q) / b
    }

    /// Currency amount to commit, or the reason not to trade
    pub fn size(
        &self,
        estimate: &ProbabilityEstimate,
        portfolio: &Portfolio,
    ) -> Result<Decimal, ReasonCode> {
        let raw = Self::raw_kelly(estimate.side_probability(), estimate.side_price());
        if raw <= Decimal::ZERO {
            return Err(ReasonCode::NonPositiveKelly);
        }

        let available = portfolio.available();
        let cap = self.config.max_position_pct * portfolio.balance();
        let size = (raw * self.config.kelly_multiplier * available)
            .min(cap)
            .min(available)
            .max(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);

        if size <= Decimal::ZERO {
            return Err(ReasonCode::InsufficientCapital);
        }
        Ok(size)
    }
}
