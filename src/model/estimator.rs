//! Probability, edge and confidence estimation

use super::{Confirmation, ConfirmationStatus};
use crate::analysis::{Direction, MarketContext, PatternScore};
use crate::config::{ConfirmationConfig, StrategyConfig};
use crate::types::{Market, PatternKind, ReasonCode, Side};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbabilityEstimate {
    pub market_id: String,
    pub market_price: Decimal,
    /// Estimated probability of YES
    pub probability: Decimal,
    /// Absolute gap between estimate and price, never negative
    pub edge: Decimal,
    pub confidence: Decimal,
    pub side: Side,
    pub dominant: Option<PatternKind>,
}

impl ProbabilityEstimate {
    /// Estimated probability that `side` wins
    pub fn side_probability(&self) -> Decimal {
        match self.side {
            Side::Yes => self.probability,
            Side::No => Decimal::ONE - self.probability,
        }
    }

    /// Price paid per share of `side`
    pub fn side_price(&self) -> Decimal {
        match self.side {
            Side::Yes => self.market_price,
            Side::No => Decimal::ONE - self.market_price,
        }
    }
}

pub struct ProbabilityEdgeEstimator {
    strategy: StrategyConfig,
    confirmation: ConfirmationConfig,
}

impl ProbabilityEdgeEstimator {
    pub fn new(strategy: StrategyConfig, confirmation: ConfirmationConfig) -> Self {
        Self {
            strategy,
            confirmation,
        }
    }

    /// Build the estimate. `None` if the market has no price.
    pub fn estimate(
        &self,
        market: &Market,
        score: &PatternScore,
        confirmation: &Confirmation,
        ctx: &MarketContext,
    ) -> Option<ProbabilityEstimate> {
        let price = market.price?;

        let mut probability = price + self.pattern_adjustment(price, score, ctx);
        if let Some(confirmed) = confirmation.probability {
            probability += self.confirmation.trust * (confirmed - price);
        }
        let probability =
            probability.clamp(self.strategy.min_estimate, self.strategy.max_estimate);

        let edge = (probability - price).abs();
        let side = if probability >= price { Side::Yes } else { Side::No };

        let mut confidence = score.total / Decimal::ONE_HUNDRED;
        if confirmation.status == ConfirmationStatus::Unconfirmed {
            confidence -= self.confirmation.unconfirmed_penalty;
        }
        match confirmation.sentiment {
            Some(sentiment) if sentiment.favours(side) => {
                confidence += self.confirmation.sentiment_bonus
            }
            Some(_) => confidence -= self.confirmation.sentiment_bonus,
            None => {}
        }
        let confidence = confidence.clamp(Decimal::ZERO, Decimal::ONE);

        Some(ProbabilityEstimate {
            market_id: market.id.clone(),
            market_price: price,
            probability,
            edge,
            confidence,
            side,
            dominant: score.dominant,
        })
    }

    /// Admit or skip with a reason code
    pub fn evaluate(
        &self,
        market: &Market,
        score: &PatternScore,
        confirmation: &Confirmation,
        ctx: &MarketContext,
    ) -> std::result::Result<ProbabilityEstimate, ReasonCode> {
        if confirmation.is_resolved() {
            return Err(ReasonCode::AlreadyResolved);
        }
        let estimate = self
            .estimate(market, score, confirmation, ctx)
            .ok_or(ReasonCode::InsufficientEdge)?;

        if estimate.edge < self.strategy.min_edge {
            return Err(ReasonCode::InsufficientEdge);
        }
        if estimate.confidence < self.strategy.min_confidence {
            return Err(ReasonCode::InsufficientConfidence);
        }
        Ok(estimate)
    }

    /// Shift implied by the dominant pattern
    fn pattern_adjustment(&self, price: Decimal, score: &PatternScore, ctx: &MarketContext) -> Decimal {
        let Some(dominant) = score.dominant else {
            return Decimal::ZERO;
        };
        let direction = score.direction_of(dominant);

        match dominant {
            PatternKind::Momentum => match direction {
                Some(Direction::Up) => self.strategy.momentum_adjustment,
                Some(Direction::Down) => -self.strategy.momentum_adjustment,
                None => Decimal::ZERO,
            },
            // fade the move
            PatternKind::Reversal => match direction {
                Some(Direction::Up) => -self.strategy.reversal_adjustment,
                Some(Direction::Down) => self.strategy.reversal_adjustment,
                None => Decimal::ZERO,
            },
            PatternKind::Mispricing => {
                if price > Decimal::new(75, 2) {
                    -self.strategy.mispricing_adjustment
                } else if price < Decimal::new(25, 2) {
                    self.strategy.mispricing_adjustment
                } else {
                    Decimal::ZERO
                }
            }
            PatternKind::Arbitrage => ctx
                .counterpart_price
                .map(|q| q - price)
                .unwrap_or(Decimal::ZERO),
            PatternKind::EventDriven => Decimal::ZERO,
        }
    }
}
