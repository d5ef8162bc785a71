//! Quantitative scoring and top-K selection

use crate::config::ScoringConfig;
use crate::types::Market;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Component scores, each capped: liquidity 25, volume 25, uncertainty 50
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub liquidity: Decimal,
    pub volume: Decimal,
    pub uncertainty: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct ScoredMarket {
    pub market: Market,
    pub score: ScoreBreakdown,
}

pub struct QuantitativeScorer {
    config: ScoringConfig,
}

impl QuantitativeScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a market. `None` when a field the score needs is missing.
    pub fn score(&self, market: &Market) -> Option<ScoreBreakdown> {
        let liquidity = market.liquidity?;
        let volume = market.volume?;
        let price = market.price?;

        let quarter = Decimal::from(25);
        let half = Decimal::from(50);

        let liquidity = saturate(liquidity, self.config.liquidity_target) * quarter;
        let volume = saturate(volume, self.config.volume_target) * quarter;
        // 50 at the midpoint, falling linearly to 0 at either bound
        let distance = (price - Decimal::new(5, 1)).abs() * Decimal::TWO;
        let uncertainty = (Decimal::ONE - distance).max(Decimal::ZERO) * half;

        Some(ScoreBreakdown {
            liquidity,
            volume,
            uncertainty,
            total: liquidity + volume + uncertainty,
        })
    }

    /// Score, drop below `min_score`, sort and keep the top K
    pub fn rank(&self, markets: Vec<Market>) -> Vec<ScoredMarket> {
        let mut scored: Vec<ScoredMarket> = markets
            .into_iter()
            .filter_map(|market| {
                let score = self.score(&market)?;
                Some(ScoredMarket { market, score })
            })
            .filter(|s| s.score.total >= self.config.min_score)
            .collect();

        scored.sort_by(compare_ranked);
        scored.truncate(self.config.top_k);
        scored
    }
}

fn saturate(value: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ONE;
    }
    (value / target).min(Decimal::ONE).max(Decimal::ZERO)
}

/// Higher score first, then deeper liquidity, then sooner close
fn compare_ranked(a: &ScoredMarket, b: &ScoredMarket) -> Ordering {
    b.score
        .total
        .cmp(&a.score.total)
        .then_with(|| b.market.liquidity.cmp(&a.market.liquidity))
        .then_with(|| a.market.close_time.cmp(&b.market.close_time))
}
