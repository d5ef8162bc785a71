//! Pattern detectors
//!
//! Five independent heuristics, each scoring 0-50 points. The engine sums
//! them (capped at 100) and picks the strongest as the dominant pattern.

use super::MarketContext;
use crate::config::PatternConfig;
use crate::types::{Market, PatternKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Points any single detector may award
pub const DETECTOR_CAP: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
/// Cap on the combined score
pub const TOTAL_CAP: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn of(delta: Decimal) -> Option<Direction> {
        if delta > Decimal::ZERO {
            Some(Direction::Up)
        } else if delta < Decimal::ZERO {
            Some(Direction::Down)
        } else {
            None
        }
    }
}

/// Output of one detector
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub kind: PatternKind,
    pub score: Decimal,
    /// Expected direction of the YES price, when the pattern implies one
    pub direction: Option<Direction>,
    pub reasons: Vec<String>,
}

impl Detection {
    fn none(kind: PatternKind) -> Self {
        Self {
            kind,
            score: Decimal::ZERO,
            direction: None,
            reasons: Vec::new(),
        }
    }
}

pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> PatternKind;

    fn detect(&self, market: &Market, ctx: &MarketContext) -> Detection;
}

/// Combined result for one market. Never persisted.
#[derive(Debug, Clone)]
pub struct PatternScore {
    pub detections: Vec<Detection>,
    pub total: Decimal,
    pub dominant: Option<PatternKind>,
}

impl PatternScore {
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        let total = detections
            .iter()
            .map(|d| d.score)
            .sum::<Decimal>()
            .min(TOTAL_CAP);

        // strict comparison keeps the earliest detector on ties
        let mut dominant: Option<&Detection> = None;
        for detection in detections.iter().filter(|d| d.score > Decimal::ZERO) {
            if dominant.map_or(true, |best| detection.score > best.score) {
                dominant = Some(detection);
            }
        }
        let dominant = dominant.map(|d| d.kind);

        Self {
            detections,
            total,
            dominant,
        }
    }

    pub fn get(&self, kind: PatternKind) -> Option<&Detection> {
        self.detections.iter().find(|d| d.kind == kind)
    }

    pub fn score_of(&self, kind: PatternKind) -> Decimal {
        self.get(kind).map(|d| d.score).unwrap_or(Decimal::ZERO)
    }

    pub fn direction_of(&self, kind: PatternKind) -> Option<Direction> {
        self.get(kind).and_then(|d| d.direction)
    }

    /// Score that can justify a reasoning query. Arbitrage is a pure price
    /// comparison and never asks for confirmation.
    pub fn escalation_score(&self) -> Decimal {
        (self.total - self.score_of(PatternKind::Arbitrage)).max(Decimal::ZERO)
    }

    pub fn reasons(&self) -> Vec<&str> {
        self.detections
            .iter()
            .flat_map(|d| d.reasons.iter().map(String::as_str))
            .collect()
    }
}

/// Fixed set of detectors run in tie-break order
pub struct PatternEngine {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl PatternEngine {
    pub fn new(config: &PatternConfig) -> Self {
        Self {
            detectors: vec![
                Box::new(MispricingDetector::new(config.clone())),
                Box::new(MomentumDetector::new(config.clone())),
                Box::new(ReversalDetector::new(config.clone())),
                Box::new(ArbitrageDetector::new(config.clone())),
                Box::new(EventDrivenDetector::new(config.clone())),
            ],
        }
    }

    pub fn analyze(&self, market: &Market, ctx: &MarketContext) -> PatternScore {
        let detections = self
            .detectors
            .iter()
            .map(|d| {
                let mut detection = d.detect(market, ctx);
                detection.score = detection.score.clamp(Decimal::ZERO, DETECTOR_CAP);
                detection
            })
            .collect();
        PatternScore::from_detections(detections)
    }
}

/// Liquidity gaps, stale prices under volume, and event-sibling divergence
pub struct MispricingDetector {
    config: PatternConfig,
}

impl MispricingDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }
}

impl PatternDetector for MispricingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Mispricing
    }

    fn detect(&self, market: &Market, ctx: &MarketContext) -> Detection {
        let Some(price) = market.price else {
            return Detection::none(self.kind());
        };
        let mut detection = Detection::none(self.kind());

        let extreme = price < self.config.extreme_low || price > self.config.extreme_high;
        let thin = market
            .liquidity
            .map_or(false, |l| l < self.config.mispricing_max_liquidity);
        if thin && extreme {
            detection.score += Decimal::from(20);
            detection
                .reasons
                .push(format!("Thin book at extreme price {price}"));
        }

        if let Some((latest, prior)) = ctx.volumes.split_last() {
            if !prior.is_empty() && ctx.prices.len() >= 2 {
                let mean = prior.iter().sum::<Decimal>() / Decimal::from(prior.len());
                let moved = (ctx.prices[ctx.prices.len() - 1] - ctx.prices[0]).abs();
                if mean > Decimal::ZERO
                    && *latest >= mean * self.config.volume_spike_ratio
                    && moved < self.config.stable_price_move
                {
                    detection.score += Decimal::from(15);
                    detection
                        .reasons
                        .push("Volume spike without price adjustment".to_string());
                }
            }
        }

        if let Some(mean) = ctx.sibling_mean {
            let deviation = (price - mean).abs();
            if deviation >= self.config.event_deviation {
                detection.score += (deviation * Decimal::ONE_HUNDRED).min(Decimal::from(30));
                detection.direction = Direction::of(mean - price);
                detection.reasons.push(format!(
                    "Price {price} deviates {deviation} from event siblings"
                ));
            }
        }

        detection
    }
}

/// Consistent, volume-backed trends
pub struct MomentumDetector {
    config: PatternConfig,
}

impl MomentumDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }
}

impl PatternDetector for MomentumDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Momentum
    }

    fn detect(&self, _market: &Market, ctx: &MarketContext) -> Detection {
        let mut detection = Detection::none(self.kind());
        let prices = &ctx.prices;
        if prices.len() < self.config.momentum_min_points {
            return detection;
        }

        let volume_backed =
            ctx.volumes.len() >= 2 && ctx.volumes.windows(2).all(|w| w[1] >= w[0]);
        if !volume_backed {
            return detection;
        }

        let net = prices[prices.len() - 1] - prices[0];
        let Some(direction) = Direction::of(net) else {
            return detection;
        };

        let signs: Vec<bool> = prices
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| !d.is_zero())
            .map(|d| d > Decimal::ZERO)
            .collect();
        let reversals = signs.windows(2).filter(|w| w[0] != w[1]).count();
        let consistency = if signs.len() <= 1 {
            Decimal::ONE
        } else {
            Decimal::ONE - Decimal::from(reversals) / Decimal::from(signs.len() - 1)
        };

        detection.score = Decimal::from(10)
            + Decimal::from(25) * consistency
            + (net.abs() * Decimal::ONE_HUNDRED).min(Decimal::from(15));
        detection.direction = Some(direction);
        detection.reasons.push(format!(
            "{:?} trend of {} over {} observations with {} reversals",
            direction,
            net,
            prices.len(),
            reversals
        ));
        detection
    }
}

/// Overextended moves into an extreme on a thin book
pub struct ReversalDetector {
    config: PatternConfig,
}

impl ReversalDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }
}

impl PatternDetector for ReversalDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Reversal
    }

    fn detect(&self, market: &Market, ctx: &MarketContext) -> Detection {
        let mut detection = Detection::none(self.kind());
        let (Some(price), Some(liquidity)) = (market.price, market.liquidity) else {
            return detection;
        };

        let extreme = price > self.config.reversal_high || price < self.config.reversal_low;
        let window = self.config.reversal_window.max(2);
        if !extreme || ctx.prices.len() < window || liquidity >= self.config.reversal_max_liquidity
        {
            return detection;
        }

        let last = ctx.prices[ctx.prices.len() - 1];
        let start = ctx.prices[ctx.prices.len() - window];
        let movement = last - start;
        if movement.abs() <= self.config.reversal_min_move {
            return detection;
        }

        let overextension = (movement.abs() * Decimal::ONE_HUNDRED).min(Decimal::from(30));
        let thinness = if self.config.reversal_max_liquidity > Decimal::ZERO {
            Decimal::ONE - liquidity / self.config.reversal_max_liquidity
        } else {
            Decimal::ZERO
        };
        detection.score = overextension + Decimal::from(20) * thinness.max(Decimal::ZERO);
        detection.direction = Direction::of(movement);
        detection.reasons.push(format!(
            "Moved {movement} into extreme {price} on {liquidity} liquidity"
        ));
        detection
    }
}

/// Cross-venue price gap
pub struct ArbitrageDetector {
    config: PatternConfig,
}

impl ArbitrageDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }
}

impl PatternDetector for ArbitrageDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Arbitrage
    }

    fn detect(&self, market: &Market, ctx: &MarketContext) -> Detection {
        let mut detection = Detection::none(self.kind());
        let (Some(price), Some(counterpart)) = (market.price, ctx.counterpart_price) else {
            return detection;
        };

        let gap = (counterpart - price).abs();
        if gap >= self.config.arbitrage_min_gap {
            detection.score = gap * Decimal::from(200);
            detection.direction = Direction::of(counterpart - price);
            detection
                .reasons
                .push(format!("Counterpart venue at {counterpart} vs {price}"));
        }
        detection
    }
}

/// Fresh news or an imminent scheduled event, amplified by attention spikes
pub struct EventDrivenDetector {
    config: PatternConfig,
}

impl EventDrivenDetector {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    fn breaking_score(&self, ctx: &MarketContext) -> Decimal {
        let Some(news) = &ctx.news else {
            return Decimal::ZERO;
        };
        let age = hours_between(news.published_at, ctx.now);
        let window = self.config.news_window_hours;
        if age < Decimal::ZERO || age >= window || window <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        Decimal::from(30) * (Decimal::ONE - age / window)
    }

    fn scheduled_score(&self, market: &Market, ctx: &MarketContext) -> Decimal {
        let event_at = ctx
            .news
            .as_ref()
            .and_then(|n| n.scheduled_at)
            .or(market.close_time);
        let Some(event_at) = event_at else {
            return Decimal::ZERO;
        };
        let hours = hours_between(ctx.now, event_at);
        let max = self.config.event_max_hours;
        if hours < self.config.event_min_hours || hours > max || max <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        Decimal::from(20) * (Decimal::ONE - hours / max)
    }
}

impl PatternDetector for EventDrivenDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::EventDriven
    }

    fn detect(&self, market: &Market, ctx: &MarketContext) -> Detection {
        let mut detection = Detection::none(self.kind());

        let recency = self.breaking_score(ctx).max(self.scheduled_score(market, ctx));
        if recency.is_zero() {
            return detection;
        }
        detection.score = recency;
        detection.reasons.push(format!("Recent or imminent event ({recency} pts)"));

        let ratio = ctx.news.as_ref().and_then(|n| n.attention_ratio);
        if let Some(ratio) = ratio {
            if ratio >= self.config.attention_spike_ratio {
                let bonus = ((ratio - Decimal::ONE) * Decimal::from(10)).min(Decimal::from(20));
                detection.score += bonus;
                detection.reasons.push(format!("Attention spike x{ratio}"));
            }
        }
        detection
    }
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    Decimal::from((to - from).num_seconds()) / Decimal::from(3600)
}
