//! Protective counter-positions for low-confidence admissions

use crate::config::HedgeConfig;
use crate::types::{Market, Position, Side};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Hedge to open on the opposite side of a main position
#[derive(Debug, Clone, PartialEq)]
pub struct HedgePlan {
    pub main_position_id: Uuid,
    pub market_id: String,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
}

pub struct HedgingManager {
    config: HedgeConfig,
}

impl HedgingManager {
    pub fn new(config: HedgeConfig) -> Self {
        Self { config }
    }

    pub fn needs_hedge(&self, confidence: Decimal) -> bool {
        self.config.enabled && confidence < self.config.confidence_threshold
    }

    /// min(size * ratio, max_hedge); `None` when the main position is too small
    pub fn hedge_size(&self, main_size: Decimal) -> Option<Decimal> {
        if main_size < self.config.min_position {
            return None;
        }
        let size = (main_size * self.config.hedge_ratio).min(self.config.max_hedge);
        (size > Decimal::ZERO).then_some(size)
    }

    /// Plan a hedge for a freshly opened main position
    pub fn plan(&self, main: &Position, market: &Market) -> Option<HedgePlan> {
        if main.is_hedge || !self.needs_hedge(main.confidence) {
            return None;
        }
        let size = self.hedge_size(main.size)?;
        let side = main.side.opposite();
        let price = market.price_of(side)?;
        if price <= Decimal::ZERO || price >= Decimal::ONE {
            return None;
        }

        Some(HedgePlan {
            main_position_id: main.id,
            market_id: main.market_id.clone(),
            side,
            size,
            price,
        })
    }
}
