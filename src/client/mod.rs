//! Venue connectivity: market listings, order placement and external signals

pub mod gamma;
pub mod news;
pub mod paper;


pub use gamma::GammaClient;
pub use news::NewsFeed;
pub use paper::PaperExchange;

use crate::error::Result;
use crate::types::{Market, Order, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shares held on the venue for one market side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub market_id: String,
    pub side: Side,
    pub shares: Decimal,
    /// Currency paid for the shares still held
    pub cost: Decimal,
}

/// Trading venue
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Current listing snapshot
    async fn get_markets(&self) -> Result<Vec<Market>>;

    /// Look up one market, including closed and settled ones
    async fn get_market(&self, _market_id: &str) -> Result<Option<Market>> {
        Ok(None)
    }

    async fn get_balance(&self) -> Result<Decimal>;

    async fn get_positions(&self) -> Result<Vec<Holding>>;

    /// Place an order, returning the venue's order id. Placing an order
    /// whose `client_id` was already accepted returns the original id.
    async fn place_order(&self, order: &Order) -> Result<String>;
}

/// Read-only listing feed
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_markets(&self) -> Result<Vec<Market>>;

    async fn fetch_market(&self, market_id: &str) -> Result<Option<Market>>;
}
