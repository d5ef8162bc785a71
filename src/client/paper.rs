//! Paper exchange: real listings, simulated fills
//!
//! Orders fill immediately at the requested price against an in-memory cash
//! balance. Holdings on markets seen as settled are redeemed at the
//! settlement price the next time listings are fetched.

use super::{Exchange, Holding, MarketSource};
use crate::error::{BotError, Result};
use crate::portfolio::Portfolio;
use crate::types::{Market, MarketStatus, Order, OrderAction, Side};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

struct Book {
    cash: Decimal,
    holdings: HashMap<(String, Side), Holding>,
    /// Venue order id per accepted client id
    accepted: HashMap<Uuid, String>,
}

pub struct PaperExchange {
    source: Box<dyn MarketSource>,
    book: Mutex<Book>,
}

impl PaperExchange {
    pub fn new(source: Box<dyn MarketSource>, cash: Decimal) -> Self {
        Self {
            source,
            book: Mutex::new(Book {
                cash,
                holdings: HashMap::new(),
                accepted: HashMap::new(),
            }),
        }
    }

    /// Rebuild the paper book from a replayed portfolio so restored
    /// positions can still be sold
    pub fn from_portfolio(source: Box<dyn MarketSource>, portfolio: &Portfolio) -> Self {
        let exchange = Self::new(source, portfolio.available());
        {
            let mut book = exchange.book.lock();
            for position in portfolio.positions() {
                let holding = book
                    .holdings
                    .entry((position.market_id.clone(), position.side))
                    .or_insert_with(|| Holding {
                        market_id: position.market_id.clone(),
                        side: position.side,
                        shares: Decimal::ZERO,
                        cost: Decimal::ZERO,
                    });
                holding.shares += position.size / position.entry_price;
                holding.cost += position.size;
            }
        }
        exchange
    }

    /// Fill `order` unless its client id was already accepted. Returns the
    /// venue order id and whether this call filled it.
    fn fill(&self, order: &Order) -> Result<(String, bool)> {
        if order.price <= Decimal::ZERO || order.price >= Decimal::ONE {
            return Err(BotError::Execution(format!(
                "price {} outside (0, 1)",
                order.price
            )));
        }
        if order.size <= Decimal::ZERO {
            return Err(BotError::Execution(format!("non-positive size {}", order.size)));
        }

        let mut book = self.book.lock();
        if let Some(order_id) = book.accepted.get(&order.client_id) {
            return Ok((order_id.clone(), false));
        }
        let key = (order.market_id.clone(), order.side);
        match order.action {
            OrderAction::Buy => {
                if order.size > book.cash {
                    return Err(BotError::Execution(format!(
                        "insufficient paper cash: {} > {}",
                        order.size, book.cash
                    )));
                }
                book.cash -= order.size;
                let holding = book.holdings.entry(key).or_insert_with(|| Holding {
                    market_id: order.market_id.clone(),
                    side: order.side,
                    shares: Decimal::ZERO,
                    cost: Decimal::ZERO,
                });
                holding.shares += order.shares();
                holding.cost += order.size;
            }
            OrderAction::Sell => {
                let holding = book.holdings.get_mut(&key).ok_or_else(|| {
                    BotError::Execution(format!(
                        "no {} shares held on {}",
                        order.side, order.market_id
                    ))
                })?;
                let sold = order.shares().min(holding.shares);
                let fraction = sold / holding.shares;
                holding.cost -= holding.cost * fraction;
                holding.shares -= sold;
                let proceeds = sold * order.price;
                if holding.shares.is_zero() {
                    book.holdings.remove(&key);
                }
                book.cash += proceeds;
            }
        }
        let order_id = format!("paper-{}", Uuid::new_v4());
        book.accepted.insert(order.client_id, order_id.clone());
        Ok((order_id, true))
    }

    /// Pay out holdings on settled markets
    fn redeem(&self, markets: &[Market]) {
        let mut book = self.book.lock();
        for market in markets.iter().filter(|m| m.status == MarketStatus::Settled) {
            for side in [Side::Yes, Side::No] {
                let Some(payout) = market.price_of(side) else {
                    continue;
                };
                if let Some(holding) = book.holdings.remove(&(market.id.clone(), side)) {
                    let proceeds = holding.shares * payout;
                    info!(
                        "[PAPER] Redeemed {} {} shares of {} for {:.2}",
                        holding.shares, side, market.id, proceeds
                    );
                    book.cash += proceeds;
                }
            }
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn get_markets(&self) -> Result<Vec<Market>> {
        let markets = self.source.fetch_markets().await?;
        self.redeem(&markets);
        Ok(markets)
    }

    async fn get_market(&self, market_id: &str) -> Result<Option<Market>> {
        let market = self.source.fetch_market(market_id).await?;
        if let Some(m) = &market {
            self.redeem(std::slice::from_ref(m));
        }
        Ok(market)
    }

    async fn get_balance(&self) -> Result<Decimal> {
        Ok(self.book.lock().cash)
    }

    async fn get_positions(&self) -> Result<Vec<Holding>> {
        let book = self.book.lock();
        let mut holdings: Vec<Holding> = book.holdings.values().cloned().collect();
        holdings.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        Ok(holdings)
    }

    async fn place_order(&self, order: &Order) -> Result<String> {
        let (order_id, filled) = self.fill(order)?;
        if filled {
            info!(
                "[PAPER] {:?} {} {} @ {} on {} ({})",
                order.action, order.size, order.side, order.price, order.market_id, order_id
            );
        } else {
            debug!("[PAPER] Duplicate submission of {} ignored", order.client_id);
        }
        Ok(order_id)
    }
}
