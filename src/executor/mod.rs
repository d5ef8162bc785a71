//! Order execution
//!
//! Wraps the exchange with pre-flight validation and retry. Every attempt
//! carries the order's `client_id`, so a retry after a timed-out placement
//! that did fill is answered with the original fill. Any failure that
//! survives the retry policy comes back as [`BotError::Execution`] so the
//! caller can log the decision as failed without touching the portfolio.


use crate::client::Exchange;
use crate::error::{BotError, Result};
use crate::types::Order;
use crate::utils::RetryPolicy;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Executor {
    exchange: Arc<dyn Exchange>,
    retry: RetryPolicy,
}

impl Executor {
    pub fn new(exchange: Arc<dyn Exchange>, retry: RetryPolicy) -> Self {
        Self { exchange, retry }
    }

    /// Place an order, returning the exchange order id
    pub async fn submit(&self, order: &Order) -> Result<String> {
        validate(order)?;

        info!(
            "Placing order {}: {:?} {} {:.2} @ {:.4} on {}",
            order.client_id, order.action, order.side, order.size, order.price, order.market_id
        );

        let exchange = &self.exchange;
        match self
            .retry
            .run("place order", || exchange.place_order(order))
            .await
        {
            Ok(order_id) => Ok(order_id),
            Err(BotError::Execution(msg)) => {
                warn!("Order on {} rejected: {}", order.market_id, msg);
                Err(BotError::Execution(msg))
            }
            Err(e) => {
                warn!("Order on {} failed: {}", order.market_id, e);
                Err(BotError::Execution(e.to_string()))
            }
        }
    }
}

fn validate(order: &Order) -> Result<()> {
    if order.price <= Decimal::ZERO || order.price >= Decimal::ONE {
        return Err(BotError::Execution(format!(
            "limit price {} outside (0, 1)",
            order.price
        )));
    }
    if order.size <= Decimal::ZERO {
        return Err(BotError::Execution(format!(
            "order size must be positive, got {}",
            order.size
        )));
    }
    Ok(())
}
