//! Gamma API client for market listings
//!
//! Gamma encodes several numeric fields as strings and the outcome prices as
//! a JSON array inside a string (`"[\"0.55\", \"0.45\"]"`). Anything that does
//! not parse is left as `None` so the filter can reject it.

use super::MarketSource;
use crate::config::GammaConfig;
use crate::error::{BotError, Result};
use crate::types::{Market, MarketStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

#[derive(Clone)]
pub struct GammaClient {
    http: Client,
    base_url: String,
    limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GammaMarket {
    id: String,
    question: String,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    volume: Option<Value>,
    liquidity: Option<Value>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    closed: bool,
    #[serde(rename = "outcomePrices")]
    outcome_prices: Option<String>,
    #[serde(default)]
    events: Vec<GammaEventRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct GammaEventRef {
    id: String,
}

impl GammaClient {
    pub fn new(config: &GammaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limit: config.limit,
        })
    }

    /// Open markets, highest volume first
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        let url = format!("{}/markets", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("order", "volumeNum"),
                ("ascending", "false"),
                ("limit", &self.limit.to_string()),
            ])
            .send()
            .await?;

        let listings: Vec<GammaMarket> = check_status(resp).await?.json().await?;
        let total = listings.len();
        let markets: Vec<Market> = listings.into_iter().filter_map(parse_market).collect();
        debug!("Gamma returned {} listings, {} parsed", total, markets.len());
        Ok(markets)
    }

    /// A single market by id, whatever its status
    pub async fn get_market(&self, market_id: &str) -> Result<Option<Market>> {
        let url = format!("{}/markets/{}", self.base_url, market_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let listing: GammaMarket = check_status(resp).await?.json().await?;
        Ok(parse_market(listing))
    }
}

#[async_trait]
impl MarketSource for GammaClient {
    async fn fetch_markets(&self) -> Result<Vec<Market>> {
        self.get_markets().await
    }

    async fn fetch_market(&self, market_id: &str) -> Result<Option<Market>> {
        self.get_market(market_id).await
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_server_error() || status.as_u16() == 429 {
        return Err(BotError::Transient(format!("Gamma returned {status}")));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(BotError::Api(format!("Gamma returned {status}: {body}")));
    }
    Ok(resp)
}

pub(crate) fn parse_market(gm: GammaMarket) -> Option<Market> {
    if gm.id.is_empty() {
        return None;
    }

    let prices = gm.outcome_prices.as_deref().map(parse_prices).unwrap_or_default();
    let price = prices.first().copied();

    let status = match (gm.active, gm.closed) {
        (_, true) if prices.iter().any(|p| *p == Decimal::ONE) => MarketStatus::Settled,
        (true, false) => MarketStatus::Active,
        _ => MarketStatus::Closed,
    };

    Some(Market {
        id: gm.id,
        question: gm.question,
        price,
        volume: gm.volume.as_ref().and_then(parse_decimal),
        liquidity: gm.liquidity.as_ref().and_then(parse_decimal),
        close_time: gm
            .end_date
            .as_deref()
            .and_then(|s| s.parse::<DateTime<Utc>>().ok()),
        status,
        event_id: gm.events.into_iter().next().map(|e| e.id),
    })
}

/// `["0.55", "0.45"]` or `[0.55, 0.45]`
fn parse_prices(raw: &str) -> Vec<Decimal> {
    if let Ok(strings) = serde_json::from_str::<Vec<String>>(raw) {
        return strings
            .iter()
            .filter_map(|p| Decimal::from_str(p.trim()).ok())
            .collect();
    }
    serde_json::from_str::<Vec<f64>>(raw)
        .map(|floats| floats.into_iter().filter_map(|p| Decimal::try_from(p).ok()).collect())
        .unwrap_or_default()
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    }
}
