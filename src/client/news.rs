//! NewsAPI-backed signal feed
//!
//! Searches recent coverage using keywords pulled from the market question
//! and reports the freshest headline together with an attention ratio: the
//! article rate over the recent window divided by the rate over the
//! baseline window.

use crate::analysis::{NewsSignal, SignalFeed};
use crate::config::NewsConfig;
use crate::error::{BotError, Result};
use crate::types::Market;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

const STOP_WORDS: &[&str] = &[
    "will", "be", "the", "a", "an", "in", "on", "at", "to", "by", "for", "of", "or", "and",
    "before", "after", "than", "with", "this", "that", "from",
];

pub struct NewsFeed {
    http: Client,
    config: NewsConfig,
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Article {
    pub title: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
}

impl NewsFeed {
    pub fn new(config: NewsConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    async fn search(&self, query: &str, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let url = format!("{}/everything", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.config.api_key)
            .query(&[
                ("q", query),
                ("from", &since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("pageSize", "100"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(BotError::Transient(format!("news search returned {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Api(format!("news search returned {status}: {body}")));
        }

        let body: EverythingResponse = resp.json().await?;
        Ok(body.articles)
    }
}

#[async_trait]
impl SignalFeed for NewsFeed {
    async fn news(&self, market: &Market) -> Result<Option<NewsSignal>> {
        let keywords = extract_keywords(&market.question, self.config.max_keywords);
        if keywords.is_empty() {
            return Ok(None);
        }
        let query = keywords.join(" ");
        let now = Utc::now();
        let since = now - Duration::hours(self.config.baseline_hours);

        let articles = self.search(&query, since).await?;
        debug!("{} articles for '{}'", articles.len(), query);
        Ok(summarize(
            &articles,
            now,
            self.config.recent_hours,
            self.config.baseline_hours,
        ))
    }

    fn name(&self) -> &str {
        "newsapi"
    }
}

/// Search terms from a market question: lowercase words longer than three
/// letters that are not stop words, in question order
pub fn extract_keywords(question: &str, max: usize) -> Vec<String> {
    question
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(&w.as_str()))
        .take(max)
        .collect()
}

/// Freshest headline plus attention ratio, `None` without coverage
pub(crate) fn summarize(
    articles: &[Article],
    now: DateTime<Utc>,
    recent_hours: i64,
    baseline_hours: i64,
) -> Option<NewsSignal> {
    let baseline_start = now - Duration::hours(baseline_hours);
    let in_window: Vec<&Article> = articles
        .iter()
        .filter(|a| a.published_at >= baseline_start && a.published_at <= now)
        .collect();
    let latest = in_window.iter().max_by_key(|a| a.published_at)?;

    let recent_start = now - Duration::hours(recent_hours);
    let recent = in_window.iter().filter(|a| a.published_at >= recent_start).count();

    let attention_ratio = if recent_hours > 0 && baseline_hours > 0 {
        let recent_rate = Decimal::from(recent) / Decimal::from(recent_hours);
        let baseline_rate = Decimal::from(in_window.len()) / Decimal::from(baseline_hours);
        Some((recent_rate / baseline_rate).round_dp(4))
    } else {
        None
    };

    Some(NewsSignal {
        headline: latest.title.clone().unwrap_or_default(),
        published_at: latest.published_at,
        scheduled_at: None,
        attention_ratio,
    })
}
