//! Confirmation gate: closed-form reasoning queries for strong patterns

use super::{Answer, ExpectedShape, Reasoner};
use crate::analysis::{NewsSignal, PatternScore};
use crate::config::ConfirmationConfig;
use crate::error::Result;
use crate::types::{Market, PatternKind, Side};
use crate::utils::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// No query was needed (arbitrage, or not enough escalation)
    NotRequired,
    Confirmed,
    /// The probability query produced no usable answer
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// Whether the news reads as good for `side`
    pub fn favours(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Sentiment::Positive, Side::Yes) | (Sentiment::Negative, Side::No)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub status: ConfirmationStatus,
    /// Confirmed probability of YES, in [0, 1]
    pub probability: Option<Decimal>,
    pub sentiment: Option<Sentiment>,
    /// Whether the outcome has reportedly already happened
    pub already_resolved: Option<bool>,
    pub queries: usize,
}

impl Confirmation {
    pub fn not_required() -> Self {
        Self {
            status: ConfirmationStatus::NotRequired,
            probability: None,
            sentiment: None,
            already_resolved: None,
            queries: 0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.already_resolved == Some(true)
    }
}

pub struct ConfirmationGate {
    reasoner: Arc<dyn Reasoner>,
    config: ConfirmationConfig,
    threshold: Decimal,
    retry: RetryPolicy,
}

impl ConfirmationGate {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        config: ConfirmationConfig,
        threshold: Decimal,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            reasoner,
            config,
            threshold,
            retry,
        }
    }

    /// Whether this pattern score warrants reasoning queries at all
    pub fn requires_confirmation(&self, score: &PatternScore) -> bool {
        score.dominant != Some(PatternKind::Arbitrage) && score.escalation_score() >= self.threshold
    }

    /// Issue up to three queries for `market`.
    ///
    /// Transient failures are retried; if retries run out the error is
    /// returned and the caller abandons the cycle. Other failures degrade
    /// the affected answer to unconfirmed.
    pub async fn confirm(
        &self,
        market: &Market,
        score: &PatternScore,
        news: Option<&NewsSignal>,
        now: DateTime<Utc>,
    ) -> Result<Confirmation> {
        if !self.requires_confirmation(score) {
            return Ok(Confirmation::not_required());
        }

        let mut confirmation = Confirmation::not_required();

        let prompt = format!(
            "Probability (0-100) that: {}? Reply with only a number.",
            market.question
        );
        confirmation.queries += 1;
        confirmation.probability = match self.ask(&prompt, &ExpectedShape::percentage()).await? {
            Answer::Numeric(pct) => Some(pct / Decimal::ONE_HUNDRED),
            _ => None,
        };

        if let Some(news) = news {
            let prompt = format!(
                "News: {}. Is this POSITIVE or NEGATIVE for \"{}\"? Reply with one word.",
                news.headline, market.question
            );
            confirmation.queries += 1;
            let shape = ExpectedShape::labels(&["POSITIVE", "NEGATIVE"]);
            confirmation.sentiment = match self.ask(&prompt, &shape).await? {
                Answer::Label(l) if l == "POSITIVE" => Some(Sentiment::Positive),
                Answer::Label(l) if l == "NEGATIVE" => Some(Sentiment::Negative),
                _ => None,
            };
        }

        let window = Duration::days(self.config.resolution_window_days);
        let closes_soon = market.time_to_close(now).map_or(false, |t| t <= window);
        if closes_soon {
            let prompt = format!(
                "Has this already happened: {}? Reply YES or NO.",
                market.question
            );
            confirmation.queries += 1;
            confirmation.already_resolved = match self.ask(&prompt, &ExpectedShape::Boolean).await? {
                Answer::Boolean(b) => Some(b),
                _ => None,
            };
        }

        confirmation.status = if confirmation.probability.is_some() {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Unconfirmed
        };
        debug!(
            "Confirmation for {}: {:?} p={:?} sentiment={:?} resolved={:?}",
            market.id,
            confirmation.status,
            confirmation.probability,
            confirmation.sentiment,
            confirmation.already_resolved
        );
        Ok(confirmation)
    }

    async fn ask(&self, prompt: &str, shape: &ExpectedShape) -> Result<Answer> {
        let result = self
            .retry
            .run("reasoning query", || self.reasoner.ask(prompt, shape))
            .await;

        match result {
            Ok(answer) if shape.accepts(&answer) => Ok(answer),
            Ok(answer) => {
                if answer != Answer::Unconfirmed {
                    warn!("Discarding out-of-shape answer {:?}", answer);
                }
                Ok(Answer::Unconfirmed)
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                warn!("Reasoning query failed: {}", e);
                Ok(Answer::Unconfirmed)
            }
        }
    }
}
