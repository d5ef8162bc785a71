//! Probability modelling
//!
//! The reasoning collaborator is only ever asked closed-form questions. Every
//! reply is validated against the shape the question expects, and anything
//! that does not fit becomes [`Answer::Unconfirmed`] instead of a guess.

mod confirmation;
mod estimator;
mod llm;

pub use confirmation::{Confirmation, ConfirmationGate, ConfirmationStatus, Sentiment};
pub use estimator::{ProbabilityEdgeEstimator, ProbabilityEstimate};
pub use llm::LlmReasoner;

use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Form a reply must take to be accepted
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedShape {
    /// Inclusive numeric range
    NumericRange { min: Decimal, max: Decimal },
    /// One of a closed set of labels, matched case-insensitively
    EnumLabel(Vec<String>),
    /// YES / NO
    Boolean,
}

/// Validated reply
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Numeric(Decimal),
    Label(String),
    Boolean(bool),
    Unconfirmed,
}

impl ExpectedShape {
    pub fn percentage() -> Self {
        ExpectedShape::NumericRange {
            min: Decimal::ZERO,
            max: Decimal::ONE_HUNDRED,
        }
    }

    pub fn labels(labels: &[&str]) -> Self {
        ExpectedShape::EnumLabel(labels.iter().map(|l| l.to_uppercase()).collect())
    }

    /// Validate raw reply text. Models like to wrap answers in punctuation,
    /// code fences or a trailing `%`, so those are stripped first.
    pub fn parse(&self, raw: &str) -> Answer {
        let cleaned = raw
            .trim()
            .trim_matches('`')
            .trim()
            .trim_end_matches(['.', '%', '!'])
            .trim();

        match self {
            ExpectedShape::NumericRange { min, max } => match Decimal::from_str(cleaned) {
                Ok(value) if value >= *min && value <= *max => Answer::Numeric(value),
                _ => Answer::Unconfirmed,
            },
            ExpectedShape::EnumLabel(labels) => {
                let upper = cleaned.to_uppercase();
                labels
                    .iter()
                    .find(|l| **l == upper)
                    .map(|l| Answer::Label(l.clone()))
                    .unwrap_or(Answer::Unconfirmed)
            }
            ExpectedShape::Boolean => match cleaned.to_uppercase().as_str() {
                "YES" | "TRUE" => Answer::Boolean(true),
                "NO" | "FALSE" => Answer::Boolean(false),
                _ => Answer::Unconfirmed,
            },
        }
    }

    /// Re-check an answer produced elsewhere
    pub fn accepts(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (ExpectedShape::NumericRange { min, max }, Answer::Numeric(v)) => v >= min && v <= max,
            (ExpectedShape::EnumLabel(labels), Answer::Label(l)) => labels.contains(l),
            (ExpectedShape::Boolean, Answer::Boolean(_)) => true,
            _ => false,
        }
    }
}

/// External reasoning collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Ask a closed-form question. Transport failures are errors; replies
    /// that do not fit `shape` are `Ok(Answer::Unconfirmed)`.
    async fn ask(&self, prompt: &str, shape: &ExpectedShape) -> Result<Answer>;
}

/// Stand-in when no model is configured. Every question goes unconfirmed,
/// so only arbitrage-led candidates can clear the confidence bar.
pub struct NoReasoner;

#[async_trait]
impl Reasoner for NoReasoner {
    async fn ask(&self, _prompt: &str, _shape: &ExpectedShape) -> Result<Answer> {
        Ok(Answer::Unconfirmed)
    }
}
