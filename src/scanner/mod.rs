//! Market scanning: hard eligibility filter and quantitative ranking
//!
//! The first two stages of every cycle. Both are pure functions of the
//! snapshot and their config, so the same listings always produce the same
//! shortlist.

mod filter;
mod scorer;
#[cfg(test)]
mod tests;

pub use filter::{FilterStats, MarketFilter, Rejection};
pub use scorer::{QuantitativeScorer, ScoreBreakdown, ScoredMarket};
