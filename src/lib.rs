//! Prediction Market Autopilot
//!
//! Scans binary prediction markets, looks for repeatable price patterns,
//! asks an external reasoner to confirm the strong ones, and trades the
//! survivors under fractional Kelly sizing and portfolio risk limits.
//!
//! ## Architecture
//!
//! ```text
//! Exchange snapshot → MarketFilter → QuantitativeScorer → PatternEngine
//!                                                             ↓
//!        Ledger ← Portfolio ← RiskManager ← PositionSizer ← ConfirmationGate
//!                                  ↓                           + Estimator
//!                           HedgingManager
//! ```

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod portfolio;
pub mod risk;
pub mod scanner;
pub mod storage;
pub mod strategy;
pub mod types;
pub mod utils;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod config_tests;
