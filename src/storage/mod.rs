//! Append-only JSONL ledger
//!
//! One JSON object per line. The first record is a genesis record carrying
//! the starting capital; after it come trade decisions with their outcome
//! and kill-switch halt/reset records. Replaying the file rebuilds the
//! portfolio and the risk manager's halted state.

#[cfg(test)]
mod tests;

use crate::error::{BotError, Result};
use crate::portfolio::Portfolio;
use crate::risk::RiskState;
use crate::types::{ClosedPosition, Position, TradeDecision};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// What happened to a decision once it reached the portfolio boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Opened { position: Position },
    Closed { closed: ClosedPosition },
    Skipped,
    /// Order placement failed, nothing was recorded
    Failed { error: String },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Opened { .. } => "opened",
            Outcome::Closed { .. } => "closed",
            Outcome::Skipped => "skipped",
            Outcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Genesis {
        initial_capital: Decimal,
        at: DateTime<Utc>,
    },
    Decision {
        decision: TradeDecision,
        outcome: Outcome,
    },
    Halted {
        reason: String,
        at: DateTime<Utc>,
    },
    Reset {
        at: DateTime<Utc>,
    },
}

/// State rebuilt from the ledger
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub portfolio: Portfolio,
    pub risk_state: RiskState,
    /// When the last halt was cleared
    pub last_reset: Option<DateTime<Utc>>,
    pub decisions: usize,
}

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and its directory if needed
    pub async fn append(&self, entry: &LedgerEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let line = serde_json::to_string(entry)?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;

        debug!("Ledger append: {}", entry.label());
        Ok(())
    }

    /// All records in file order. A missing file reads as empty.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = content.lines().collect();
        let mut entries = Vec::with_capacity(lines.len());
        for (idx, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) => entries.push(entry),
                // torn write from an interrupted append
                Err(e) if idx + 1 == lines.len() && !content.ends_with('\n') => {
                    warn!("Ignoring incomplete last ledger line: {}", e);
                }
                Err(e) => {
                    return Err(BotError::Ledger(format!("line {}: {}", idx + 1, e)));
                }
            }
        }
        Ok(entries)
    }

    /// Rebuild state, or `None` when the ledger has no records yet
    pub async fn replay(&self) -> Result<Option<LedgerState>> {
        let entries = self.entries().await?;
        if entries.is_empty() {
            return Ok(None);
        }
        replay_entries(&entries).map(Some)
    }

    /// Replay the ledger, writing a genesis record first if it is empty
    pub async fn open_or_init(
        &self,
        initial_capital: Decimal,
        now: DateTime<Utc>,
    ) -> Result<LedgerState> {
        if let Some(state) = self.replay().await? {
            return Ok(state);
        }
        self.append(&LedgerEntry::Genesis {
            initial_capital,
            at: now,
        })
        .await?;
        Ok(LedgerState {
            portfolio: Portfolio::new(initial_capital, now.date_naive()),
            risk_state: RiskState::Active,
            last_reset: None,
            decisions: 0,
        })
    }

    /// Append a reset record if the replayed state is halted. Returns
    /// whether a halt was cleared.
    pub async fn reset(&self, now: DateTime<Utc>) -> Result<bool> {
        let halted = matches!(
            self.replay().await?,
            Some(LedgerState {
                risk_state: RiskState::Halted { .. },
                ..
            })
        );
        if halted {
            self.append(&LedgerEntry::Reset { at: now }).await?;
        }
        Ok(halted)
    }
}

impl LedgerEntry {
    fn label(&self) -> String {
        match self {
            LedgerEntry::Genesis { initial_capital, .. } => format!("genesis {}", initial_capital),
            LedgerEntry::Decision { decision, outcome } => format!(
                "{} {} {}",
                decision.market_id,
                decision.reason,
                outcome.as_str()
            ),
            LedgerEntry::Halted { reason, .. } => format!("halted ({})", reason),
            LedgerEntry::Reset { .. } => "reset".to_string(),
        }
    }
}

/// Apply records in order through the portfolio's validated mutators
pub fn replay_entries(entries: &[LedgerEntry]) -> Result<LedgerState> {
    let mut iter = entries.iter().enumerate();
    let mut portfolio = match iter.next() {
        Some((_, LedgerEntry::Genesis { initial_capital, at })) => {
            Portfolio::new(*initial_capital, at.date_naive())
        }
        _ => return Err(BotError::Ledger("first record is not genesis".to_string())),
    };
    let mut risk_state = RiskState::Active;
    let mut last_reset = None;
    let mut decisions = 0;

    for (idx, entry) in iter {
        let at_record = |e: BotError| BotError::Ledger(format!("record {}: {}", idx + 1, e));
        match entry {
            LedgerEntry::Genesis { .. } => {
                return Err(BotError::Ledger(format!("record {}: second genesis", idx + 1)));
            }
            LedgerEntry::Decision { decision, outcome } => {
                decisions += 1;
                match outcome {
                    Outcome::Opened { position } => {
                        portfolio.roll_day(decision.timestamp.date_naive());
                        portfolio.open_position(position.clone()).map_err(at_record)?;
                    }
                    Outcome::Closed { closed } => {
                        portfolio.roll_day(closed.closed_at.date_naive());
                        portfolio
                            .close_position(
                                closed.position.id,
                                closed.exit_price,
                                closed.state,
                                closed.closed_at,
                            )
                            .map_err(at_record)?;
                    }
                    Outcome::Skipped | Outcome::Failed { .. } => {}
                }
            }
            LedgerEntry::Halted { reason, at } => {
                risk_state = RiskState::Halted {
                    reason: reason.clone(),
                    since: *at,
                };
            }
            LedgerEntry::Reset { at } => {
                risk_state = RiskState::Active;
                last_reset = Some(*at);
            }
        }
    }

    Ok(LedgerState {
        portfolio,
        risk_state,
        last_reset,
        decisions,
    })
}
