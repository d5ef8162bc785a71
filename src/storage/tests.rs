//! Unit tests for the JSONL ledger

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing::{make_hedge, make_position};
    use crate::types::{PositionState, ReasonCode, Side, TradeAction};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn genesis(at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry::Genesis {
            initial_capital: dec!(1000),
            at,
        }
    }

    fn opened(position: &Position) -> LedgerEntry {
        let action = TradeAction::Open {
            side: position.side,
            size: position.size,
            price: position.entry_price,
        };
        let mut decision = TradeDecision::new(&position.market_id, action, ReasonCode::Admitted);
        decision.timestamp = position.opened_at;
        LedgerEntry::Decision {
            decision,
            outcome: Outcome::Opened {
                position: position.clone(),
            },
        }
    }

    fn closed(position: &Position, exit: Decimal, at: DateTime<Utc>) -> LedgerEntry {
        let state = if position.pnl_at(exit) > Decimal::ZERO {
            PositionState::ClosedProfit
        } else {
            PositionState::ClosedStop
        };
        let action = TradeAction::Close {
            position_id: position.id,
            exit_price: exit,
            state,
        };
        let mut decision = TradeDecision::new(&position.market_id, action, ReasonCode::StopLoss);
        decision.timestamp = at;
        LedgerEntry::Decision {
            decision,
            outcome: Outcome::Closed {
                closed: ClosedPosition {
                    position: position.clone(),
                    exit_price: exit,
                    closed_at: at,
                    pnl: position.pnl_at(exit),
                    state,
                },
            },
        }
    }

    #[tokio::test]
    async fn test_append_writes_one_line_per_entry() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("nested").join("ledger.jsonl"));
        let now = Utc::now();

        ledger.append(&genesis(now)).await.unwrap();
        ledger
            .append(&LedgerEntry::Decision {
                decision: TradeDecision::skip("m1", ReasonCode::InsufficientEdge),
                outcome: Outcome::Skipped,
            })
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(ledger.path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"kind\":\"genesis\""));
        assert!(lines[1].contains("\"reason\":\"insufficient_edge\""));
        assert!(lines[1].contains("\"status\":\"skipped\""));

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries[0], genesis(now));
    }

    #[tokio::test]
    async fn test_missing_ledger_replays_to_none() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        assert!(ledger.replay().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_or_init_writes_genesis_once() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));

        let state = ledger.open_or_init(dec!(500), Utc::now()).await.unwrap();
        assert_eq!(state.portfolio.balance(), dec!(500));

        // capital argument ignored once the ledger exists
        let state = ledger.open_or_init(dec!(9999), Utc::now()).await.unwrap();
        assert_eq!(state.portfolio.initial_capital(), dec!(500));
        assert_eq!(ledger.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_rebuilds_portfolio() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let mut winner = make_position("m1", Side::Yes, dec!(0.5), dec!(100));
        winner.opened_at = start;
        let mut loser = make_position("m2", Side::No, dec!(0.4), dec!(50));
        loser.opened_at = start;
        let mut hedge = make_hedge(&loser, dec!(12.5));
        hedge.opened_at = start;

        for entry in [
            genesis(start),
            opened(&winner),
            opened(&loser),
            opened(&hedge),
            closed(&winner, dec!(0.75), start + Duration::hours(2)),
            closed(&loser, dec!(0.3), start + Duration::hours(3)),
        ] {
            ledger.append(&entry).await.unwrap();
        }

        let state = ledger.replay().await.unwrap().unwrap();
        let portfolio = &state.portfolio;
        assert_eq!(state.decisions, 5);
        assert_eq!(state.risk_state, RiskState::Active);
        // +50 on the winner, -12.5 on the loser
        assert_eq!(portfolio.realized_pnl(), dec!(37.5));
        assert_eq!(portfolio.balance(), dec!(1037.5));
        assert_eq!(portfolio.peak_balance(), dec!(1050));
        assert_eq!(portfolio.open_count(), 1);
        assert!(portfolio.positions()[0].is_hedge);
        assert_eq!(portfolio.closed_positions().len(), 2);
    }

    #[tokio::test]
    async fn test_replay_restores_halt_and_reset() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        let now = Utc::now();

        ledger.append(&genesis(now)).await.unwrap();
        ledger
            .append(&LedgerEntry::Halted {
                reason: "drawdown 21%".to_string(),
                at: now,
            })
            .await
            .unwrap();

        let state = ledger.replay().await.unwrap().unwrap();
        assert!(matches!(state.risk_state, RiskState::Halted { ref reason, .. } if reason == "drawdown 21%"));

        assert_eq!(state.last_reset, None);

        ledger.append(&LedgerEntry::Reset { at: now }).await.unwrap();
        let state = ledger.replay().await.unwrap().unwrap();
        assert_eq!(state.risk_state, RiskState::Active);
        assert_eq!(state.last_reset, Some(now));
    }

    #[tokio::test]
    async fn test_reset_only_appends_when_halted() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        let now = Utc::now();
        ledger.append(&genesis(now)).await.unwrap();

        assert!(!ledger.reset(now).await.unwrap());
        assert_eq!(ledger.entries().await.unwrap().len(), 1);

        ledger
            .append(&LedgerEntry::Halted {
                reason: "drawdown".to_string(),
                at: now,
            })
            .await
            .unwrap();
        assert!(ledger.reset(now).await.unwrap());
        assert_eq!(ledger.entries().await.unwrap().len(), 3);
        assert!(!ledger.reset(now).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_decision_leaves_capital_untouched() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::new(dir.path().join("ledger.jsonl"));
        ledger.append(&genesis(Utc::now())).await.unwrap();
        ledger
            .append(&LedgerEntry::Decision {
                decision: TradeDecision::new(
                    "m1",
                    TradeAction::Open {
                        side: Side::Yes,
                        size: dec!(100),
                        price: dec!(0.5),
                    },
                    ReasonCode::Admitted,
                ),
                outcome: Outcome::Failed {
                    error: "exchange down".to_string(),
                },
            })
            .await
            .unwrap();

        let state = ledger.replay().await.unwrap().unwrap();
        assert_eq!(state.decisions, 1);
        assert_eq!(state.portfolio.available(), dec!(1000));
    }

    #[tokio::test]
    async fn test_torn_last_line_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = Ledger::new(&path);
        ledger.append(&genesis(Utc::now())).await.unwrap();

        let mut content = tokio::fs::read_to_string(&path).await.unwrap();
        content.push_str("{\"kind\":\"reset\",\"at\":");
        tokio::fs::write(&path, content).await.unwrap();

        assert_eq!(ledger.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_middle_line_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        tokio::fs::write(&path, "not json\n{\"kind\":\"reset\",\"at\":\"2026-03-01T00:00:00Z\"}\n")
            .await
            .unwrap();

        let err = Ledger::new(&path).entries().await.unwrap_err();
        assert!(matches!(err, BotError::Ledger(ref msg) if msg.starts_with("line 1")));
    }

    #[test]
    fn test_replay_requires_genesis_first() {
        let entries = vec![LedgerEntry::Reset { at: Utc::now() }];
        assert!(matches!(replay_entries(&entries), Err(BotError::Ledger(_))));
    }

    #[test]
    fn test_replay_rejects_inconsistent_close() {
        let position = make_position("m1", Side::Yes, dec!(0.5), dec!(100));
        let entries = vec![genesis(Utc::now()), closed(&position, dec!(0.6), Utc::now())];
        assert!(matches!(replay_entries(&entries), Err(BotError::Ledger(_))));
    }
}
