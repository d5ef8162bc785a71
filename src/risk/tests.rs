//! Unit tests for risk management

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing::{day, make_hedge, make_market, make_position};
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn make_manager() -> RiskManager {
        RiskManager::new(RiskConfig::default())
    }

    fn make_portfolio() -> Portfolio {
        Portfolio::new(dec!(1000), day(2026, 3, 1))
    }

    fn make_proposal(market_id: &str, size: Decimal) -> Proposal {
        Proposal {
            market_id: market_id.to_string(),
            question: "Test?".to_string(),
            side: Side::Yes,
            price: dec!(0.5),
            size,
            confidence: dec!(0.7),
            hedges: None,
        }
    }

    /// Realize a loss of `loss` on a throwaway position
    fn lose(portfolio: &mut Portfolio, loss: Decimal) {
        lose_at(portfolio, loss, Utc::now());
    }

    fn lose_at(portfolio: &mut Portfolio, loss: Decimal, at: DateTime<Utc>) {
        let position = make_position("loser", Side::Yes, dec!(0.5), loss);
        let id = position.id;
        portfolio.open_position(position).unwrap();
        portfolio
            .close_position(id, dec!(0), PositionState::ClosedLoss, at)
            .unwrap();
    }

    #[test]
    fn test_admits_clean_proposal() {
        let mut risk = make_manager();
        let portfolio = make_portfolio();
        assert_eq!(risk.evaluate(&make_proposal("m1", dec!(150)), &portfolio, Utc::now()), Ok(()));
    }

    #[test]
    fn test_duplicate_market_rejected() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();

        let first = make_proposal("m1", dec!(100));
        assert_eq!(risk.evaluate(&first, &portfolio, now), Ok(()));
        risk.open(&mut portfolio, risk.build_position(&first, now)).unwrap();

        let second = make_proposal("m1", dec!(100));
        assert_eq!(risk.evaluate(&second, &portfolio, now), Err(ReasonCode::Duplicate));
        assert_eq!(portfolio.open_count(), 1);
    }

    #[test]
    fn test_hedge_exempt_from_duplicate_but_counts_toward_cap() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();

        let main = make_position("m1", Side::Yes, dec!(0.5), dec!(100));
        let main_id = main.id;
        portfolio.open_position(main).unwrap();

        let hedge = Proposal {
            side: Side::No,
            hedges: Some(main_id),
            ..make_proposal("m1", dec!(25))
        };
        assert_eq!(risk.evaluate(&hedge, &portfolio, now), Ok(()));
        risk.open(&mut portfolio, risk.build_position(&hedge, now)).unwrap();
        assert!(portfolio.position(main_id).unwrap().hedge_id.is_some());

        portfolio
            .open_position(make_position("m2", Side::Yes, dec!(0.5), dec!(100)))
            .unwrap();
        // 3 open including the hedge
        assert_eq!(
            risk.evaluate(&make_proposal("m3", dec!(50)), &portfolio, now),
            Err(ReasonCode::ConcurrentLimit)
        );
    }

    #[test]
    fn test_capital_limit() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        portfolio
            .open_position(make_position("m0", Side::Yes, dec!(0.5), dec!(900)))
            .unwrap();
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(101)), &portfolio, Utc::now()),
            Err(ReasonCode::InsufficientCapital)
        );
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(100)), &portfolio, Utc::now()),
            Ok(())
        );
    }

    #[test]
    fn test_daily_loss_limit() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        lose(&mut portfolio, dec!(80));

        // -80 - 0.2 * 100 = -100, exactly the limit
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(100)), &portfolio, Utc::now()),
            Ok(())
        );
        // -80 - 0.2 * 105 = -101
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(105)), &portfolio, Utc::now()),
            Err(ReasonCode::DailyLossLimit)
        );

        // next UTC day starts fresh
        portfolio.roll_day(day(2026, 3, 2));
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(105)), &portfolio, Utc::now()),
            Ok(())
        );
    }

    #[test]
    fn test_kill_switch_halts_and_rejects_everything() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();
        lose(&mut portfolio, dec!(200));
        assert_eq!(portfolio.drawdown(), dec!(0.2));

        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(10)), &portfolio, now),
            Err(ReasonCode::KillSwitch)
        );
        assert!(risk.is_halted());

        // any later admission is rejected until reset
        assert_eq!(
            risk.evaluate(&make_proposal("m2", dec!(1)), &portfolio, now),
            Err(ReasonCode::Halted)
        );

        assert!(risk.reset(now));
        assert!(!risk.is_halted());
        assert!(!risk.reset(now));
    }

    #[test]
    fn test_reset_rebases_kill_switch() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        let start = Utc::now();
        lose_at(&mut portfolio, dec!(200), start);
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(10)), &portfolio, start),
            Err(ReasonCode::KillSwitch)
        );

        let reset_at = start + Duration::minutes(1);
        assert!(risk.reset(reset_at));
        assert_eq!(risk.drawdown(&portfolio), dec!(0));
        // the peak watermark still remembers 1000
        assert_eq!(portfolio.drawdown(), dec!(0.2));

        portfolio.roll_day(day(2026, 3, 2));
        assert_eq!(
            risk.evaluate(&make_proposal("m1", dec!(10)), &portfolio, reset_at),
            Ok(())
        );
        assert!(!risk.is_halted());

        // 150 / 800 stays under the limit, 160 / 800 reaches it
        let later = reset_at + Duration::minutes(1);
        lose_at(&mut portfolio, dec!(150), later);
        assert!(!risk.check_kill_switch(&portfolio, later));
        lose_at(&mut portfolio, dec!(10), later);
        assert_eq!(risk.drawdown(&portfolio), dec!(0.2));
        assert!(risk.check_kill_switch(&portfolio, later));
    }

    #[test]
    fn test_restored_reset_is_honoured() {
        let mut portfolio = make_portfolio();
        let start = Utc::now();
        lose_at(&mut portfolio, dec!(250), start);

        let mut fresh = RiskManager::with_state(RiskConfig::default(), RiskState::Active, None);
        assert!(fresh.check_kill_switch(&portfolio, start));

        let reset_at = start + Duration::minutes(1);
        let mut restored =
            RiskManager::with_state(RiskConfig::default(), RiskState::Active, Some(reset_at));
        assert!(!restored.check_kill_switch(&portfolio, reset_at));
    }

    #[test]
    fn test_kill_switch_transition_reported_once() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        lose(&mut portfolio, dec!(250));
        assert!(risk.check_kill_switch(&portfolio, Utc::now()));
        assert!(!risk.check_kill_switch(&portfolio, Utc::now()));
        match risk.state() {
            RiskState::Halted { reason, .. } => assert!(reason.contains("drawdown")),
            RiskState::Active => panic!("expected halt"),
        }
    }

    #[test]
    fn test_below_kill_switch_stays_active() {
        let mut risk = make_manager();
        let mut portfolio = make_portfolio();
        lose(&mut portfolio, dec!(199));
        assert!(!risk.check_kill_switch(&portfolio, Utc::now()));
    }

    #[test]
    fn test_build_position_exit_levels() {
        let risk = make_manager();
        let proposal = Proposal {
            price: dec!(0.40),
            ..make_proposal("m1", dec!(50))
        };
        let position = risk.build_position(&proposal, Utc::now());
        assert_eq!(position.stop_loss, dec!(0.32));
        assert_eq!(position.take_profit, dec!(0.80));
        assert!(!position.is_hedge);

        let high = Proposal {
            price: dec!(0.70),
            ..make_proposal("m1", dec!(50))
        };
        assert_eq!(risk.build_position(&high, Utc::now()).take_profit, dec!(0.99));
    }

    #[test]
    fn test_review_stop_loss_and_take_profit() {
        let risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();
        let stop = risk.build_position(&make_proposal("stop", dec!(50)), now);
        let take = risk.build_position(&make_proposal("take", dec!(50)), now);
        let hold = risk.build_position(&make_proposal("hold", dec!(50)), now);
        let (stop_id, take_id) = (stop.id, take.id);
        for p in [stop, take, hold] {
            risk.open(&mut portfolio, p).unwrap();
        }

        let markets = vec![
            make_market("stop", dec!(0.40)),
            make_market("take", dec!(0.99)),
            make_market("hold", dec!(0.55)),
        ];
        let exits = risk.review_positions(&portfolio, &markets, now);
        assert_eq!(exits.len(), 2);

        let stop_exit = exits.iter().find(|e| e.position_id == stop_id).unwrap();
        assert_eq!(stop_exit.state, PositionState::ClosedStop);
        assert_eq!(stop_exit.reason, ReasonCode::StopLoss);
        assert_eq!(stop_exit.exit_price, dec!(0.40));

        let take_exit = exits.iter().find(|e| e.position_id == take_id).unwrap();
        assert_eq!(take_exit.state, PositionState::ClosedProfit);
        assert_eq!(take_exit.reason, ReasonCode::TakeProfit);

        for exit in &exits {
            risk.close(&mut portfolio, exit, now).unwrap();
        }
        assert_eq!(portfolio.open_count(), 1);
        // -10 + 49
        assert_eq!(portfolio.realized_pnl(), dec!(39));
    }

    #[test]
    fn test_review_no_side_uses_opposite_price() {
        let risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();
        let proposal = Proposal {
            side: Side::No,
            ..make_proposal("m1", dec!(50))
        };
        risk.open(&mut portfolio, risk.build_position(&proposal, now)).unwrap();

        // YES rallies to 0.65, NO falls to 0.35 < stop 0.40
        let exits = risk.review_positions(&portfolio, &[make_market("m1", dec!(0.65))], now);
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].exit_price, dec!(0.35));
        assert_eq!(exits[0].state, PositionState::ClosedStop);
    }

    #[test]
    fn test_review_timeout() {
        let risk = make_manager();
        let mut portfolio = make_portfolio();
        let opened = Utc::now() - Duration::hours(169);
        risk.open(&mut portfolio, risk.build_position(&make_proposal("m1", dec!(50)), opened))
            .unwrap();

        let exits = risk.review_positions(&portfolio, &[make_market("m1", dec!(0.52))], Utc::now());
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].state, PositionState::ClosedTimeout);
        assert_eq!(exits[0].exit_price, dec!(0.52));
    }

    #[test]
    fn test_review_settlement() {
        let risk = make_manager();
        let mut portfolio = make_portfolio();
        let now = Utc::now();
        let main = make_position("m1", Side::Yes, dec!(0.5), dec!(100));
        let hedge = make_hedge(&main, dec!(25));
        portfolio.open_position(main).unwrap();
        portfolio.open_position(hedge).unwrap();

        let mut settled = make_market("m1", dec!(1));
        settled.status = MarketStatus::Settled;
        let exits = risk.review_positions(&portfolio, &[settled], now);
        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|e| e.reason == ReasonCode::Settled));
        assert!(exits
            .iter()
            .any(|e| e.state == PositionState::ClosedProfit && e.exit_price == dec!(1)));
        assert!(exits
            .iter()
            .any(|e| e.state == PositionState::ClosedLoss && e.exit_price == dec!(0)));

        for exit in &exits {
            risk.close(&mut portfolio, exit, now).unwrap();
        }
        // +100 on the main, -25 on the hedge
        assert_eq!(portfolio.realized_pnl(), dec!(75));
    }

    #[test]
    fn test_state_serialization() {
        let halted = RiskState::Halted {
            reason: "drawdown".to_string(),
            since: Utc::now(),
        };
        let json = serde_json::to_string(&halted).unwrap();
        assert!(json.contains("\"state\":\"halted\""));
        let back: RiskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, halted);
    }
}
