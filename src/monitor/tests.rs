//! Unit tests for the performance monitor

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::testing::make_position;
    use rust_decimal_macros::dec;

    fn make_record(pnl: Decimal, state: PositionState) -> TradeRecord {
        TradeRecord {
            closed_at: Utc::now(),
            market_id: "m1".to_string(),
            side: Side::Yes,
            size: dec!(100),
            entry_price: dec!(0.5),
            exit_price: dec!(0.5),
            pnl,
            state,
            is_hedge: false,
        }
    }

    #[tokio::test]
    async fn test_empty_stats() {
        let monitor = Monitor::new(10);
        let stats = monitor.get_stats().await;
        assert_eq!(stats, PerformanceStats::default());
        assert!(stats.sharpe_ratio.is_none());
    }

    #[tokio::test]
    async fn test_stats_aggregate() {
        let monitor = Monitor::new(10);
        monitor.record_trade(make_record(dec!(50), PositionState::ClosedProfit)).await;
        monitor.record_trade(make_record(dec!(-20), PositionState::ClosedStop)).await;
        monitor.record_trade(make_record(dec!(-10), PositionState::ClosedTimeout)).await;
        monitor.record_trade(make_record(dec!(20), PositionState::ClosedProfit)).await;

        let stats = monitor.get_stats().await;
        assert_eq!(stats.total_trades, 4);
        assert_eq!(stats.winning_trades, 2);
        assert_eq!(stats.losing_trades, 2);
        assert_eq!(stats.stopped_out, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.win_rate, dec!(0.5));
        assert_eq!(stats.total_pnl, dec!(40));
        assert_eq!(stats.avg_pnl_per_trade, dec!(10));
        assert_eq!(stats.best_trade, Some(dec!(50)));
        assert_eq!(stats.worst_trade, Some(dec!(-20)));
        assert!(stats.sharpe_ratio.unwrap() > Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let monitor = Monitor::new(2);
        for pnl in [dec!(1), dec!(2), dec!(3)] {
            monitor.record_trade(make_record(pnl, PositionState::ClosedProfit)).await;
        }
        let stats = monitor.get_stats().await;
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.total_pnl, dec!(5));
    }

    #[tokio::test]
    async fn test_load_history_from_closed_positions() {
        let position = make_position("m1", Side::No, dec!(0.4), dec!(80));
        let closed = ClosedPosition {
            pnl: position.pnl_at(dec!(0.5)),
            position,
            exit_price: dec!(0.5),
            closed_at: Utc::now(),
            state: PositionState::ClosedProfit,
        };

        let monitor = Monitor::new(10);
        monitor.load_history(&[closed]).await;
        let stats = monitor.get_stats().await;
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_pnl, dec!(20));
        // a single trade has no dispersion
        assert!(stats.sharpe_ratio.is_none());
    }

    #[test]
    fn test_identical_returns_have_no_sharpe() {
        let trades = vec![
            make_record(dec!(10), PositionState::ClosedProfit),
            make_record(dec!(10), PositionState::ClosedProfit),
        ];
        assert!(sharpe(trades.iter()).is_none());
    }
}
