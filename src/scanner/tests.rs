//! Unit tests for filter and scorer

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{FilterConfig, ScoringConfig};
    use crate::testing::make_market;
    use crate::types::{Market, MarketStatus};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn make_filter() -> MarketFilter {
        MarketFilter::new(FilterConfig::default())
    }

    fn make_scorer(top_k: usize) -> QuantitativeScorer {
        QuantitativeScorer::new(ScoringConfig {
            top_k,
            ..Default::default()
        })
    }

    fn with(market: Market, liquidity: Decimal, volume: Decimal) -> Market {
        Market {
            liquidity: Some(liquidity),
            volume: Some(volume),
            ..market
        }
    }

    #[test]
    fn test_filter_accepts_eligible_market() {
        let filter = make_filter();
        let market = make_market("ok", dec!(0.5));
        assert_eq!(filter.check(&market, Utc::now()), Ok(()));
    }

    #[test]
    fn test_filter_rejections() {
        let filter = make_filter();
        let now = Utc::now();

        let low_liq = with(make_market("a", dec!(0.5)), dec!(4999), dec!(50000));
        assert_eq!(filter.check(&low_liq, now), Err(Rejection::LowLiquidity));

        let low_vol = with(make_market("b", dec!(0.5)), dec!(20000), dec!(9999));
        assert_eq!(filter.check(&low_vol, now), Err(Rejection::LowVolume));

        let mut closing = make_market("c", dec!(0.5));
        closing.close_time = Some(now + Duration::hours(47));
        assert_eq!(filter.check(&closing, now), Err(Rejection::ClosingSoon));

        let consensus = make_market("d", dec!(0.90));
        assert_eq!(filter.check(&consensus, now), Err(Rejection::PriceOutOfBand));

        let mut closed = make_market("e", dec!(0.5));
        closed.status = MarketStatus::Closed;
        assert_eq!(filter.check(&closed, now), Err(Rejection::Inactive));
    }

    #[test]
    fn test_filter_band_is_inclusive() {
        let filter = make_filter();
        let now = Utc::now();
        assert!(filter.check(&make_market("lo", dec!(0.15)), now).is_ok());
        assert!(filter.check(&make_market("hi", dec!(0.85)), now).is_ok());
        assert!(filter.check(&make_market("lo2", dec!(0.14)), now).is_err());
    }

    #[test]
    fn test_filter_fails_closed_on_missing_fields() {
        let filter = make_filter();
        let now = Utc::now();

        let mut no_price = make_market("a", dec!(0.5));
        no_price.price = None;
        assert_eq!(filter.check(&no_price, now), Err(Rejection::MissingField("price")));

        let mut no_close = make_market("b", dec!(0.5));
        no_close.close_time = None;
        assert_eq!(filter.check(&no_close, now), Err(Rejection::MissingField("close_time")));

        let mut no_liq = make_market("c", dec!(0.5));
        no_liq.liquidity = None;
        assert!(filter.check(&no_liq, now).is_err());
    }

    #[test]
    fn test_filter_subset_order_and_idempotence() {
        let filter = make_filter();
        let now = Utc::now();
        let markets = vec![
            make_market("a", dec!(0.5)),
            make_market("b", dec!(0.95)),
            make_market("c", dec!(0.3)),
            with(make_market("d", dec!(0.5)), dec!(100), dec!(100)),
            make_market("e", dec!(0.7)),
        ];

        let (once, stats) = filter.apply_with_stats(&markets, now);
        let ids: Vec<&str> = once.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "e"]);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.passed, 3);
        assert_eq!(stats.price_out_of_band, 1);
        assert_eq!(stats.low_liquidity, 1);

        let twice = filter.apply(&once, now);
        let twice_ids: Vec<&str> = twice.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, twice_ids);
    }

    #[test]
    fn test_score_components() {
        let scorer = make_scorer(3);
        let market = with(make_market("a", dec!(0.5)), dec!(25000), dec!(100000));
        let score = scorer.score(&market).unwrap();
        assert_eq!(score.liquidity, dec!(12.5));
        assert_eq!(score.volume, dec!(25));
        assert_eq!(score.uncertainty, dec!(50));
        assert_eq!(score.total, dec!(87.5));
    }

    #[test]
    fn test_score_components_are_capped() {
        let scorer = make_scorer(3);
        let market = with(make_market("a", dec!(0.3)), dec!(900000), dec!(900000));
        let score = scorer.score(&market).unwrap();
        assert_eq!(score.liquidity, dec!(25));
        assert_eq!(score.volume, dec!(25));
        // 1 - 2 * 0.2 = 0.6
        assert_eq!(score.uncertainty, dec!(30));
    }

    #[test]
    fn test_rank_sorted_descending_and_capped() {
        let scorer = make_scorer(2);
        let markets = vec![
            with(make_market("mid", dec!(0.4)), dec!(50000), dec!(100000)),
            with(make_market("best", dec!(0.5)), dec!(50000), dec!(100000)),
            with(make_market("low", dec!(0.2)), dec!(50000), dec!(100000)),
        ];
        let ranked = scorer.rank(markets);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].market.id, "best");
        assert_eq!(ranked[1].market.id, "mid");
        assert!(ranked[0].score.total >= ranked[1].score.total);
    }

    #[test]
    fn test_rank_tie_broken_by_liquidity() {
        let scorer = make_scorer(3);
        // both saturate the liquidity component, so totals tie
        let markets = vec![
            with(make_market("thin", dec!(0.5)), dec!(60000), dec!(100000)),
            with(make_market("deep", dec!(0.5)), dec!(80000), dec!(100000)),
        ];
        let ranked = scorer.rank(markets);
        assert_eq!(ranked[0].score.total, ranked[1].score.total);
        assert_eq!(ranked[0].market.id, "deep");
    }

    #[test]
    fn test_rank_tie_broken_by_close_time() {
        let scorer = make_scorer(3);
        let now = Utc::now();
        let mut late = with(make_market("late", dec!(0.5)), dec!(60000), dec!(100000));
        late.close_time = Some(now + Duration::days(20));
        let mut soon = with(make_market("soon", dec!(0.5)), dec!(60000), dec!(100000));
        soon.close_time = Some(now + Duration::days(5));

        let ranked = scorer.rank(vec![late, soon]);
        assert_eq!(ranked[0].market.id, "soon");
    }

    #[test]
    fn test_rank_drops_below_min_score() {
        let scorer = make_scorer(3);
        // 5 + 2.5 + 20 = 27.5
        let market = with(make_market("weak", dec!(0.2)), dec!(10000), dec!(10000));
        assert!(scorer.rank(vec![market]).is_empty());
    }
}
