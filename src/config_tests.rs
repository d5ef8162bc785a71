//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_filter_config_default() {
        let config = FilterConfig::default();
        assert_eq!(config.min_liquidity, dec!(5000));
        assert_eq!(config.min_volume, dec!(10000));
        assert_eq!(config.min_days_to_close, 2);
        assert_eq!(config.min_price, dec!(0.15));
        assert_eq!(config.max_price, dec!(0.85));
    }

    #[test]
    fn test_strategy_config_default() {
        let config = StrategyConfig::default();
        assert_eq!(config.min_edge, dec!(0.10));
        assert_eq!(config.min_confidence, dec!(0.60));
        assert_eq!(config.kelly_multiplier, dec!(0.75));
        assert_eq!(config.max_position_pct, dec!(0.15));
    }

    #[test]
    fn test_risk_config_default() {
        let config = RiskConfig::default();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.stop_loss_pct, dec!(0.20));
        assert_eq!(config.take_profit_pct, dec!(1.0));
        assert_eq!(config.max_hold_hours, 168);
        assert_eq!(config.max_daily_loss_pct, dec!(0.10));
        assert_eq!(config.kill_switch_drawdown, dec!(0.20));
    }

    #[test]
    fn test_hedge_config_default() {
        let config = HedgeConfig::default();
        assert!(config.enabled);
        assert_eq!(config.confidence_threshold, dec!(0.60));
        assert_eq!(config.hedge_ratio, dec!(0.25));
        assert_eq!(config.max_hedge, dec!(50));
        assert_eq!(config.min_position, dec!(10));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scoring.top_k, 3);
        assert_eq!(config.patterns.confirmation_threshold, dec!(40));
        assert_eq!(config.runtime.cycle_interval_secs, 1800);
        assert!(config.llm.is_none());
        assert!(config.news.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_override() {
        let toml_str = r#"
[risk]
max_concurrent = 5
stop_loss_pct = 0.25

[scoring]
top_k = 10
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.risk.max_concurrent, 5);
        assert_eq!(config.risk.stop_loss_pct, dec!(0.25));
        // untouched fields keep defaults
        assert_eq!(config.risk.max_hold_hours, 168);
        assert_eq!(config.scoring.top_k, 10);
        assert_eq!(config.scoring.min_score, dec!(50));
    }

    #[test]
    fn test_llm_config_defaults() {
        let toml_str = r#"
api_key = "sk-test"
"#;
        let config: LlmConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.max_tokens, 10);
    }

    #[test]
    fn test_news_config_defaults() {
        let config: NewsConfig = toml::from_str("api_key = \"abc\"").unwrap();
        assert_eq!(config.max_keywords, 5);
        assert_eq!(config.baseline_hours, 24);
        assert_eq!(config.recent_hours, 2);
    }

    #[test]
    fn test_validate_rejects_inverted_price_band() {
        let mut config = Config::default();
        config.filter.min_price = dec!(0.9);
        config.filter.max_price = dec!(0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_fraction() {
        let mut config = Config::default();
        config.strategy.kelly_multiplier = dec!(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = Config::default();
        config.scoring.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autopilot.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[runtime]\ninitial_capital = 250\nledger_path = \"/tmp/ledger.jsonl\"").unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.runtime.initial_capital, dec!(250));
        assert_eq!(config.runtime.ledger_path, "/tmp/ledger.jsonl");
        assert_eq!(config.hedge.max_hedge, dec!(50));
    }
}
