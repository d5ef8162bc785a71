//! Configuration loading
//!
//! Settings come from an optional TOML file layered with `AUTOPILOT__*`
//! environment variables (double underscore separates sections, e.g.
//! `AUTOPILOT__RISK__MAX_CONCURRENT=5`). A `.env` file is honoured.

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gamma: GammaConfig,
    pub llm: Option<LlmConfig>,
    pub news: Option<NewsConfig>,
    pub filter: FilterConfig,
    pub scoring: ScoringConfig,
    pub patterns: PatternConfig,
    pub confirmation: ConfirmationConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub hedge: HedgeConfig,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load from `path` (missing file is fine) plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = shellexpand::tilde(path).into_owned();
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("AUTOPILOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.runtime.ledger_path = shellexpand::tilde(&config.runtime.ledger_path).into_owned();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the pipeline meaningless
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: Decimal| -> Result<()> {
            if v < Decimal::ZERO || v > Decimal::ONE {
                return Err(BotError::Validation(format!("{name} must be in [0, 1], got {v}")));
            }
            Ok(())
        };

        unit("filter.min_price", self.filter.min_price)?;
        unit("filter.max_price", self.filter.max_price)?;
        if self.filter.min_price > self.filter.max_price {
            return Err(BotError::Validation(
                "filter.min_price exceeds filter.max_price".to_string(),
            ));
        }
        unit("strategy.min_edge", self.strategy.min_edge)?;
        unit("strategy.min_confidence", self.strategy.min_confidence)?;
        unit("strategy.kelly_multiplier", self.strategy.kelly_multiplier)?;
        unit("strategy.max_position_pct", self.strategy.max_position_pct)?;
        unit("risk.stop_loss_pct", self.risk.stop_loss_pct)?;
        unit("risk.max_daily_loss_pct", self.risk.max_daily_loss_pct)?;
        unit("risk.kill_switch_drawdown", self.risk.kill_switch_drawdown)?;
        unit("hedge.confidence_threshold", self.hedge.confidence_threshold)?;
        unit("hedge.hedge_ratio", self.hedge.hedge_ratio)?;

        if self.scoring.top_k == 0 {
            return Err(BotError::Validation("scoring.top_k must be positive".to_string()));
        }
        if self.runtime.initial_capital <= Decimal::ZERO {
            return Err(BotError::Validation(
                "runtime.initial_capital must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Market listing source
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GammaConfig {
    pub base_url: String,
    /// Maximum listings fetched per cycle
    pub limit: usize,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gamma-api.polymarket.com".to_string(),
            limit: 200,
        }
    }
}

/// OpenAI-compatible chat completion endpoint used for confirmation queries
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_llm_max_tokens() -> u32 {
    10
}

/// News search API used for event-driven signals
#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    pub api_key: String,
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    #[serde(default = "default_news_keywords")]
    pub max_keywords: usize,
    /// Look-back for the attention baseline
    #[serde(default = "default_news_baseline_hours")]
    pub baseline_hours: i64,
    /// Window whose article rate is compared against the baseline
    #[serde(default = "default_news_recent_hours")]
    pub recent_hours: i64,
}

fn default_news_base_url() -> String {
    "https://newsapi.org/v2".to_string()
}

const fn default_news_keywords() -> usize {
    5
}

const fn default_news_baseline_hours() -> i64 {
    24
}

const fn default_news_recent_hours() -> i64 {
    2
}

/// Hard eligibility thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_liquidity: Decimal,
    pub min_volume: Decimal,
    pub min_days_to_close: i64,
    pub min_price: Decimal,
    pub max_price: Decimal,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_liquidity: Decimal::from(5000),
            min_volume: Decimal::from(10000),
            min_days_to_close: 2,
            min_price: Decimal::new(15, 2),
            max_price: Decimal::new(85, 2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Liquidity at which the liquidity component saturates
    pub liquidity_target: Decimal,
    /// Volume at which the volume component saturates
    pub volume_target: Decimal,
    pub min_score: Decimal,
    /// Hard cap on markets analysed per cycle
    pub top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            liquidity_target: Decimal::from(50000),
            volume_target: Decimal::from(100000),
            min_score: Decimal::from(50),
            top_k: 3,
        }
    }
}

/// Detector thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Pattern total required before any reasoning query is made
    pub confirmation_threshold: Decimal,
    pub history_len: usize,

    pub mispricing_max_liquidity: Decimal,
    pub extreme_low: Decimal,
    pub extreme_high: Decimal,
    pub volume_spike_ratio: Decimal,
    pub stable_price_move: Decimal,
    pub event_deviation: Decimal,

    pub momentum_min_points: usize,

    pub reversal_high: Decimal,
    pub reversal_low: Decimal,
    pub reversal_min_move: Decimal,
    pub reversal_window: usize,
    pub reversal_max_liquidity: Decimal,

    pub arbitrage_min_gap: Decimal,

    pub news_window_hours: Decimal,
    pub event_min_hours: Decimal,
    pub event_max_hours: Decimal,
    pub attention_spike_ratio: Decimal,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            confirmation_threshold: Decimal::from(40),
            history_len: 48,
            mispricing_max_liquidity: Decimal::from(10000),
            extreme_low: Decimal::new(20, 2),
            extreme_high: Decimal::new(80, 2),
            volume_spike_ratio: Decimal::new(15, 1),
            stable_price_move: Decimal::new(2, 2),
            event_deviation: Decimal::new(15, 2),
            momentum_min_points: 5,
            reversal_high: Decimal::new(90, 2),
            reversal_low: Decimal::new(10, 2),
            reversal_min_move: Decimal::new(20, 2),
            reversal_window: 3,
            reversal_max_liquidity: Decimal::from(5000),
            arbitrage_min_gap: Decimal::new(5, 2),
            news_window_hours: Decimal::from(2),
            event_min_hours: Decimal::ONE,
            event_max_hours: Decimal::from(48),
            attention_spike_ratio: Decimal::from(2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Ask the "already happened" question when close is this near
    pub resolution_window_days: i64,
    /// Weight given to the confirmed probability when blending
    pub trust: Decimal,
    pub unconfirmed_penalty: Decimal,
    pub sentiment_bonus: Decimal,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            resolution_window_days: 7,
            trust: Decimal::new(5, 1),
            unconfirmed_penalty: Decimal::new(10, 2),
            sentiment_bonus: Decimal::new(5, 2),
        }
    }
}

/// Estimation and sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub min_edge: Decimal,
    pub min_confidence: Decimal,
    pub kelly_multiplier: Decimal,
    pub max_position_pct: Decimal,
    pub momentum_adjustment: Decimal,
    pub reversal_adjustment: Decimal,
    pub mispricing_adjustment: Decimal,
    pub min_estimate: Decimal,
    pub max_estimate: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_edge: Decimal::new(10, 2),
            min_confidence: Decimal::new(60, 2),
            kelly_multiplier: Decimal::new(75, 2),
            max_position_pct: Decimal::new(15, 2),
            momentum_adjustment: Decimal::new(10, 2),
            reversal_adjustment: Decimal::new(15, 2),
            mispricing_adjustment: Decimal::new(10, 2),
            min_estimate: Decimal::new(5, 2),
            max_estimate: Decimal::new(95, 2),
        }
    }
}

/// Portfolio limits and exits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_concurrent: usize,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub max_hold_hours: i64,
    /// Fraction of initial capital that may be lost in one UTC day
    pub max_daily_loss_pct: Decimal,
    /// Drawdown from peak that halts all admissions
    pub kill_switch_drawdown: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            stop_loss_pct: Decimal::new(20, 2),
            take_profit_pct: Decimal::ONE,
            max_hold_hours: 168,
            max_daily_loss_pct: Decimal::new(10, 2),
            kill_switch_drawdown: Decimal::new(20, 2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HedgeConfig {
    pub enabled: bool,
    /// Admissions below this confidence get a hedge
    pub confidence_threshold: Decimal,
    pub hedge_ratio: Decimal,
    pub max_hedge: Decimal,
    /// Positions smaller than this are never hedged
    pub min_position: Decimal,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: Decimal::new(60, 2),
            hedge_ratio: Decimal::new(25, 2),
            max_hedge: Decimal::from(50),
            min_position: Decimal::from(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub initial_capital: Decimal,
    pub cycle_interval_secs: u64,
    pub ledger_path: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(1000),
            cycle_interval_secs: 1800,
            ledger_path: "~/.autopilot/ledger.jsonl".to_string(),
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8000,
        }
    }
}
