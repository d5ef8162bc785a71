//! The trading cycle
//!
//! ```text
//! snapshot → filter → score/rank → patterns → confirm → estimate → size
//!                                                                   │
//!            ledger ← exits → kill switch → admissions → hedges ←───┘
//! ```
//!
//! A cycle has two phases. The analysis phase reads an immutable view of the
//! portfolio and may be abandoned at any point (a snapshot that cannot be
//! fetched, a reasoning collaborator that stays unreachable) without leaving
//! a trace. The mutation phase applies exits and then admissions in rank
//! order, writing every decision to the ledger before the portfolio changes.


use crate::analysis::{MarketContext, PatternEngine, PriceHistory, SignalFeed};
use crate::client::Exchange;
use crate::config::Config;
use crate::error::Result;
use crate::executor::Executor;
use crate::model::{ConfirmationGate, ProbabilityEdgeEstimator, ProbabilityEstimate, Reasoner};
use crate::monitor::{CycleSummary, Monitor, TradeRecord};
use crate::portfolio::Portfolio;
use crate::risk::{ExitSignal, Proposal, RiskManager, RiskState};
use crate::scanner::{MarketFilter, QuantitativeScorer};
use crate::storage::{Ledger, LedgerEntry, LedgerState, Outcome};
use crate::strategy::{HedgingManager, PositionSizer};
use crate::types::{
    ClosedPosition, Event, Market, Order, Position, ReasonCode, Side, TradeAction, TradeDecision,
};
use crate::utils::RetryPolicy;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Admission candidate produced by the analysis phase
#[derive(Debug, Clone)]
struct Candidate {
    market: Market,
    estimate: ProbabilityEstimate,
    size: Decimal,
}

/// Result of the analysis phase
#[derive(Debug, Default)]
struct Analysis {
    candidates: Vec<Candidate>,
    skips: Vec<TradeDecision>,
}

pub struct Autopilot {
    exchange: Arc<dyn Exchange>,
    signals: Arc<dyn SignalFeed>,
    executor: Executor,
    filter: MarketFilter,
    scorer: QuantitativeScorer,
    patterns: PatternEngine,
    gate: ConfirmationGate,
    estimator: ProbabilityEdgeEstimator,
    sizer: PositionSizer,
    risk: RiskManager,
    hedger: HedgingManager,
    portfolio: Portfolio,
    history: PriceHistory,
    ledger: Ledger,
    monitor: Monitor,
    retry: RetryPolicy,
    pattern_threshold: Decimal,
    cycle: u64,
}

impl Autopilot {
    /// Wire the pipeline around restored ledger state
    pub fn new(
        config: &Config,
        exchange: Arc<dyn Exchange>,
        reasoner: Arc<dyn Reasoner>,
        signals: Arc<dyn SignalFeed>,
        ledger: Ledger,
        state: LedgerState,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.runtime);
        Self {
            executor: Executor::new(exchange.clone(), retry),
            exchange,
            signals,
            filter: MarketFilter::new(config.filter.clone()),
            scorer: QuantitativeScorer::new(config.scoring.clone()),
            patterns: PatternEngine::new(&config.patterns),
            gate: ConfirmationGate::new(
                reasoner,
                config.confirmation.clone(),
                config.patterns.confirmation_threshold,
                retry,
            ),
            estimator: ProbabilityEdgeEstimator::new(
                config.strategy.clone(),
                config.confirmation.clone(),
            ),
            sizer: PositionSizer::new(config.strategy.clone()),
            risk: RiskManager::with_state(
                config.risk.clone(),
                state.risk_state,
                state.last_reset,
            ),
            hedger: HedgingManager::new(config.hedge.clone()),
            portfolio: state.portfolio,
            history: PriceHistory::new(config.patterns.history_len),
            ledger,
            monitor: Monitor::new(1000),
            retry,
            pattern_threshold: config.patterns.confirmation_threshold,
            cycle: 0,
        }
    }

    /// Open (or create) the configured ledger and wire the pipeline
    pub async fn open(
        config: &Config,
        exchange: Arc<dyn Exchange>,
        reasoner: Arc<dyn Reasoner>,
        signals: Arc<dyn SignalFeed>,
    ) -> Result<Self> {
        let ledger = Ledger::new(&config.runtime.ledger_path);
        let state = ledger
            .open_or_init(config.runtime.initial_capital, Utc::now())
            .await?;
        info!(
            "Ledger {}: {} decisions replayed, balance {:.2}, {} open positions",
            ledger.path().display(),
            state.decisions,
            state.portfolio.balance(),
            state.portfolio.open_count()
        );
        if let RiskState::Halted { reason, since } = &state.risk_state {
            warn!("Restored HALTED state (since {}): {}", since, reason);
        }

        let closed = state.portfolio.closed_positions().to_vec();
        let autopilot = Self::new(config, exchange, reasoner, signals, ledger, state);
        autopilot.monitor.load_history(&closed).await;
        Ok(autopilot)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn risk_state(&self) -> &RiskState {
        self.risk.state()
    }

    pub fn history_mut(&mut self) -> &mut PriceHistory {
        &mut self.history
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Run cycles until interrupted, or once
    pub async fn run(&mut self, interval: Duration, once: bool) -> Result<()> {
        loop {
            let summary = self.run_cycle(Utc::now()).await?;
            self.monitor.log_cycle(&summary);

            if once {
                break;
            }
            debug!("Next cycle in {:?}", interval);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, stopping");
                    break;
                }
            }
        }

        self.monitor.log_final_stats(&self.portfolio.summary()).await;
        Ok(())
    }

    /// One full cycle. Errors are reserved for ledger failures; an abandoned
    /// cycle comes back as a summary with `aborted` set.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleSummary> {
        self.cycle += 1;
        let mut summary = CycleSummary {
            cycle: self.cycle,
            started_at: Some(now),
            ..Default::default()
        };
        self.portfolio.roll_day(now.date_naive());

        let exchange = &self.exchange;
        let snapshot = match self
            .retry
            .run("fetch markets", || exchange.get_markets())
            .await
        {
            Ok(markets) => markets,
            Err(e) => {
                warn!("Market snapshot unavailable, abandoning cycle: {}", e);
                summary.aborted = Some(e.to_string());
                return Ok(self.finish(summary));
            }
        };
        summary.markets_seen = snapshot.len();

        self.history.retain(&snapshot);
        self.history.record(&snapshot, now);
        let held = self.held_markets(&snapshot).await;

        let analysis = if self.risk.is_halted() {
            info!("Risk manager halted, skipping analysis");
            Analysis::default()
        } else {
            match self.analyze(&snapshot, now, &mut summary).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!("Analysis abandoned: {}", e);
                    summary.aborted = Some(e.to_string());
                    return Ok(self.finish(summary));
                }
            }
        };

        // mutation phase
        for skip in analysis.skips {
            self.record(skip, Outcome::Skipped, &mut summary).await?;
        }

        let mut priced = snapshot;
        priced.extend(held);
        self.portfolio.mark_prices(&priced);

        let exits = self.risk.review_positions(&self.portfolio, &priced, now);
        for exit in exits {
            self.apply_exit(&exit, now, &mut summary).await?;
        }

        self.check_kill_switch(now).await?;

        for candidate in analysis.candidates {
            self.admit(&candidate, now, &mut summary).await?;
        }

        summary.venue_drift = self.reconcile().await;
        Ok(self.finish(summary))
    }

    /// Compare the venue account with the ledger. Differences are reported,
    /// never corrected.
    async fn reconcile(&self) -> Vec<String> {
        let account = tokio::try_join!(self.exchange.get_balance(), self.exchange.get_positions());
        let (cash, holdings) = match account {
            Ok(account) => account,
            Err(e) => {
                warn!("Could not reconcile with venue: {}", e);
                return Vec::new();
            }
        };
        let tolerance = Decimal::new(1, 2);
        let mut drift = Vec::new();

        let available = self.portfolio.available();
        if (cash - available).abs() > tolerance {
            drift.push(format!(
                "venue cash {:.2}, ledger available {:.2}",
                cash, available
            ));
        }

        let mut expected: HashMap<(&str, Side), Decimal> = HashMap::new();
        for position in self.portfolio.positions() {
            *expected
                .entry((position.market_id.as_str(), position.side))
                .or_default() += position.size / position.entry_price;
        }
        for holding in &holdings {
            let ledgered = expected
                .remove(&(holding.market_id.as_str(), holding.side))
                .unwrap_or_default();
            if (holding.shares - ledgered).abs() > tolerance {
                drift.push(format!(
                    "{} {}: venue holds {:.4} shares, ledger {:.4}",
                    holding.market_id, holding.side, holding.shares, ledgered
                ));
            }
        }
        for ((market_id, side), ledgered) in expected {
            drift.push(format!(
                "{} {}: venue holds no shares, ledger {:.4}",
                market_id, side, ledgered
            ));
        }

        drift.sort();
        for line in &drift {
            warn!("Venue drift: {}", line);
        }
        drift
    }

    /// Markets of open positions that are missing from the snapshot
    async fn held_markets(&self, snapshot: &[Market]) -> Vec<Market> {
        let mut missing: Vec<&str> = self
            .portfolio
            .positions()
            .iter()
            .map(|p| p.market_id.as_str())
            .filter(|id| !snapshot.iter().any(|m| m.id == *id))
            .collect();
        missing.sort_unstable();
        missing.dedup();

        let mut held = Vec::new();
        for market_id in missing {
            let exchange = &self.exchange;
            match self
                .retry
                .run("fetch held market", || exchange.get_market(market_id))
                .await
            {
                Ok(Some(market)) => held.push(market),
                Ok(None) => debug!("Held market {} not found", market_id),
                Err(e) => warn!("Could not refresh held market {}: {}", market_id, e),
            }
        }
        held
    }

    async fn analyze(
        &self,
        snapshot: &[Market],
        now: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<Analysis> {
        let (eligible, _stats) = self.filter.apply_with_stats(snapshot, now);
        summary.eligible = eligible.len();

        let ranked = self.scorer.rank(eligible);
        summary.shortlisted = ranked.len();

        let events = Event::group(snapshot);
        let mut analysis = Analysis::default();

        for scored in ranked {
            let market = scored.market;
            if self.portfolio.has_open_position(&market.id) {
                analysis
                    .skips
                    .push(decision_at(TradeDecision::skip(&market.id, ReasonCode::Duplicate), now));
                continue;
            }

            let ctx = self.context_for(&market, &events, now).await;
            let score = self.patterns.analyze(&market, &ctx);
            debug!(
                "{} patterns: total {} dominant {:?} [{}]",
                market.id,
                score.total,
                score.dominant,
                score.reasons().join("; ")
            );
            if score.total < self.pattern_threshold {
                analysis.skips.push(decision_at(
                    TradeDecision::skip(&market.id, ReasonCode::BelowPatternThreshold),
                    now,
                ));
                continue;
            }

            let confirmation = self.gate.confirm(&market, &score, ctx.news.as_ref(), now).await?;
            if confirmation.queries > 0 {
                summary.confirmations += 1;
            }

            let estimate = match self.estimator.evaluate(&market, &score, &confirmation, &ctx) {
                Ok(estimate) => estimate,
                Err(reason) => {
                    analysis
                        .skips
                        .push(decision_at(TradeDecision::skip(&market.id, reason), now));
                    continue;
                }
            };

            match self.sizer.size(&estimate, &self.portfolio) {
                Ok(size) => {
                    info!(
                        "Candidate {}: {} p={:.3} vs {:.3}, edge {:.3}, confidence {:.2}, size {:.2}",
                        market.id,
                        estimate.side,
                        estimate.probability,
                        estimate.market_price,
                        estimate.edge,
                        estimate.confidence,
                        size
                    );
                    analysis.candidates.push(Candidate {
                        market,
                        estimate,
                        size,
                    });
                }
                Err(reason) => {
                    analysis
                        .skips
                        .push(decision_at(TradeDecision::skip(&market.id, reason), now));
                }
            }
        }

        Ok(analysis)
    }

    async fn context_for(
        &self,
        market: &Market,
        events: &HashMap<String, Event>,
        now: DateTime<Utc>,
    ) -> MarketContext {
        let (prices, volumes) = self
            .history
            .get(&market.id)
            .map(|h| (h.prices(), h.volumes()))
            .unwrap_or_default();

        let sibling_mean = market
            .event_id
            .as_ref()
            .and_then(|id| events.get(id))
            .and_then(|event| event.sibling_mean_price(&market.id));

        let counterpart_price = match self.signals.counterpart_price(market).await {
            Ok(price) => price,
            Err(e) => {
                warn!("{} counterpart price unavailable: {}", self.signals.name(), e);
                None
            }
        };
        let news = match self.signals.news(market).await {
            Ok(news) => news,
            Err(e) => {
                warn!("{} news unavailable: {}", self.signals.name(), e);
                None
            }
        };

        MarketContext {
            now,
            prices,
            volumes,
            sibling_mean,
            counterpart_price,
            news,
        }
    }

    async fn apply_exit(
        &mut self,
        exit: &ExitSignal,
        now: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let Some(position) = self.portfolio.position(exit.position_id).cloned() else {
            return Ok(());
        };
        let action = TradeAction::Close {
            position_id: position.id,
            exit_price: exit.exit_price,
            state: exit.state,
        };
        let decision = decision_at(TradeDecision::new(&exit.market_id, action, exit.reason), now);

        // settlement pays out on the venue without an order
        if exit.reason != ReasonCode::Settled {
            if let Err(e) = self.executor.submit(&Order::close(&position, exit.exit_price)).await {
                let outcome = Outcome::Failed {
                    error: e.to_string(),
                };
                return self.record(decision, outcome, summary).await;
            }
        }

        let closed = closing_record(&position, exit, now);
        self.record(decision, Outcome::Closed { closed }, summary).await?;
        let closed = self.risk.close(&mut self.portfolio, exit, now)?;
        self.monitor.record_trade(TradeRecord::from(&closed)).await;
        Ok(())
    }

    async fn check_kill_switch(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.risk.check_kill_switch(&self.portfolio, now) {
            self.record_halt(now).await?;
        }
        Ok(())
    }

    async fn record_halt(&self, now: DateTime<Utc>) -> Result<()> {
        if let RiskState::Halted { reason, .. } = self.risk.state() {
            self.ledger
                .append(&LedgerEntry::Halted {
                    reason: reason.clone(),
                    at: now,
                })
                .await?;
        }
        Ok(())
    }

    async fn admit(
        &mut self,
        candidate: &Candidate,
        now: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        let market = &candidate.market;
        let estimate = &candidate.estimate;
        let proposal = Proposal {
            market_id: market.id.clone(),
            question: market.question.clone(),
            side: estimate.side,
            price: estimate.side_price(),
            size: candidate.size,
            confidence: estimate.confidence,
            hedges: None,
        };

        if let Err(reason) = self.risk.evaluate(&proposal, &self.portfolio, now) {
            if reason == ReasonCode::KillSwitch {
                self.record_halt(now).await?;
            }
            info!("Skipping {}: {}", market.id, reason);
            let skip = decision_at(TradeDecision::skip(&market.id, reason), now);
            return self.record(skip, Outcome::Skipped, summary).await;
        }

        let action = TradeAction::Open {
            side: proposal.side,
            size: proposal.size,
            price: proposal.price,
        };
        let decision = decision_at(TradeDecision::new(&market.id, action, ReasonCode::Admitted), now);
        let Some(main) = self.execute_open(&proposal, decision, now, summary).await? else {
            return Ok(());
        };

        if let Some(plan) = self.hedger.plan(&main, market) {
            let hedge = Proposal {
                market_id: plan.market_id.clone(),
                question: main.question.clone(),
                side: plan.side,
                price: plan.price,
                size: plan.size,
                confidence: main.confidence,
                hedges: Some(plan.main_position_id),
            };
            if let Err(reason) = self.risk.evaluate(&hedge, &self.portfolio, now) {
                if reason == ReasonCode::KillSwitch {
                    self.record_halt(now).await?;
                }
                info!("Hedge for {} not placed: {}", market.id, reason);
                let skip = decision_at(TradeDecision::skip(&market.id, reason), now);
                return self.record(skip, Outcome::Skipped, summary).await;
            }

            let action = TradeAction::Hedge {
                position_id: plan.main_position_id,
                side: plan.side,
                size: plan.size,
                price: plan.price,
            };
            let decision =
                decision_at(TradeDecision::new(&market.id, action, ReasonCode::HedgeProtection), now);
            self.execute_open(&hedge, decision, now, summary).await?;
        }
        Ok(())
    }

    /// Place the order, then ledger and book the position. `None` when the
    /// order failed.
    async fn execute_open(
        &mut self,
        proposal: &Proposal,
        decision: TradeDecision,
        now: DateTime<Utc>,
        summary: &mut CycleSummary,
    ) -> Result<Option<Position>> {
        let order = Order::buy(&proposal.market_id, proposal.side, proposal.price, proposal.size);
        let order_id = match self.executor.submit(&order).await {
            Ok(order_id) => order_id,
            Err(e) => {
                let outcome = Outcome::Failed {
                    error: e.to_string(),
                };
                self.record(decision, outcome, summary).await?;
                return Ok(None);
            }
        };

        let position = self.risk.build_position(proposal, now);
        info!(
            "Opened {}{} {} {:.2} @ {:.4} (order {})",
            if position.is_hedge { "hedge " } else { "" },
            position.side,
            position.market_id,
            position.size,
            position.entry_price,
            order_id
        );
        let outcome = Outcome::Opened {
            position: position.clone(),
        };
        self.record(decision, outcome, summary).await?;
        self.risk.open(&mut self.portfolio, position.clone())?;
        Ok(Some(position))
    }

    /// Ledger a decision and count it in the summary
    async fn record(
        &self,
        decision: TradeDecision,
        outcome: Outcome,
        summary: &mut CycleSummary,
    ) -> Result<()> {
        match (&decision.action, &outcome) {
            (_, Outcome::Skipped) => summary.skipped += 1,
            (_, Outcome::Failed { .. }) => summary.failed += 1,
            (_, Outcome::Closed { .. }) => summary.closed += 1,
            (TradeAction::Hedge { .. }, Outcome::Opened { .. }) => summary.hedged += 1,
            (_, Outcome::Opened { .. }) => summary.opened += 1,
        }
        self.ledger
            .append(&LedgerEntry::Decision {
                decision: decision.clone(),
                outcome,
            })
            .await?;
        summary.decisions.push(decision);
        Ok(())
    }

    fn finish(&self, mut summary: CycleSummary) -> CycleSummary {
        summary.halted = self.risk.is_halted();
        if let RiskState::Halted { reason, .. } = self.risk.state() {
            summary.halt_reason = Some(reason.clone());
        }
        summary.portfolio = Some(self.portfolio.summary());
        summary
    }
}

fn decision_at(mut decision: TradeDecision, at: DateTime<Utc>) -> TradeDecision {
    decision.timestamp = at;
    decision
}

/// The record `Portfolio::close_position` will produce for this exit
fn closing_record(position: &Position, exit: &ExitSignal, now: DateTime<Utc>) -> ClosedPosition {
    let mut position = position.clone();
    position.current_price = exit.exit_price;
    ClosedPosition {
        pnl: position.pnl_at(exit.exit_price),
        position,
        exit_price: exit.exit_price,
        closed_at: now,
        state: exit.state,
    }
}
