//! Time-stepped simulation driver.
//!
//! Advances a virtual clock in fixed steps, evaluates trading rules
//! against a single per-tick price snapshot, executes triggered trades
//! through the ledger, and snapshots valuation into an immutable tick
//! record. One `Simulation` drives exactly one run; cancellation and
//! threading live in the run registry, not here.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::domain::analytics::{self, ReportingPeriod, round_to};
use crate::domain::execution::{self, TradeOutcome};
use crate::domain::portfolio::Portfolio;
use crate::domain::rule::{RuleAction, TradeRule};
use crate::domain::valuation;
use crate::ports::price_port::PricePort;

/// Thirteen 30-minute intervals cover a 6.5-hour trading day.
pub const INTERVALS_PER_DAY: usize = 13;

/// Limit submitted for rule-driven buys sits just above the observed
/// price; the strict market > limit refusal would otherwise drop a fill
/// at the observed price itself. Manual buys carry no buffer.
const RULE_BUY_BUFFER: f64 = 1.0;

/// Step granularity of the virtual clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Intraday,
}

impl Frequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "intraday" => Some(Frequency::Intraday),
            _ => None,
        }
    }

    pub fn step(self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Intraday => Duration::minutes(30),
        }
    }

    pub fn total_steps(self, duration_days: u32) -> usize {
        match self {
            Frequency::Daily => duration_days as usize,
            Frequency::Intraday => duration_days as usize * INTERVALS_PER_DAY,
        }
    }

    /// Human label for a 1-based tick index.
    pub fn label(self, tick: usize) -> String {
        match self {
            Frequency::Daily => format!("Interval {}", tick),
            Frequency::Intraday => {
                let day = (tick - 1) / INTERVALS_PER_DAY + 1;
                let interval = (tick - 1) % INTERVALS_PER_DAY + 1;
                format!("Day {}, Interval {}", day, interval)
            }
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Intraday => write!(f, "intraday"),
        }
    }
}

/// Everything a run needs, fixed before the first tick.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub initial_cash: f64,
    pub start: NaiveDateTime,
    pub duration_days: u32,
    pub frequency: Frequency,
    /// Symbol and share count bought at the start timestamp.
    pub holdings: Vec<(String, i64)>,
    pub rules: Vec<TradeRule>,
    pub risk_free_rate: f64,
}

/// Immutable snapshot of one executed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    /// 1-based.
    pub tick: usize,
    pub label: String,
    pub at: NaiveDateTime,
    /// Symbols with a price this tick; closed symbols are simply absent.
    pub prices: HashMap<String, f64>,
    pub portfolio_value: f64,
    /// Descriptions of trades executed this tick, in execution order.
    pub trades: Vec<String>,
    pub positions: HashMap<String, i64>,
    pub cash: f64,
    pub pnl: f64,
}

/// Final metrics over a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// First tick value vs last, percent, 2dp; `0.0` when the first
    /// tick's value is zero.
    pub total_return_pct: f64,
    pub final_value: f64,
    pub total_pnl: f64,
    /// `None` under insufficient history or zero return dispersion.
    pub sharpe_ratio: Option<f64>,
    /// Percent, `None` under insufficient history.
    pub volatility_pct: Option<f64>,
    /// Every ledger trade including the initial purchases.
    pub total_trades: usize,
    pub final_positions: HashMap<String, i64>,
}

/// Synchronous tick engine over one portfolio and one price provider.
pub struct Simulation<'a> {
    config: SimulationConfig,
    provider: &'a dyn PricePort,
    portfolio: Portfolio,
    clock: NaiveDateTime,
    ticks_done: usize,
    did_setup: bool,
    /// Union of holding and rule symbols, first-seen order.
    tracked: Vec<String>,
}

/// Union of holding and rule symbols, first-seen order. These are the
/// symbols a run will query the provider for.
pub fn tracked_symbols(config: &SimulationConfig) -> Vec<String> {
    let mut tracked: Vec<String> = Vec::new();
    for (symbol, _) in &config.holdings {
        if !tracked.iter().any(|s| s == symbol) {
            tracked.push(symbol.clone());
        }
    }
    for rule in &config.rules {
        if !tracked.iter().any(|s| s == &rule.symbol) {
            tracked.push(rule.symbol.clone());
        }
    }
    tracked
}

impl<'a> Simulation<'a> {
    pub fn new(config: SimulationConfig, provider: &'a dyn PricePort) -> Self {
        let tracked = tracked_symbols(&config);
        let portfolio = Portfolio::new(config.initial_cash);
        let clock = config.start;
        Self {
            config,
            provider,
            portfolio,
            clock,
            ticks_done: 0,
            did_setup: false,
            tracked,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.config.frequency.total_steps(self.config.duration_days)
    }

    pub fn ticks_done(&self) -> usize {
        self.ticks_done
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Buy each configured holding at the start timestamp. The limit is
    /// unbounded so the order fills at whatever the market shows; with
    /// the market closed at start, the order is dropped as no-data.
    fn initial_purchases(&mut self) {
        for (symbol, shares) in &self.config.holdings {
            execution::buy(
                &mut self.portfolio,
                self.provider,
                symbol,
                f64::INFINITY,
                *shares,
                self.config.start,
            );
        }
    }

    /// Execute the next tick; `None` once all steps have run.
    ///
    /// The clock advances before the price fetch, so the first tick
    /// observes `start + step`, never `start` itself.
    pub fn step(&mut self) -> Option<TickRecord> {
        if !self.did_setup {
            self.initial_purchases();
            self.did_setup = true;
        }
        if self.ticks_done >= self.total_steps() {
            return None;
        }

        self.clock += self.config.frequency.step();

        let mut prices: HashMap<String, f64> = HashMap::new();
        for symbol in &self.tracked {
            if let Some(price) = self.provider.price_at(symbol, self.clock) {
                prices.insert(symbol.clone(), price);
            }
        }

        let mut trades = Vec::new();
        for rule in &self.config.rules {
            let price = match prices.get(&rule.symbol) {
                Some(&price) => price,
                None => continue,
            };
            if !rule.is_triggered(price) {
                continue;
            }

            match rule.action {
                RuleAction::Buy => {
                    if self.portfolio.cash >= price * rule.shares as f64 {
                        let outcome = execution::buy(
                            &mut self.portfolio,
                            self.provider,
                            &rule.symbol,
                            price + RULE_BUY_BUFFER,
                            rule.shares,
                            self.clock,
                        );
                        if matches!(outcome, TradeOutcome::Executed { .. }) {
                            trades.push(format!(
                                "Bought {} {} @ ${:.2}",
                                rule.shares, rule.symbol, price
                            ));
                        }
                    }
                }
                RuleAction::Sell => {
                    if self.portfolio.shares_held(&rule.symbol) >= rule.shares {
                        let outcome = execution::sell(
                            &mut self.portfolio,
                            self.provider,
                            &rule.symbol,
                            price,
                            rule.shares,
                            self.clock,
                        );
                        if matches!(outcome, TradeOutcome::Executed { .. }) {
                            trades.push(format!(
                                "Sold {} {} @ ${:.2}",
                                rule.shares, rule.symbol, price
                            ));
                        }
                    }
                }
            }
        }

        let portfolio_value = valuation::value_at(&mut self.portfolio, self.provider, self.clock);
        let pnl = portfolio_value - self.portfolio.initial_cash;

        self.ticks_done += 1;
        Some(TickRecord {
            tick: self.ticks_done,
            label: self.config.frequency.label(self.ticks_done),
            at: self.clock,
            prices,
            portfolio_value,
            trades,
            positions: self.portfolio.positions.clone(),
            cash: self.portfolio.cash,
            pnl,
        })
    }

    /// Drive every remaining tick.
    pub fn run(&mut self) -> Vec<TickRecord> {
        let mut ticks = Vec::new();
        while let Some(tick) = self.step() {
            ticks.push(tick);
        }
        ticks
    }

    /// Final metrics over the accumulated ticks; `None` when no tick ran.
    ///
    /// Sharpe and volatility come from the portfolio's value history
    /// (daily annualization) and stay `None` under insufficient data.
    pub fn summary(&self, ticks: &[TickRecord]) -> Option<RunSummary> {
        let first = ticks.first()?;
        let last = ticks.last()?;

        let total_return_pct = if first.portfolio_value > 0.0 {
            (last.portfolio_value - first.portfolio_value) / first.portfolio_value * 100.0
        } else {
            0.0
        };

        let sharpe = analytics::sharpe_ratio(
            &self.portfolio,
            self.config.risk_free_rate,
            ReportingPeriod::Daily,
        );
        let volatility = analytics::volatility(&self.portfolio, ReportingPeriod::Daily);

        Some(RunSummary {
            total_return_pct: round_to(total_return_pct, 2),
            final_value: round_to(last.portfolio_value, 2),
            total_pnl: round_to(last.portfolio_value - self.portfolio.initial_cash, 2),
            sharpe_ratio: sharpe.map(|s| round_to(s, 3)),
            volatility_pct: volatility.map(|v| round_to(v * 100.0, 2)),
            total_trades: self.portfolio.trade_count(),
            final_positions: self.portfolio.positions.clone(),
        })
    }
}
