#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use portsim::domain::bar::Bar;
use portsim::domain::rule::{Condition, RuleAction, TradeRule};
use portsim::domain::simulation::{Frequency, SimulationConfig};
use portsim::ports::price_port::PricePort;

/// Midnight on 2025-07-21, the first day of every test scenario.
pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, 21)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn day(offset: i64) -> NaiveDateTime {
    start() + Duration::days(offset)
}

/// A bar whose mid-price is exactly `price`.
pub fn daily_bar(at: NaiveDateTime, price: f64) -> Bar {
    Bar {
        at,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 5_000,
    }
}

pub fn make_config(duration_days: u32) -> SimulationConfig {
    SimulationConfig {
        initial_cash: 100_000.0,
        start: start(),
        duration_days,
        frequency: Frequency::Daily,
        holdings: Vec::new(),
        rules: Vec::new(),
        risk_free_rate: 0.05,
    }
}

pub fn sell_rule(symbol: &str, threshold: f64, shares: i64) -> TradeRule {
    TradeRule {
        symbol: symbol.to_string(),
        action: RuleAction::Sell,
        condition: Condition::GreaterThan,
        threshold,
        shares,
    }
}

pub fn buy_rule(symbol: &str, threshold: f64, shares: i64) -> TradeRule {
    TradeRule {
        symbol: symbol.to_string(),
        action: RuleAction::Buy,
        condition: Condition::LessThan,
        threshold,
        shares,
    }
}

/// Price provider scripted per symbol and timestamp; anything not
/// scripted reads as a closed market.
pub struct MockMarket {
    prices: HashMap<(String, NaiveDateTime), f64>,
}

impl MockMarket {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    pub fn with_price(mut self, symbol: &str, at: NaiveDateTime, price: f64) -> Self {
        self.prices.insert((symbol.to_string(), at), price);
        self
    }
}

impl PricePort for MockMarket {
    fn price_at(&self, symbol: &str, at: NaiveDateTime) -> Option<f64> {
        self.prices.get(&(symbol.to_string(), at)).copied()
    }

    fn moving_average(&self, _symbol: &str, _at: NaiveDateTime, _window: usize) -> Option<f64> {
        None
    }
}

/// Every symbol quotes the same price at every timestamp.
pub struct FlatMarket(pub f64);

impl PricePort for FlatMarket {
    fn price_at(&self, _symbol: &str, _at: NaiveDateTime) -> Option<f64> {
        Some(self.0)
    }

    fn moving_average(&self, _symbol: &str, _at: NaiveDateTime, _window: usize) -> Option<f64> {
        Some(self.0)
    }
}

/// Provider that blocks inside `price_at` until released, so a test can
/// act while a run is provably mid-step. `entered` flips on the first
/// query; queries spin until `release` flips.
pub struct GatedMarket {
    pub price: f64,
    pub entered: Arc<AtomicBool>,
    pub release: Arc<AtomicBool>,
}

impl GatedMarket {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            entered: Arc::new(AtomicBool::new(false)),
            release: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl PricePort for GatedMarket {
    fn price_at(&self, _symbol: &str, _at: NaiveDateTime) -> Option<f64> {
        self.entered.store(true, Ordering::SeqCst);
        while !self.release.load(Ordering::SeqCst) {
            thread::sleep(StdDuration::from_millis(1));
        }
        Some(self.price)
    }

    fn moving_average(&self, _symbol: &str, _at: NaiveDateTime, _window: usize) -> Option<f64> {
        Some(self.price)
    }
}

/// Quotes a flat price until `panic_at`, then panics like a failing
/// data feed.
pub struct PanicMarket {
    pub price: f64,
    pub panic_at: NaiveDateTime,
}

impl PricePort for PanicMarket {
    fn price_at(&self, _symbol: &str, at: NaiveDateTime) -> Option<f64> {
        if at == self.panic_at {
            panic!("price feed disconnected");
        }
        Some(self.price)
    }

    fn moving_average(&self, _symbol: &str, _at: NaiveDateTime, _window: usize) -> Option<f64> {
        Some(self.price)
    }
}
