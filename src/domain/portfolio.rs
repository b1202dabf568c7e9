//! Portfolio state: cash, positions, trade log, value history.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub action: TradeAction,
    pub symbol: String,
    pub executed_price: f64,
    pub shares: i64,
    pub at: NaiveDateTime,
}

/// Mutable aggregate for one simulation run or interactive session.
///
/// Mutated only through the buy/sell operations in [`execution`] and the
/// valuation snapshot in [`valuation`]; no persistence.
///
/// [`execution`]: super::execution
/// [`valuation`]: super::valuation
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    /// Symbol → share count. Absent key means zero shares; a sell never
    /// drives a count below zero.
    pub positions: HashMap<String, i64>,
    /// Append-only; insertion order is execution order.
    pub trade_log: Vec<TradeRecord>,
    /// Valuation per timestamp. Keys are unique; iteration is ascending
    /// regardless of insertion order.
    pub value_history: BTreeMap<NaiveDateTime, f64>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            positions: HashMap::new(),
            trade_log: Vec::new(),
            value_history: BTreeMap::new(),
        }
    }

    pub fn shares_held(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.trade_log.push(trade);
    }

    /// Insert or overwrite the valuation for `at`.
    pub fn record_value(&mut self, at: NaiveDateTime, value: f64) {
        self.value_history.insert(at, value);
    }

    /// Most recent recorded valuation strictly before `at`.
    pub fn last_value_before(&self, at: NaiveDateTime) -> Option<f64> {
        self.value_history.range(..at).next_back().map(|(_, &v)| v)
    }

    pub fn trade_count(&self) -> usize {
        self.trade_log.len()
    }
}
