//! Declarative trading rules evaluated by the simulation driver.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Buy,
    Sell,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Buy => write!(f, "buy"),
            RuleAction::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    GreaterThan,
    LessThan,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::GreaterThan => write!(f, ">"),
            Condition::LessThan => write!(f, "<"),
        }
    }
}

/// One rule: trade a fixed share count in a symbol when its current
/// price crosses the threshold. Immutable once a simulation starts.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRule {
    pub symbol: String,
    pub action: RuleAction,
    pub condition: Condition,
    pub threshold: f64,
    pub shares: i64,
}

impl TradeRule {
    /// Strict comparison; a price exactly at the threshold never fires.
    pub fn is_triggered(&self, price: f64) -> bool {
        match self.condition {
            Condition::GreaterThan => price > self.threshold,
            Condition::LessThan => price < self.threshold,
        }
    }
}

impl fmt::Display for TradeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} when price {} {}",
            self.action, self.shares, self.symbol, self.condition, self.threshold
        )
    }
}
