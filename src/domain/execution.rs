//! Ledger order execution: limit-bounded fills against a reference price.
//!
//! Each order resolves against the single observed mid-price at its
//! timestamp. Prices never move against the trader relative to their
//! stated limit: buys fill at min(limit, market), sells at max(limit,
//! market).

use chrono::NaiveDateTime;

use super::portfolio::{Portfolio, TradeAction, TradeRecord};
use crate::ports::price_port::PricePort;

/// Why an order did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// Market price above the buy limit.
    PriceTooHigh,
    /// Market price below the sell limit.
    PriceTooLow,
    InsufficientCash,
    InsufficientShares,
    /// Share count zero or negative.
    InvalidQuantity,
}

impl std::fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            RefusalReason::PriceTooHigh => "price too high",
            RefusalReason::PriceTooLow => "price too low",
            RefusalReason::InsufficientCash => "insufficient cash",
            RefusalReason::InsufficientShares => "insufficient shares",
            RefusalReason::InvalidQuantity => "invalid quantity",
        };
        write!(f, "{}", reason)
    }
}

/// Result of an order attempt. A refusal is an expected business outcome,
/// not an error; the caller decides whether to surface it.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Executed { execution_price: f64, shares: i64 },
    Refused(RefusalReason),
    /// Market closed or no bar at the timestamp; the order is dropped.
    NoMarketData,
}

/// Buy `shares` of `symbol` at no worse than `limit_price`.
///
/// Fill price is min(limit, market). Requires cash for the full cost at
/// the fill price; debits cash, credits the position, appends a trade
/// record.
pub fn buy(
    portfolio: &mut Portfolio,
    prices: &dyn PricePort,
    symbol: &str,
    limit_price: f64,
    shares: i64,
    at: NaiveDateTime,
) -> TradeOutcome {
    if shares <= 0 {
        return TradeOutcome::Refused(RefusalReason::InvalidQuantity);
    }

    let market_price = match prices.price_at(symbol, at) {
        Some(price) => price,
        None => return TradeOutcome::NoMarketData,
    };

    if market_price > limit_price {
        return TradeOutcome::Refused(RefusalReason::PriceTooHigh);
    }

    let execution_price = limit_price.min(market_price);
    let cost = execution_price * shares as f64;

    if cost > portfolio.cash {
        return TradeOutcome::Refused(RefusalReason::InsufficientCash);
    }

    portfolio.cash -= cost;
    *portfolio.positions.entry(symbol.to_string()).or_insert(0) += shares;
    portfolio.record_trade(TradeRecord {
        action: TradeAction::Buy,
        symbol: symbol.to_string(),
        executed_price: execution_price,
        shares,
        at,
    });

    TradeOutcome::Executed {
        execution_price,
        shares,
    }
}

/// Sell `shares` of `symbol` at no worse than `limit_price`.
///
/// Fill price is max(limit, market). Requires the position to cover the
/// full quantity; debits the position, credits cash, appends a trade
/// record.
pub fn sell(
    portfolio: &mut Portfolio,
    prices: &dyn PricePort,
    symbol: &str,
    limit_price: f64,
    shares: i64,
    at: NaiveDateTime,
) -> TradeOutcome {
    if shares <= 0 {
        return TradeOutcome::Refused(RefusalReason::InvalidQuantity);
    }

    let market_price = match prices.price_at(symbol, at) {
        Some(price) => price,
        None => return TradeOutcome::NoMarketData,
    };

    if market_price < limit_price {
        return TradeOutcome::Refused(RefusalReason::PriceTooLow);
    }

    if portfolio.shares_held(symbol) < shares {
        return TradeOutcome::Refused(RefusalReason::InsufficientShares);
    }

    let execution_price = limit_price.max(market_price);
    let proceeds = execution_price * shares as f64;

    portfolio.cash += proceeds;
    *portfolio.positions.entry(symbol.to_string()).or_insert(0) -= shares;
    portfolio.record_trade(TradeRecord {
        action: TradeAction::Sell,
        symbol: symbol.to_string(),
        executed_price: execution_price,
        shares,
        at,
    });

    TradeOutcome::Executed {
        execution_price,
        shares,
    }
}
