//! Mark-to-market valuation with market-closed fallback.

use chrono::NaiveDateTime;

use super::portfolio::Portfolio;
use crate::ports::price_port::PricePort;

/// Portfolio value at `at`: cash plus every held position marked at the
/// provider's price.
///
/// When any held symbol has no price at `at`, the whole market is treated
/// as closed for that timestamp: the most recent previously recorded
/// valuation is returned, or cash alone when there is none. The fallback
/// is all-or-nothing, never per symbol. Every call records the result into
/// the value history, overwriting any prior entry for `at`.
pub fn value_at(portfolio: &mut Portfolio, prices: &dyn PricePort, at: NaiveDateTime) -> f64 {
    let mut position_value = 0.0;
    let mut market_open = true;

    for (symbol, &shares) in &portfolio.positions {
        if shares <= 0 {
            continue;
        }
        match prices.price_at(symbol, at) {
            Some(price) => position_value += shares as f64 * price,
            None => {
                market_open = false;
                break;
            }
        }
    }

    let value = if market_open {
        portfolio.cash + position_value
    } else {
        portfolio.last_value_before(at).unwrap_or(portfolio.cash)
    };

    portfolio.record_value(at, value);
    value
}

/// Profit and loss at `at` relative to starting cash.
pub fn pnl_at(portfolio: &mut Portfolio, prices: &dyn PricePort, at: NaiveDateTime) -> f64 {
    value_at(portfolio, prices, at) - portfolio.initial_cash
}
