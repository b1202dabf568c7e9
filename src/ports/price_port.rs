//! Price series provider port trait.

use chrono::NaiveDateTime;

/// Point-in-time price lookup for a symbol.
///
/// `None` means market closed or no data at that timestamp. It is
/// distinguishable from a legitimate zero price and is never an error for
/// symbols that have data elsewhere in range. The clock is always passed
/// in; implementations hold no notion of "current time".
pub trait PricePort {
    fn price_at(&self, symbol: &str, at: NaiveDateTime) -> Option<f64>;

    /// Average of the mid-prices of the last `window` bars at or before
    /// `at`; `None` when fewer than `window` bars exist.
    fn moving_average(&self, symbol: &str, at: NaiveDateTime, window: usize) -> Option<f64>;
}
