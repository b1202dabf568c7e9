//! Risk and return statistics over the recorded value history.
//!
//! Every operation needs at least 2 history entries and at least 2
//! derived returns; anything less is "insufficient data", reported as
//! `None` rather than an error.

use super::portfolio::Portfolio;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annualization basis for volatility and Sharpe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingPeriod {
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl ReportingPeriod {
    pub fn periods_per_year(self) -> f64 {
        match self {
            ReportingPeriod::Daily => 252.0,
            ReportingPeriod::Weekly => 52.0,
            ReportingPeriod::Monthly => 12.0,
            ReportingPeriod::Annual => 1.0,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "daily" => Some(ReportingPeriod::Daily),
            "weekly" => Some(ReportingPeriod::Weekly),
            "monthly" => Some(ReportingPeriod::Monthly),
            "annual" => Some(ReportingPeriod::Annual),
            _ => None,
        }
    }

    /// Parse with the documented fallback: unrecognized strings become
    /// `Daily`, with a warning on stderr.
    pub fn parse_lossy(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| {
            eprintln!("warning: unrecognized period '{value}', defaulting to daily");
            ReportingPeriod::Daily
        })
    }
}

impl std::fmt::Display for ReportingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportingPeriod::Daily => write!(f, "daily"),
            ReportingPeriod::Weekly => write!(f, "weekly"),
            ReportingPeriod::Monthly => write!(f, "monthly"),
            ReportingPeriod::Annual => write!(f, "annual"),
        }
    }
}

/// Summary statistics over the full value history.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsSummary {
    /// Percent, rounded to 2 decimals.
    pub total_return_pct: f64,
    /// Fraction per year, unrounded.
    pub annualized_return: f64,
    /// Daily-annualized, percent, rounded to 2 decimals.
    pub volatility_pct: f64,
    /// Rounded to 3 decimals; `None` when return dispersion is zero.
    pub sharpe_ratio: Option<f64>,
    /// Percent, rounded to 2 decimals.
    pub max_drawdown_pct: f64,
}

/// Simple period-over-period returns from the sorted value history.
///
/// Steps whose previous value is zero are omitted entirely. `None` when
/// the history has fewer than 2 entries or fewer than 2 returns survive.
pub fn period_returns(portfolio: &Portfolio) -> Option<Vec<f64>> {
    if portfolio.value_history.len() < 2 {
        return None;
    }

    let values: Vec<f64> = portfolio.value_history.values().copied().collect();
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    if returns.len() < 2 {
        return None;
    }
    Some(returns)
}

/// Annualized return dispersion: stddev(returns) * sqrt(periods per year).
pub fn volatility(portfolio: &Portfolio, period: ReportingPeriod) -> Option<f64> {
    let returns = period_returns(portfolio)?;
    Some(stddev(&returns) * period.periods_per_year().sqrt())
}

/// Annualized excess return per unit of volatility.
///
/// `None` under insufficient data or zero return dispersion.
pub fn sharpe_ratio(
    portfolio: &Portfolio,
    risk_free_rate: f64,
    period: ReportingPeriod,
) -> Option<f64> {
    let returns = period_returns(portfolio)?;
    let periods_per_year = period.periods_per_year();

    let sd = stddev(&returns);
    if sd == 0.0 {
        return None;
    }

    let per_period_rf = risk_free_rate / periods_per_year;
    let mean_excess = mean(&returns) - per_period_rf;
    Some(mean_excess * periods_per_year / (sd * periods_per_year.sqrt()))
}

/// Full-history summary; `None` under insufficient data.
pub fn returns_summary(portfolio: &Portfolio, risk_free_rate: f64) -> Option<ReturnsSummary> {
    let returns = period_returns(portfolio)?;
    let values: Vec<f64> = portfolio.value_history.values().copied().collect();

    let first = values[0];
    let last = values[values.len() - 1];
    let total_return_pct = if first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    };

    let annualized_return = (1.0 + total_return_pct / 100.0)
        .powf(TRADING_DAYS_PER_YEAR / returns.len() as f64)
        - 1.0;

    let volatility_pct = stddev(&returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;

    let sharpe = sharpe_ratio(portfolio, risk_free_rate, ReportingPeriod::Daily);

    Some(ReturnsSummary {
        total_return_pct: round_to(total_return_pct, 2),
        annualized_return,
        volatility_pct: round_to(volatility_pct, 2),
        sharpe_ratio: sharpe.map(|s| round_to(s, 3)),
        max_drawdown_pct: round_to(max_drawdown(&values) * 100.0, 2),
    })
}

/// Round to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn stddev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Largest peak-to-trough decline as a fraction, scanning left to right
/// against the running peak.
fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;

    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}
