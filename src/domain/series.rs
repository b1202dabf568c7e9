//! Bar series storage and point-in-time price queries.
//!
//! A `BarSeries` holds one symbol's bars keyed by timestamp; a `BarStore`
//! holds many series and is the default `PricePort` implementation.
//! Series are narrowed through a caller-decided `BarRequest` variant,
//! never through argument-shape inference.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::domain::bar::Bar;
use crate::domain::error::SimError;
use crate::ports::price_port::PricePort;

/// Longest request window for any minute interval, in days.
pub const MAX_MINUTE_PERIOD_DAYS: u32 = 60;

/// Longest request window at 1-minute granularity, in days.
pub const MAX_1M_PERIOD_DAYS: u32 = 8;

/// Intraday bar granularity accepted by period-based requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Min1,
    Min2,
    Min5,
    Min15,
    Min30,
    Min60,
}

impl FromStr for Interval {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::Min1),
            "2m" => Ok(Interval::Min2),
            "5m" => Ok(Interval::Min5),
            "15m" => Ok(Interval::Min15),
            "30m" => Ok(Interval::Min30),
            "60m" => Ok(Interval::Min60),
            _ => Err(SimError::InvalidInterval {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Interval::Min1 => "1m",
            Interval::Min2 => "2m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Min60 => "60m",
        };
        write!(f, "{label}")
    }
}

/// Time selector for narrowing a bar series, decided by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BarRequest {
    /// Daily window, start inclusive, end exclusive.
    DateRange { start: NaiveDate, end: NaiveDate },
    /// Exactly one calendar day.
    SingleDay { date: NaiveDate },
    /// Trailing window of intraday bars ending at the last bar in the series.
    IntervalPeriod { period_days: u32, interval: Interval },
}

impl BarRequest {
    pub fn validate(&self) -> Result<(), SimError> {
        match self {
            BarRequest::DateRange { start, end } => {
                if start == end {
                    return Err(SimError::EmptyDateRange { date: *start });
                }
                Ok(())
            }
            BarRequest::SingleDay { .. } => Ok(()),
            BarRequest::IntervalPeriod {
                period_days,
                interval,
            } => {
                if *period_days > MAX_MINUTE_PERIOD_DAYS {
                    return Err(SimError::PeriodTooLong {
                        limit: MAX_MINUTE_PERIOD_DAYS,
                        interval: "minute".to_string(),
                    });
                }
                if *interval == Interval::Min1 && *period_days > MAX_1M_PERIOD_DAYS {
                    return Err(SimError::PeriodTooLong {
                        limit: MAX_1M_PERIOD_DAYS,
                        interval: "1-minute".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Chronologically keyed OHLCV bars for a single symbol.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    bars: BTreeMap<NaiveDateTime, Bar>,
}

impl BarSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut series = Self::new();
        for bar in bars {
            series.insert(bar);
        }
        series
    }

    /// Insert a bar keyed by its timestamp; a bar at an existing timestamp
    /// replaces the old one.
    pub fn insert(&mut self, bar: Bar) {
        self.bars.insert(bar.at, bar);
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.values().next()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.values().next_back()
    }

    /// Mid-price of the bar at exactly `at`; `None` when no bar carries
    /// that timestamp (market closed or out of range).
    pub fn price_at(&self, at: NaiveDateTime) -> Option<f64> {
        self.bars.get(&at).map(Bar::mid_price)
    }

    /// Average of the mid-prices of the last `window` bars at or before
    /// `at`; `None` when fewer than `window` bars are in range.
    pub fn moving_average(&self, at: NaiveDateTime, window: usize) -> Option<f64> {
        if window == 0 {
            return None;
        }
        let mids: Vec<f64> = self
            .bars
            .range(..=at)
            .rev()
            .take(window)
            .map(|(_, bar)| bar.mid_price())
            .collect();
        if mids.len() < window {
            return None;
        }
        Some(mids.iter().sum::<f64>() / window as f64)
    }

    /// Narrow to the bars matched by a validated request.
    pub fn select(&self, request: &BarRequest) -> Result<BarSeries, SimError> {
        request.validate()?;
        let selected = match request {
            BarRequest::DateRange { start, end } => self
                .bars
                .values()
                .filter(|bar| bar.at.date() >= *start && bar.at.date() < *end)
                .cloned()
                .collect::<Vec<_>>(),
            BarRequest::SingleDay { date } => self
                .bars
                .values()
                .filter(|bar| bar.at.date() == *date)
                .cloned()
                .collect(),
            BarRequest::IntervalPeriod { period_days, .. } => match self.last() {
                Some(last) => {
                    let cutoff = last.at - Duration::days(i64::from(*period_days));
                    self.bars
                        .values()
                        .filter(|bar| bar.at > cutoff)
                        .cloned()
                        .collect()
                }
                None => Vec::new(),
            },
        };
        Ok(BarSeries::from_bars(selected))
    }
}

/// Multi-symbol bar store.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    series: HashMap<String, BarSeries>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_series(&mut self, symbol: impl Into<String>, series: BarSeries) {
        self.series.insert(symbol.into(), series);
    }

    pub fn series(&self, symbol: &str) -> Option<&BarSeries> {
        self.series.get(symbol)
    }

    /// Loaded symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Narrow one symbol's series by a request. Unknown symbols are an
    /// error here, unlike the `PricePort` queries, because the caller
    /// asked for data the store never loaded.
    pub fn select(&self, symbol: &str, request: &BarRequest) -> Result<BarSeries, SimError> {
        match self.series.get(symbol) {
            Some(series) => series.select(request),
            None => Err(SimError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }
}

impl PricePort for BarStore {
    fn price_at(&self, symbol: &str, at: NaiveDateTime) -> Option<f64> {
        self.series.get(symbol).and_then(|s| s.price_at(at))
    }

    fn moving_average(&self, symbol: &str, at: NaiveDateTime, window: usize) -> Option<f64> {
        self.series
            .get(symbol)
            .and_then(|s| s.moving_average(at, window))
    }
}
