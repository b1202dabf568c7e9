//! CSV bar-data adapter.
//!
//! Bars live in a directory of per-symbol files named `{SYMBOL}.csv`
//! with a `timestamp,open,high,low,close,volume` header. Timestamps
//! are `%Y-%m-%d %H:%M:%S`, or a bare `%Y-%m-%d` for daily bars.

use crate::domain::bar::Bar;
use crate::domain::error::SimError;
use crate::domain::series::{BarSeries, BarStore};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvBarAdapter {
    base_path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    pub fn load_symbol(&self, symbol: &str) -> Result<BarSeries, SimError> {
        load_path(&self.csv_path(symbol))
    }

    /// Load every `*.csv` in the base directory into one store, keyed
    /// by upper-cased file stem. Other files are ignored.
    pub fn load_all(&self) -> Result<BarStore, SimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to read directory {}: {}", self.base_path.display(), e),
            )
        })?;

        let mut store = BarStore::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let symbol = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_uppercase(),
                None => continue,
            };
            store.insert_series(symbol, load_path(&path)?);
        }
        Ok(store)
    }
}

fn load_path(path: &Path) -> Result<BarSeries, SimError> {
    let file = path.display().to_string();
    let content = fs::read_to_string(path)
        .map_err(|e| std::io::Error::new(e.kind(), format!("failed to read {}: {}", file, e)))?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut series = BarSeries::new();

    for (i, result) in rdr.records().enumerate() {
        // Header is line 1; the first data record is line 2.
        let row = i + 2;
        let record = result.map_err(|e| SimError::BarData {
            file: file.clone(),
            row,
            reason: e.to_string(),
        })?;

        let raw_ts = record.get(0).ok_or_else(|| SimError::BarData {
            file: file.clone(),
            row,
            reason: "missing timestamp column".into(),
        })?;
        let at = parse_timestamp(raw_ts).ok_or_else(|| SimError::BarData {
            file: file.clone(),
            row,
            reason: format!("invalid timestamp '{}'", raw_ts),
        })?;

        series.insert(Bar {
            at,
            open: field(&record, 1, "open", &file, row)?,
            high: field(&record, 2, "high", &file, row)?,
            low: field(&record, 3, "low", &file, row)?,
            close: field(&record, 4, "close", &file, row)?,
            volume: field(&record, 5, "volume", &file, row)?,
        });
    }

    Ok(series)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(at);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    file: &str,
    row: usize,
) -> Result<T, SimError>
where
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| SimError::BarData {
        file: file.to_string(),
        row,
        reason: format!("missing {} column", name),
    })?;
    raw.parse().map_err(|e| SimError::BarData {
        file: file.to_string(),
        row,
        reason: format!("invalid {} value: {}", name, e),
    })
}
