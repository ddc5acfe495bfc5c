//! Canonical processed series: the rows persisted to and read from the cache.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column order of the canonical schema. `date` is the row key.
pub const COLUMNS: [&str; 9] = [
    "date", "open", "high", "low", "close", "volume", "hlc3", "adj_hlc3", "shares",
];

/// One row of the canonical output series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub hlc3: f64,
    /// Dividend-reinvested price: `shares * hlc3`.
    pub adj_hlc3: f64,
    /// Cumulative reinvestment multiplier, starts at 1.0 and never decreases.
    pub shares: f64,
}

/// Ordered rows for one symbol. Never empty; dates strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSeries {
    symbol: String,
    rows: Vec<ProcessedRow>,
}

impl ProcessedSeries {
    /// Build a series from rows already known to be non-empty and ordered.
    ///
    /// Returns `None` for empty input; ordering is the caller's contract
    /// (the processor validates it, the cache reader trusts the file).
    pub fn new(symbol: impl Into<String>, rows: Vec<ProcessedRow>) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            rows,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn rows(&self) -> &[ProcessedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First observed date.
    pub fn start(&self) -> NaiveDate {
        self.rows[0].date
    }

    /// Last observed date.
    pub fn end(&self) -> NaiveDate {
        self.last().date
    }

    pub fn last(&self) -> &ProcessedRow {
        &self.rows[self.rows.len() - 1]
    }

    /// Dates of rows whose adjusted price is NaN or infinite.
    pub fn non_finite_rows(&self) -> Vec<NaiveDate> {
        self.rows
            .iter()
            .filter(|r| !r.adj_hlc3.is_finite() || !r.shares.is_finite())
            .map(|r| r.date)
            .collect()
    }

}

/// `%Y-%m-%d` for the date column.
pub(crate) mod date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, adj: f64) -> ProcessedRow {
        ProcessedRow {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0,
            hlc3: 1.0,
            adj_hlc3: adj,
            shares: 1.0,
        }
    }

    #[test]
    fn empty_rows_are_not_a_series() {
        assert!(ProcessedSeries::new("SPY", vec![]).is_none());
    }

    #[test]
    fn bounds_come_from_rows() {
        let s = ProcessedSeries::new("SPY", vec![row(2, 1.0), row(3, 1.0), row(5, 1.0)]).unwrap();
        assert_eq!(s.start(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(s.end(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.last().date, s.end());
    }

    #[test]
    fn non_finite_rows_flags_nan_and_inf() {
        let s = ProcessedSeries::new(
            "SPY",
            vec![row(2, 1.0), row(3, f64::NAN), row(4, f64::INFINITY)],
        )
        .unwrap();
        assert_eq!(s.non_finite_rows().len(), 2);
    }
}
