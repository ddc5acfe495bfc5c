//! History loader: the single entry point callers use per symbol.
//!
//! Resolution policy:
//! 1. Unless refreshing, use the latest cached file for the symbol as-is
//! 2. Otherwise fetch raw bars over the configured range, process them, and
//!    (when saving) cache the result under its observed span
//!
//! Provider, processor, and cache errors reach the caller unchanged.

use crate::config::HistoryConfig;
use crate::data::cache_store::{CsvCache, LoadOptions, Loaded};
use crate::data::process::process;
use crate::data::provider::{DataProvider, HistoryError};
use crate::data::series::ProcessedSeries;
use chrono::NaiveDate;
use std::sync::Arc;

pub struct HistoryLoader {
    provider: Arc<dyn DataProvider>,
    cache: CsvCache,
    start: NaiveDate,
    end: NaiveDate,
}

impl HistoryLoader {
    pub fn new(config: &HistoryConfig, provider: Arc<dyn DataProvider>) -> Self {
        Self {
            provider,
            cache: CsvCache::new(config.cache_root.clone()),
            start: config.start,
            end: config.end,
        }
    }

    pub fn provider(&self) -> &dyn DataProvider {
        self.provider.as_ref()
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    /// The range requested from the provider on a fetch, `[start, end)`.
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }

    /// Processed history for `symbol`.
    pub fn get_history(
        &self,
        symbol: &str,
        opts: &LoadOptions,
    ) -> Result<ProcessedSeries, HistoryError> {
        self.load(symbol, opts).map(|loaded| loaded.series)
    }

    /// Like [`get_history`](Self::get_history), also reporting the source and file.
    pub fn load(&self, symbol: &str, opts: &LoadOptions) -> Result<Loaded, HistoryError> {
        self.cache.load(symbol, opts, || {
            let fetched = self.provider.fetch(symbol, self.start, self.end)?;
            let series = process(symbol, &fetched.bars)?;

            let bad = series.non_finite_rows();
            if let Some(first) = bad.first() {
                tracing::warn!(
                    symbol,
                    rows = bad.len(),
                    first = %first,
                    "non-finite adjusted values in processed series"
                );
            }

            Ok((series, fetched.source))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataSource, RawBar, StubProvider};
    use std::fs;
    use std::path::Path;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bars() -> Vec<RawBar> {
        vec![
            RawBar::new(d(2024, 1, 2), 100.0, 102.0, 99.0, 101.0, 1000),
            RawBar::new(d(2024, 1, 3), 101.0, 103.0, 100.0, 102.0, 1100).with_dividend(1.0),
            RawBar::new(d(2024, 1, 4), 102.0, 104.0, 101.0, 103.0, 1200),
        ]
    }

    fn config(root: &Path) -> HistoryConfig {
        HistoryConfig {
            cache_root: root.to_path_buf(),
            start: d(2024, 1, 1),
            end: d(2025, 1, 1),
            ..HistoryConfig::default()
        }
    }

    fn cache_files(root: &Path) -> Vec<String> {
        let Ok(dir) = fs::read_dir(root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = dir
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn first_load_fetches_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubProvider::new().with_symbol("SPY", bars()));
        let loader = HistoryLoader::new(&config(dir.path()), stub.clone());

        let loaded = loader.load("SPY", &LoadOptions::default()).unwrap();

        assert_eq!(stub.calls(), 1);
        assert_eq!(loaded.source, DataSource::Stub);
        assert_eq!(loaded.series.len(), 3);
        assert_eq!(cache_files(dir.path()), vec!["SPY_240102-240104.csv"]);
    }

    #[test]
    fn second_load_reads_cache() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubProvider::new().with_symbol("SPY", bars()));
        let loader = HistoryLoader::new(&config(dir.path()), stub.clone());

        let fresh = loader.get_history("SPY", &LoadOptions::default()).unwrap();
        let cached = loader.load("SPY", &LoadOptions::default()).unwrap();

        assert_eq!(stub.calls(), 1);
        assert_eq!(cached.source, DataSource::Cache);
        assert_eq!(cached.series, fresh);
    }

    #[test]
    fn file_named_by_observed_span_not_requested_range() {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(StubProvider::new().with_symbol("SPY", bars()));
        let cfg = HistoryConfig {
            start: d(2000, 1, 1),
            ..config(dir.path())
        };
        let loader = HistoryLoader::new(&cfg, stub);

        loader.get_history("SPY", &LoadOptions::default()).unwrap();
        assert_eq!(cache_files(dir.path()), vec!["SPY_240102-240104.csv"]);
    }

    #[test]
    fn refresh_refetches_and_adds_a_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SPY_231002-231229.csv"),
            "date,open,high,low,close,volume,hlc3,adj_hlc3,shares\n2023-10-02,1,1,1,1,1,1,1,1\n",
        )
        .unwrap();
        let stub = Arc::new(StubProvider::new().with_symbol("SPY", bars()));
        let loader = HistoryLoader::new(&config(dir.path()), stub.clone());
        let opts = LoadOptions {
            refresh: true,
            save: true,
        };

        let loaded = loader.load("SPY", &opts).unwrap();

        assert_eq!(stub.calls(), 1);
        assert_eq!(loaded.source, DataSource::Stub);
        assert_eq!(
            cache_files(dir.path()),
            vec!["SPY_231002-231229.csv", "SPY_240102-240104.csv"]
        );
    }

    #[test]
    fn other_symbols_files_do_not_match() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("MSFT_240102-240104.csv"),
            "date,open,high,low,close,volume,hlc3,adj_hlc3,shares\n2024-01-02,1,1,1,1,1,1,1,1\n",
        )
        .unwrap();
        let stub = Arc::new(StubProvider::new().with_symbol("AAPL", bars()));
        let loader = HistoryLoader::new(&config(dir.path()), stub.clone());

        let loaded = loader.load("AAPL", &LoadOptions::default()).unwrap();

        assert_eq!(stub.calls(), 1);
        assert_eq!(loaded.source, DataSource::Stub);
    }

    #[test]
    fn unknown_symbol_propagates_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = HistoryLoader::new(&config(dir.path()), Arc::new(StubProvider::new()));

        let err = loader
            .get_history("ZZZZ", &LoadOptions::default())
            .unwrap_err();

        assert!(matches!(err, HistoryError::UnknownSymbol { ref symbol } if symbol == "ZZZZ"));
        assert!(cache_files(dir.path()).is_empty());
    }

    #[test]
    fn malformed_provider_data_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = bars();
        raw[2].date = raw[1].date;
        let loader = HistoryLoader::new(
            &config(dir.path()),
            Arc::new(StubProvider::new().with_symbol("SPY", raw)),
        );

        let err = loader.get_history("SPY", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, HistoryError::MalformedSeries(_)));
        assert!(cache_files(dir.path()).is_empty());
    }
}
