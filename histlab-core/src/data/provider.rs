//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over raw history sources (Yahoo Finance,
//! test stubs) so the loader can be exercised without network access.
//!
//! Date range convention at this boundary: `start` is inclusive, `end` is
//! exclusive, and bars are always daily.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// One calendar day's raw observation for a symbol.
///
/// `stock_splits` and `capital_gains` are carried so a provider can report
/// them faithfully; processing ignores both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Cash dividend per share ex-dated on this day, 0.0 when none.
    #[serde(default)]
    pub dividends: f64,
    #[serde(default)]
    pub stock_splits: f64,
    #[serde(default)]
    pub capital_gains: f64,
}

impl RawBar {
    /// A bar with no corporate actions.
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            dividends: 0.0,
            stock_splits: 0.0,
            capital_gains: 0.0,
        }
    }

    pub fn with_dividend(mut self, dividends: f64) -> Self {
        self.dividends = dividends;
        self
    }
}

/// Structured error types for history operations.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("unknown symbol: {symbol} (provider returned no data)")]
    UnknownSymbol { symbol: String },

    #[error("malformed series: {0}")]
    MalformedSeries(String),

    #[error("cannot read cache file {}: {reason}", path.display())]
    CacheRead { path: PathBuf, reason: String },

    #[error("cache write failed: {0}")]
    CacheWrite(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("config error: {0}")]
    Config(String),
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    Cache,
    Stub,
}

/// Trait for raw history providers.
///
/// Implementations handle the specifics of fetching from a particular source.
/// The cache layer sits above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbol` over `[start, end)`, ascending by date.
    ///
    /// Returns `UnknownSymbol` when the provider has no data at all.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, HistoryError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait DownloadProgress: Send {
    /// Called when starting to load a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol load completes.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<(), HistoryError>,
    );

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl DownloadProgress for StdoutProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        println!("[{}/{}] Loading {symbol}...", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), HistoryError>,
    ) {
        match result {
            Ok(()) => println!("  OK: {symbol}"),
            Err(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("\nLoad complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// In-memory provider serving canned bars per symbol.
///
/// Symbols without bars fail with `UnknownSymbol`. Counts calls so tests can
/// assert whether the fetch path was taken.
#[derive(Debug, Default)]
pub struct StubProvider {
    bars: std::collections::HashMap<String, Vec<RawBar>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, symbol: &str, bars: Vec<RawBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    /// Number of `fetch` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl DataProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, HistoryError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let bars: Vec<RawBar> = self
            .bars
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|b| b.date >= start && b.date < end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if bars.is_empty() {
            return Err(HistoryError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::Stub,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
