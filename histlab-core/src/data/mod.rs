//! Raw history retrieval, processing, and the per-symbol file cache

pub mod cache_index;
pub mod cache_store;
pub mod circuit_breaker;
pub mod download;
pub mod process;
pub mod provider;
pub mod series;
pub mod symbols;
pub mod yahoo;

pub use cache_index::{find_latest, CacheEntry, CacheIndex};
pub use cache_store::{CacheDecision, CsvCache, LoadOptions, Loaded};
pub use circuit_breaker::CircuitBreaker;
pub use download::{fetch_symbols, FetchSummary};
pub use process::process;
pub use provider::{
    DataProvider, DataSource, DownloadProgress, FetchResult, HistoryError, RawBar,
    StdoutProgress, StubProvider,
};
pub use series::{ProcessedRow, ProcessedSeries};
pub use symbols::{normalize_ticker, prepare_symbols, read_symbol_list};
pub use yahoo::YahooProvider;
