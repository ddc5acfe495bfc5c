//! Batch loader: runs many symbols through the history loader with progress reporting.
//!
//! Symbols are processed one at a time. A failing symbol is recorded and the
//! batch moves on, unless the provider reports itself unavailable, in which
//! case the remaining symbols are marked failed without being attempted.

use super::cache_store::LoadOptions;
use super::provider::{DownloadProgress, HistoryError};
use crate::loader::HistoryLoader;

/// Load every symbol, returning a summary of successes and failures.
pub fn fetch_symbols(
    loader: &HistoryLoader,
    symbols: &[String],
    opts: &LoadOptions,
    progress: &dyn DownloadProgress,
) -> FetchSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, HistoryError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let result = loader.load(symbol, opts).map(|loaded| {
            tracing::debug!(
                symbol = symbol.as_str(),
                source = ?loaded.source,
                rows = loaded.series.len(),
                "loaded"
            );
        });
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                tracing::warn!(symbol = symbol.as_str(), error = %e, "symbol failed");
                errors.push((symbol.clone(), e));
                failed += 1;
            }
        }

        // Bail out early if circuit breaker tripped
        if !loader.provider().is_available() {
            for sym in &symbols[(i + 1)..total] {
                errors.push((sym.clone(), HistoryError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    FetchSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Summary of a batch load.
#[derive(Debug)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, HistoryError)>,
}

impl FetchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
