//! Flat-file CSV cache, one file per symbol and observed date span.
//!
//! Features:
//! - Atomic writes (write to `.csv.tmp`, rename into place)
//! - Additive: a write never deletes other files for the symbol
//! - Strict reads: a matched file that doesn't parse is an error, never a
//!   silent refetch
//! - Exact round-trip of every value (shortest round-trip float formatting)

use super::cache_index::{CacheEntry, CacheIndex};
use super::provider::{DataSource, HistoryError};
use super::series::{ProcessedRow, ProcessedSeries, COLUMNS};
use std::fs;
use std::path::{Path, PathBuf};

/// Options controlling how a symbol's history is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Ignore cached files and fetch fresh data.
    pub refresh: bool,
    /// Persist freshly fetched data.
    pub save: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            refresh: false,
            save: true,
        }
    }
}

/// Which path `load` takes for a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    /// Read this existing file as-is.
    Cached(CacheEntry),
    /// Go to the provider.
    Fetch,
}

/// A series plus where it came from.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub series: ProcessedSeries,
    pub source: DataSource,
    /// File read from or written to; `None` when fetched without saving.
    pub path: Option<PathBuf>,
}

/// The CSV cache.
#[derive(Debug, Clone)]
pub struct CsvCache {
    index: CacheIndex,
}

impl CsvCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            index: CacheIndex::new(cache_root),
        }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        self.index.root()
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    /// Choose between the cached and fetch paths.
    pub fn decide(&self, symbol: &str, refresh: bool) -> Result<CacheDecision, HistoryError> {
        if refresh {
            return Ok(CacheDecision::Fetch);
        }
        Ok(match self.index.find_latest(symbol)? {
            Some(entry) => CacheDecision::Cached(entry),
            None => CacheDecision::Fetch,
        })
    }

    /// Get a symbol's series from the cache or via `fetch`.
    ///
    /// `fetch` runs only on the fetch path and its errors are returned
    /// unchanged. With `opts.save`, the fetched series is written under a name
    /// built from its own first and last dates.
    pub fn load<F>(
        &self,
        symbol: &str,
        opts: &LoadOptions,
        fetch: F,
    ) -> Result<Loaded, HistoryError>
    where
        F: FnOnce() -> Result<(ProcessedSeries, DataSource), HistoryError>,
    {
        match self.decide(symbol, opts.refresh)? {
            CacheDecision::Cached(entry) => {
                tracing::debug!(symbol, file = %entry.path.display(), "cache hit");
                let series = self.read(&entry)?;
                Ok(Loaded {
                    series,
                    source: DataSource::Cache,
                    path: Some(entry.path),
                })
            }
            CacheDecision::Fetch => {
                tracing::debug!(symbol, refresh = opts.refresh, "fetching");
                let (series, source) = fetch()?;
                let path = if opts.save {
                    Some(self.write(&series)?.path)
                } else {
                    None
                };
                Ok(Loaded {
                    series,
                    source,
                    path,
                })
            }
        }
    }

    /// Read a cache file into a series for the entry's symbol.
    pub fn read(&self, entry: &CacheEntry) -> Result<ProcessedSeries, HistoryError> {
        read_csv(&entry.symbol, &entry.path)
    }

    /// Write a series as `{symbol}_{start}-{end}.csv`.
    ///
    /// A file with the same name is replaced atomically; any other file is
    /// left untouched. Symbols or spans the index could not read back are
    /// refused before anything touches the disk.
    pub fn write(&self, series: &ProcessedSeries) -> Result<CacheEntry, HistoryError> {
        let name = CacheEntry::checked_file_name(series.symbol(), series.start(), series.end())?;

        fs::create_dir_all(self.root())
            .map_err(|e| HistoryError::CacheWrite(format!("failed to create dir: {e}")))?;

        let path = self.root().join(&name);
        let tmp_path = self.root().join(format!("{name}.tmp"));

        if let Err(e) = write_csv(series, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            HistoryError::CacheWrite(format!("atomic rename failed: {e}"))
        })?;

        tracing::info!(
            symbol = series.symbol(),
            rows = series.len(),
            file = %path.display(),
            "cached series"
        );

        Ok(CacheEntry {
            symbol: series.symbol().to_string(),
            start: series.start(),
            end: series.end(),
            path,
        })
    }
}

// ── CSV I/O helpers ─────────────────────────────────────────────────

fn write_err(path: &Path, e: impl std::fmt::Display) -> HistoryError {
    HistoryError::CacheWrite(format!("{}: {e}", path.display()))
}

fn write_csv(series: &ProcessedSeries, path: &Path) -> Result<(), HistoryError> {
    let file = fs::File::create(path).map_err(|e| write_err(path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    for row in series.rows() {
        wtr.serialize(row).map_err(|e| write_err(path, e))?;
    }
    let file = wtr.into_inner().map_err(|e| write_err(path, e))?;
    file.sync_all().map_err(|e| write_err(path, e))?;
    Ok(())
}

fn read_csv(symbol: &str, path: &Path) -> Result<ProcessedSeries, HistoryError> {
    let read_err = |reason: String| HistoryError::CacheRead {
        path: path.to_path_buf(),
        reason,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(|e| read_err(format!("open: {e}")))?;

    let headers = rdr
        .headers()
        .map_err(|e| read_err(format!("header: {e}")))?
        .clone();
    if headers.iter().ne(COLUMNS.iter().copied()) {
        return Err(read_err(format!(
            "unexpected columns {:?}, expected {:?}",
            headers.iter().collect::<Vec<_>>(),
            COLUMNS
        )));
    }

    let rows = rdr
        .deserialize::<ProcessedRow>()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| read_err(format!("row {}: {e}", i + 1))))
        .collect::<Result<Vec<_>, _>>()?;

    ProcessedSeries::new(symbol, rows).ok_or_else(|| read_err("no rows".into()))
}
