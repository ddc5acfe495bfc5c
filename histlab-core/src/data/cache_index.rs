//! Cache index: recovers `(symbol, start, end)` from cache file names.
//!
//! Layout: `{cache_root}/{SYMBOL}_{YYMMDD}-{YYMMDD}.csv`
//!
//! Files are never deleted, so a symbol may have several entries. The latest
//! is the one with the greatest end-date code; old files are harmless because
//! nothing ever selects them. Names that don't match the pattern (including
//! in-flight `.csv.tmp` files) are not part of the cache.

use super::provider::HistoryError;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Compact two-digit-year date code used in file names.
pub const DATE_CODE: &str = "%y%m%d";

/// `%y` reads `69`..`99` as 19xx and `00`..`68` as 20xx, so only dates in
/// these years survive a write/parse round trip.
pub const FIRST_YEAR: i32 = 1969;
pub const LAST_YEAR: i32 = 2068;

/// Extension of committed cache files.
pub const EXTENSION: &str = "csv";

/// Characters allowed in the symbol part of a cache file name.
const SYMBOL_CHARS: &str = "[A-Za-z0-9.^=-]+";

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"^({SYMBOL_CHARS})_([0-9]{{6}})-([0-9]{{6}})\.{EXTENSION}$"
        ))
        .expect("cache name pattern is valid")
    })
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!("^{SYMBOL_CHARS}$")).expect("cache symbol pattern is valid")
    })
}

/// Whether `symbol` can appear in a cache file name.
pub fn is_cacheable_symbol(symbol: &str) -> bool {
    symbol_pattern().is_match(symbol)
}

/// Whether `date` fits the two-digit-year window of [`DATE_CODE`].
pub fn in_date_window(date: NaiveDate) -> bool {
    (FIRST_YEAR..=LAST_YEAR).contains(&date.year())
}

/// One cached file for a symbol over an observed date span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub path: PathBuf,
}

impl CacheEntry {
    /// Canonical file name for a symbol and span.
    pub fn file_name_for(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{symbol}_{}-{}.{EXTENSION}",
            start.format(DATE_CODE),
            end.format(DATE_CODE)
        )
    }

    /// [`Self::file_name_for`], refusing names [`parse_name`] would not
    /// read back as the same `(symbol, start, end)`.
    pub fn checked_file_name(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<String, HistoryError> {
        if !is_cacheable_symbol(symbol) {
            return Err(HistoryError::CacheWrite(format!(
                "symbol {symbol:?} cannot be used in a cache file name"
            )));
        }
        if !in_date_window(start) || !in_date_window(end) {
            return Err(HistoryError::CacheWrite(format!(
                "span {start}..{end} is outside {FIRST_YEAR}-{LAST_YEAR}"
            )));
        }
        Ok(Self::file_name_for(symbol, start, end))
    }

    pub fn file_name(&self) -> String {
        Self::file_name_for(&self.symbol, self.start, self.end)
    }

    /// End date as it appears in the file name; "latest" compares these.
    pub fn end_code(&self) -> String {
        self.end.format(DATE_CODE).to_string()
    }

    /// Ordering where the greatest entry is the latest: end code first, then
    /// the earlier start wins a tie.
    pub fn recency_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.end_code()
            .cmp(&other.end_code())
            .then(other.start.cmp(&self.start))
    }

    /// Whether this entry spans `[start, end]`.
    pub fn covers(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start <= start && self.end >= end
    }
}

/// Parse a bare file name into `(symbol, start, end)`.
///
/// Returns `None` for anything that isn't a committed cache file.
pub fn parse_name(name: &str) -> Option<(String, NaiveDate, NaiveDate)> {
    let caps = name_pattern().captures(name)?;
    let symbol = caps.get(1)?.as_str();
    let start = NaiveDate::parse_from_str(caps.get(2)?.as_str(), DATE_CODE).ok()?;
    let end = NaiveDate::parse_from_str(caps.get(3)?.as_str(), DATE_CODE).ok()?;
    Some((symbol.to_string(), start, end))
}

/// Scans a cache root for entries. Holds no state between calls.
#[derive(Debug, Clone)]
pub struct CacheIndex {
    root: PathBuf,
}

impl CacheIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every parseable entry under the root. A missing root is an empty cache.
    pub fn scan(&self) -> Result<Vec<CacheEntry>, HistoryError> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HistoryError::CacheRead {
                    path: self.root.clone(),
                    reason: format!("read dir: {e}"),
                })
            }
        };

        let mut entries = Vec::new();
        for item in dir {
            let item = item.map_err(|e| HistoryError::CacheRead {
                path: self.root.clone(),
                reason: format!("dir entry: {e}"),
            })?;
            let path = item.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match parse_name(name) {
                Some((symbol, start, end)) => entries.push(CacheEntry {
                    symbol,
                    start,
                    end,
                    path,
                }),
                None => tracing::debug!(file = name, "skipping non-cache file"),
            }
        }
        Ok(entries)
    }

    /// All entries for `symbol` (exact match), latest last.
    pub fn entries(&self, symbol: &str) -> Result<Vec<CacheEntry>, HistoryError> {
        let mut entries: Vec<CacheEntry> = self
            .scan()?
            .into_iter()
            .filter(|e| e.symbol == symbol)
            .collect();
        entries.sort_by(CacheEntry::recency_cmp);
        Ok(entries)
    }

    /// The entry with the greatest end code for `symbol`.
    ///
    /// Ties on the end code go to the earliest start.
    pub fn find_latest(&self, symbol: &str) -> Result<Option<CacheEntry>, HistoryError> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|e| e.symbol == symbol)
            .max_by(CacheEntry::recency_cmp))
    }

    /// Entries grouped by symbol, each group latest last.
    pub fn summary(&self) -> Result<BTreeMap<String, Vec<CacheEntry>>, HistoryError> {
        let mut by_symbol: BTreeMap<String, Vec<CacheEntry>> = BTreeMap::new();
        for entry in self.scan()? {
            by_symbol.entry(entry.symbol.clone()).or_default().push(entry);
        }
        for entries in by_symbol.values_mut() {
            entries.sort_by(CacheEntry::recency_cmp);
        }
        Ok(by_symbol)
    }
}

/// Free-function form of [`CacheIndex::find_latest`].
pub fn find_latest(symbol: &str, cache_root: &Path) -> Result<Option<CacheEntry>, HistoryError> {
    CacheIndex::new(cache_root).find_latest(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "date\n").unwrap();
    }

    #[test]
    fn parses_canonical_name() {
        let (sym, start, end) = parse_name("AAPL_200101-201231.csv").unwrap();
        assert_eq!(sym, "AAPL");
        assert_eq!(start, d(2020, 1, 1));
        assert_eq!(end, d(2020, 12, 31));
    }

    #[test]
    fn parses_class_share_tickers() {
        let (sym, _, _) = parse_name("BRK-B_050103-250313.csv").unwrap();
        assert_eq!(sym, "BRK-B");
        let (sym, _, _) = parse_name("^GSPC_050103-250313.csv").unwrap();
        assert_eq!(sym, "^GSPC");
    }

    #[test]
    fn rejects_non_matching_names() {
        assert!(parse_name("AAPL_200101-201231.csv.tmp").is_none());
        assert!(parse_name("AAPL_20200101-20201231.csv").is_none());
        assert!(parse_name("AAPL_200101-201231.parquet").is_none());
        assert!(parse_name("_200101-201231.csv").is_none());
        assert!(parse_name("notes.txt").is_none());
        // Month 13 is not a date.
        assert!(parse_name("AAPL_201301-201399.csv").is_none());
    }

    #[test]
    fn checked_name_rejects_unparseable_symbols() {
        for bad in ["FOO_BAR", "../ESC", "a/b", "", "SP Y"] {
            let err = CacheEntry::checked_file_name(bad, d(2024, 1, 2), d(2024, 1, 2)).unwrap_err();
            assert!(matches!(err, HistoryError::CacheWrite(_)), "{bad}");
        }
        for good in ["BRK-B", "^GSPC", "EURUSD=X", "BF.B"] {
            let name = CacheEntry::checked_file_name(good, d(2024, 1, 2), d(2024, 1, 2)).unwrap();
            assert_eq!(parse_name(&name).unwrap().0, good);
        }
    }

    #[test]
    fn checked_name_rejects_dates_outside_year_window() {
        assert!(CacheEntry::checked_file_name("IBM", d(1962, 1, 2), d(2024, 1, 2)).is_err());
        assert!(CacheEntry::checked_file_name("IBM", d(2024, 1, 2), d(2069, 1, 2)).is_err());

        let name = CacheEntry::checked_file_name("IBM", d(1969, 1, 2), d(2068, 12, 29)).unwrap();
        let (_, start, end) = parse_name(&name).unwrap();
        assert_eq!((start, end), (d(1969, 1, 2), d(2068, 12, 29)));
    }

    #[test]
    fn file_name_round_trips_through_parser() {
        let name = CacheEntry::file_name_for("SPY", d(2005, 1, 3), d(2025, 3, 13));
        assert_eq!(name, "SPY_050103-250313.csv");
        let (sym, start, end) = parse_name(&name).unwrap();
        assert_eq!((sym.as_str(), start, end), ("SPY", d(2005, 1, 3), d(2025, 3, 13)));
    }

    #[test]
    fn latest_is_greatest_end() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "AAPL_200101-200601.csv");
        touch(dir.path(), "AAPL_200101-201231.csv");

        let latest = find_latest("AAPL", dir.path()).unwrap().unwrap();
        assert_eq!(latest.end, d(2020, 12, 31));
        assert_eq!(latest.file_name(), "AAPL_200101-201231.csv");
    }

    #[test]
    fn tie_on_end_prefers_earliest_start() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "SPY_100104-201231.csv");
        touch(dir.path(), "SPY_050103-201231.csv");

        let latest = find_latest("SPY", dir.path()).unwrap().unwrap();
        assert_eq!(latest.start, d(2005, 1, 3));
    }

    #[test]
    fn symbol_match_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "MSFT_200101-201231.csv");
        touch(dir.path(), "AAPLX_200101-201231.csv");
        touch(dir.path(), "aapl_200101-201231.csv");

        assert!(find_latest("AAPL", dir.path()).unwrap().is_none());
    }

    #[test]
    fn junk_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "AAPL_200101-201231.csv.tmp");
        touch(dir.path(), "README.md");
        fs::create_dir(dir.path().join("AAPL_200101-211231.csv")).unwrap();
        touch(dir.path(), "AAPL_200101-200601.csv");

        let entries = CacheIndex::new(dir.path()).entries("AAPL").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].end, d(2020, 6, 1));
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = CacheIndex::new(dir.path().join("nope"));
        assert!(index.scan().unwrap().is_empty());
        assert!(index.find_latest("SPY").unwrap().is_none());
    }

    #[test]
    fn summary_groups_by_symbol() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "SPY_200101-201231.csv");
        touch(dir.path(), "SPY_200101-200601.csv");
        touch(dir.path(), "QQQ_200101-201231.csv");

        let summary = CacheIndex::new(dir.path()).summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["SPY"].len(), 2);
        assert_eq!(summary["SPY"][1].end, d(2020, 12, 31));
        assert_eq!(
            summary["SPY"].last().map(|e| e.file_name()),
            index_latest(dir.path(), "SPY")
        );
    }

    fn index_latest(root: &Path, symbol: &str) -> Option<String> {
        find_latest(symbol, root).unwrap().map(|e| e.file_name())
    }

    #[test]
    fn coverage_check() {
        let entry = CacheEntry {
            symbol: "SPY".into(),
            start: d(2020, 1, 2),
            end: d(2020, 12, 31),
            path: PathBuf::from("SPY_200102-201231.csv"),
        };
        assert!(entry.covers(d(2020, 3, 1), d(2020, 6, 1)));
        assert!(!entry.covers(d(2019, 3, 1), d(2020, 6, 1)));
    }
}
