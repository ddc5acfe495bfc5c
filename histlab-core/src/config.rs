//! Loader configuration: cache root, default date range, universe handling.
//!
//! Read from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! cache_root = "data"
//! start = "2005-01-01"
//! end = "2025-03-14"
//!
//! [universe]
//! symbol_column = "Symbol"
//! delimiter = "\t"
//! skip = ["CTAS"]
//! rewrite_dots = true
//! ```

use crate::data::cache_index::{FIRST_YEAR, LAST_YEAR};
use crate::data::provider::HistoryError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the cache lives and which range a fresh fetch covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub cache_root: PathBuf,
    /// First date requested from the provider (inclusive).
    pub start: NaiveDate,
    /// Provider range end (exclusive).
    pub end: NaiveDate,
    pub universe: UniverseConfig,
}

/// How a symbol list file is read and its tickers prepared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// Header of the column holding tickers.
    pub symbol_column: String,
    /// Field delimiter; must be a single ASCII character.
    pub delimiter: char,
    /// Tickers dropped before loading (matched before rewriting).
    pub skip: Vec<String>,
    /// Rewrite `.` to `-` for class-share tickers (`BRK.B` → `BRK-B`).
    pub rewrite_dots: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from("data"),
            start: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap_or(NaiveDate::MAX),
            universe: UniverseConfig::default(),
        }
    }
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            symbol_column: "Symbol".into(),
            delimiter: '\t',
            skip: vec!["CTAS".into()],
            rewrite_dots: true,
        }
    }
}

impl HistoryConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, HistoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HistoryError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, HistoryError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HistoryError::Config(format!("parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.cache_root.as_os_str().is_empty() {
            return Err(HistoryError::Config("cache_root is empty".into()));
        }
        if self.start >= self.end {
            return Err(HistoryError::Config(format!(
                "start {} must be before end {}",
                self.start, self.end
            )));
        }
        // Cache file names carry two-digit years.
        if self.start.year() < FIRST_YEAR || self.end.year() > LAST_YEAR {
            return Err(HistoryError::Config(format!(
                "range {}..{} must lie within {FIRST_YEAR}-{LAST_YEAR}",
                self.start, self.end
            )));
        }
        if !self.universe.delimiter.is_ascii() {
            return Err(HistoryError::Config(format!(
                "delimiter {:?} is not ASCII",
                self.universe.delimiter
            )));
        }
        Ok(())
    }
}
