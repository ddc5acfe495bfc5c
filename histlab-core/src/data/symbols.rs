//! Symbol lists: a delimited file with a header row and a ticker column.
//!
//! Tickers are prepared for the provider before any cache lookup, because
//! cache file names use the provider's spelling.

use crate::config::UniverseConfig;
use crate::data::provider::HistoryError;
use std::path::Path;

/// Provider spelling of a ticker: class-share dots become dashes.
pub fn normalize_ticker(symbol: &str) -> String {
    symbol.replace('.', "-")
}

/// Read the configured column from a delimited symbol list.
///
/// Blank cells are dropped; order is preserved.
pub fn read_symbol_list(path: &Path, config: &UniverseConfig) -> Result<Vec<String>, HistoryError> {
    let delimiter = u8::try_from(config.delimiter)
        .map_err(|_| HistoryError::Config(format!("delimiter {:?} is not ASCII", config.delimiter)))?;

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| HistoryError::Config(format!("read symbol list {}: {e}", path.display())))?;

    let headers = rdr
        .headers()
        .map_err(|e| HistoryError::Config(format!("symbol list header: {e}")))?;
    let column = headers
        .iter()
        .position(|h| h.trim() == config.symbol_column)
        .ok_or_else(|| {
            HistoryError::Config(format!(
                "symbol list {} has no '{}' column",
                path.display(),
                config.symbol_column
            ))
        })?;

    let mut symbols = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| HistoryError::Config(format!("symbol list row {}: {e}", i + 1)))?;
        if let Some(sym) = record.get(column).map(str::trim).filter(|s| !s.is_empty()) {
            symbols.push(sym.to_string());
        }
    }
    Ok(symbols)
}

/// Apply the skip list, then optional dot rewriting.
pub fn prepare_symbols<S: AsRef<str>>(symbols: &[S], config: &UniverseConfig) -> Vec<String> {
    symbols
        .iter()
        .map(|s| s.as_ref())
        .filter(|sym| {
            let skipped = config.skip.iter().any(|s| s.as_str() == *sym);
            if skipped {
                tracing::debug!(symbol = *sym, "skipping configured symbol");
            }
            !skipped
        })
        .map(|sym| {
            if config.rewrite_dots {
                normalize_ticker(sym)
            } else {
                sym.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_class_shares() {
        assert_eq!(normalize_ticker("BRK.B"), "BRK-B");
        assert_eq!(normalize_ticker("BF.B"), "BF-B");
        assert_eq!(normalize_ticker("AAPL"), "AAPL");
    }

    #[test]
    fn reads_tsv_symbol_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sp500.tsv");
        std::fs::write(
            &path,
            "Symbol\tSecurity\tSector\nMMM\t3M\tIndustrials\nBRK.B\tBerkshire Hathaway\tFinancials\n\t\t\nAAPL\tApple Inc.\tInformation Technology\n",
        )
        .unwrap();

        let symbols = read_symbol_list(&path, &UniverseConfig::default()).unwrap();
        assert_eq!(symbols, vec!["MMM", "BRK.B", "AAPL"]);
    }

    #[test]
    fn missing_column_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.tsv");
        std::fs::write(&path, "Ticker\nAAPL\n").unwrap();

        let err = read_symbol_list(&path, &UniverseConfig::default()).unwrap_err();
        assert!(err.to_string().contains("no 'Symbol' column"));
    }

    #[test]
    fn custom_delimiter_and_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        std::fs::write(&path, "name,ticker\nApple,AAPL\nMicrosoft,MSFT\n").unwrap();
        let config = UniverseConfig {
            symbol_column: "ticker".into(),
            delimiter: ',',
            ..UniverseConfig::default()
        };

        assert_eq!(read_symbol_list(&path, &config).unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn prepare_skips_then_rewrites() {
        let config = UniverseConfig::default();
        let prepared = prepare_symbols(&["MMM", "CTAS", "BRK.B"], &config);
        assert_eq!(prepared, vec!["MMM", "BRK-B"]);
    }

    #[test]
    fn prepare_without_rewrite_keeps_dots() {
        let config = UniverseConfig {
            skip: vec![],
            rewrite_dots: false,
            ..UniverseConfig::default()
        };
        assert_eq!(prepare_symbols(&["BF.B"], &config), vec!["BF.B"]);
    }
}
