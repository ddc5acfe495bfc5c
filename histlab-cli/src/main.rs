//! HistLab CLI: load, inspect, and report on cached daily history.
//!
//! Commands:
//! - `fetch`: load symbols (cached or fresh) and cache new results as CSV
//! - `show`: print the tail of one symbol's processed series
//! - `cache status`: list cached files per symbol with their date spans

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use histlab_core::data::{
    fetch_symbols, prepare_symbols, read_symbol_list, CacheIndex, CircuitBreaker, StdoutProgress,
    YahooProvider,
};
use histlab_core::{HistoryConfig, HistoryLoader, LoadOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "histlab",
    about = "HistLab CLI: dividend-reinvested daily price history with a file cache"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file). Defaults to ./data.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Fetch range start (YYYY-MM-DD, inclusive).
    #[arg(long)]
    start: Option<String>,

    /// Fetch range end (YYYY-MM-DD, exclusive).
    #[arg(long)]
    end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load history for symbols, fetching and caching what isn't cached.
    Fetch {
        /// Symbols to load (e.g., SPY QQQ BRK.B).
        symbols: Vec<String>,

        /// Delimited file with a header row listing symbols.
        #[arg(long)]
        symbols_file: Option<PathBuf>,

        /// Ignore cached files and re-fetch everything.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Don't write fetched series to the cache.
        #[arg(long, default_value_t = false)]
        no_save: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the last rows of a symbol's processed history.
    Show {
        symbol: String,

        /// Number of trailing rows to print.
        #[arg(long, default_value_t = 10)]
        tail: usize,

        /// Ignore cached files and re-fetch.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached files per symbol with their date spans.
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("histlab=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            symbols,
            symbols_file,
            refresh,
            no_save,
            config,
        } => run_fetch(symbols, symbols_file, refresh, !no_save, &config),
        Commands::Show {
            symbol,
            tail,
            refresh,
            config,
        } => run_show(&symbol, tail, refresh, &config),
        Commands::Cache { action } => match action {
            CacheAction::Status { config } => run_cache_status(&config),
        },
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date '{raw}'"))
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(args: &ConfigArgs) -> Result<HistoryConfig> {
    let mut config = match &args.config {
        Some(path) => HistoryConfig::from_file(path)?,
        None => HistoryConfig::default(),
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_root = dir.clone();
    }
    if let Some(start) = &args.start {
        config.start = parse_date(start)?;
    }
    if let Some(end) = &args.end {
        config.end = parse_date(end)?;
    }
    config.validate()?;
    Ok(config)
}

fn yahoo_loader(config: &HistoryConfig) -> Result<HistoryLoader> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(circuit_breaker)?;
    Ok(HistoryLoader::new(config, Arc::new(provider)))
}

fn run_fetch(
    symbols: Vec<String>,
    symbols_file: Option<PathBuf>,
    refresh: bool,
    save: bool,
    args: &ConfigArgs,
) -> Result<()> {
    let config = resolve_config(args)?;

    let mut raw_symbols = symbols;
    if let Some(path) = &symbols_file {
        let listed = read_symbol_list(path, &config.universe)?;
        println!("{} symbols in {}", listed.len(), path.display());
        raw_symbols.extend(listed);
    }
    if raw_symbols.is_empty() {
        bail!("no symbols given (pass symbols or --symbols-file)");
    }

    let symbols = prepare_symbols(&raw_symbols, &config.universe);
    let loader = yahoo_loader(&config)?;
    let opts = LoadOptions { refresh, save };

    let summary = fetch_symbols(&loader, &symbols, &opts, &StdoutProgress);

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_show(symbol: &str, tail: usize, refresh: bool, args: &ConfigArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let symbol = prepare_symbols(&[symbol], &config.universe)
        .into_iter()
        .next()
        .with_context(|| format!("'{symbol}' is in the configured skip list"))?;

    let loader = yahoo_loader(&config)?;
    let opts = LoadOptions {
        refresh,
        save: true,
    };
    let loaded = loader.load(&symbol, &opts)?;
    let series = &loaded.series;

    println!(
        "=== {} === {} rows, {} .. {} (source: {:?})",
        series.symbol(),
        series.len(),
        series.start(),
        series.end(),
        loaded.source
    );
    if let Some(path) = &loaded.path {
        println!("file: {}", path.display());
    }
    println!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>12} {:>10} {:>10} {:>8}",
        "date", "open", "high", "low", "close", "volume", "hlc3", "adj_hlc3", "shares"
    );
    let skip = series.len().saturating_sub(tail);
    for row in series.rows().iter().skip(skip) {
        println!(
            "{:<10} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12} {:>10.2} {:>10.2} {:>8.4}",
            row.date.to_string(),
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
            row.hlc3,
            row.adj_hlc3,
            row.shares
        );
    }

    let last = series.last();
    println!(
        "latest {}: adj_hlc3 {:.2}, {:.4} shares per original share",
        last.date, last.adj_hlc3, last.shares
    );

    let bad = series.non_finite_rows();
    if !bad.is_empty() {
        eprintln!("WARNING: {} rows have non-finite adjusted values", bad.len());
    }

    Ok(())
}

fn run_cache_status(args: &ConfigArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let summary = CacheIndex::new(&config.cache_root).summary()?;

    if summary.is_empty() {
        println!("Cache at {} is empty.", config.cache_root.display());
        return Ok(());
    }

    let files: usize = summary.values().map(Vec::len).sum();
    println!(
        "Cache: {} ({} symbols, {files} files)",
        config.cache_root.display(),
        summary.len()
    );
    println!();
    println!("{:<10} {:>6} {:>12} {:>12}", "Symbol", "Files", "Start", "Latest End");
    println!("{}", "-".repeat(44));

    for (symbol, entries) in &summary {
        if let Some(latest) = entries.last() {
            println!(
                "{:<10} {:>6} {:>12} {:>12}",
                symbol,
                entries.len(),
                latest.start.to_string(),
                latest.end.to_string()
            );
        }
    }

    Ok(())
}
