//! HistLab Core: daily price history with dividend-reinvestment adjustment.
//!
//! This crate contains:
//! - The raw history provider contract and a Yahoo Finance implementation
//! - The processor that turns raw bars into a canonical adjusted series
//! - A flat-file CSV cache indexed by `{SYMBOL}_{YYMMDD}-{YYMMDD}.csv` names
//! - The history loader that picks between cached and fresh data

pub mod config;
pub mod data;
pub mod loader;

pub use config::{HistoryConfig, UniverseConfig};
pub use data::{HistoryError, LoadOptions, ProcessedSeries};
pub use loader::HistoryLoader;
