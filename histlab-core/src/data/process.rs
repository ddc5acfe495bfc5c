//! Raw bars → canonical dividend-reinvested series.
//!
//! The adjustment simulates reinvesting each cash dividend into fractional
//! shares at the same day's `hlc3`. The multiplier is updated with the
//! current row's price *before* that row's adjusted value is emitted, so the
//! ex-dividend day already carries the extra shares.

use super::provider::{HistoryError, RawBar};
use super::series::{ProcessedRow, ProcessedSeries};

/// Reference price used for adjustment: `(open + high + close) / 3`.
pub fn hlc3(bar: &RawBar) -> f64 {
    (bar.open + bar.high + bar.close) / 3.0
}

/// Transform raw daily bars into the canonical series for `symbol`.
///
/// Splits and capital gains on the input are ignored. Fails with
/// `MalformedSeries` on empty input, non-increasing dates, or a negative or
/// non-finite dividend. A non-positive `hlc3` is not rejected; it yields
/// non-finite adjusted values that callers can detect with
/// [`ProcessedSeries::non_finite_rows`].
pub fn process(symbol: &str, raw: &[RawBar]) -> Result<ProcessedSeries, HistoryError> {
    validate(raw)?;

    let rows: Vec<ProcessedRow> = raw
        .iter()
        .scan(1.0_f64, |shares, bar| {
            let hlc3 = hlc3(bar);
            if bar.dividends > 0.0 {
                *shares += *shares * bar.dividends / hlc3;
            }
            Some(ProcessedRow {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                hlc3,
                adj_hlc3: *shares * hlc3,
                shares: *shares,
            })
        })
        .collect();

    ProcessedSeries::new(symbol, rows)
        .ok_or_else(|| HistoryError::MalformedSeries(format!("{symbol}: no rows")))
}

/// Reject input the scan cannot give a meaning to.
fn validate(raw: &[RawBar]) -> Result<(), HistoryError> {
    if raw.is_empty() {
        return Err(HistoryError::MalformedSeries("empty input".into()));
    }

    for (i, pair) in raw.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.date == prev.date {
            return Err(HistoryError::MalformedSeries(format!(
                "duplicate date {} at row {}",
                cur.date,
                i + 1
            )));
        }
        if cur.date < prev.date {
            return Err(HistoryError::MalformedSeries(format!(
                "date {} at row {} precedes {}",
                cur.date,
                i + 1,
                prev.date
            )));
        }
    }

    if let Some((i, bar)) = raw
        .iter()
        .enumerate()
        .find(|(_, b)| !b.dividends.is_finite() || b.dividends < 0.0)
    {
        return Err(HistoryError::MalformedSeries(format!(
            "invalid dividend {} on {} (row {i})",
            bar.dividends, bar.date
        )));
    }

    Ok(())
}
