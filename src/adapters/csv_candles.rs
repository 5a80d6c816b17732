//! CSV candle loading and trade export.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::PerpbotError;
use crate::domain::position::ClosedTrade;

fn data_err(path: &Path, reason: String) -> PerpbotError {
    PerpbotError::Data {
        source_name: path.display().to_string(),
        reason,
    }
}

fn parse_column<T: std::str::FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<T, PerpbotError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| data_err(path, format!("missing {name} column")))?
        .trim()
        .parse()
        .map_err(|e| data_err(path, format!("invalid {name} value: {e}")))
}

/// Load candles from a `timestamp_ms,open,high,low,close,volume` CSV.
///
/// Rows are sorted by timestamp; duplicate timestamps are rejected since the
/// session treats them as replayed bars.
pub fn load_candles<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>, PerpbotError> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|e| data_err(path, format!("failed to open: {e}")))?;

    let mut candles = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| data_err(path, format!("CSV parse error: {e}")))?;

        let timestamp_ms: i64 = parse_column(&record, 0, "timestamp_ms", path)?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| data_err(path, format!("timestamp out of range: {timestamp_ms}")))?;

        candles.push(Candle {
            timestamp,
            open: parse_column(&record, 1, "open", path)?,
            high: parse_column(&record, 2, "high", path)?,
            low: parse_column(&record, 3, "low", path)?,
            close: parse_column(&record, 4, "close", path)?,
            volume: parse_column(&record, 5, "volume", path)?,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    for pair in candles.windows(2) {
        if pair[0].timestamp == pair[1].timestamp {
            return Err(data_err(
                path,
                format!("duplicate timestamp {}", pair[0].timestamp),
            ));
        }
    }

    Ok(candles)
}

/// Write closed trades to CSV for offline inspection.
pub fn write_trades<P: AsRef<Path>>(path: P, trades: &[ClosedTrade]) -> Result<(), PerpbotError> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| data_err(path, format!("failed to create: {e}")))?;

    wtr.write_record([
        "opened_at",
        "closed_at",
        "side",
        "size",
        "entry_price",
        "exit_price",
        "stop_loss",
        "take_profit",
        "trailing_stop",
        "reason",
        "pnl",
    ])
    .map_err(|e| data_err(path, format!("CSV write error: {e}")))?;

    for trade in trades {
        wtr.write_record([
            trade.opened_at.to_rfc3339(),
            trade.closed_at.to_rfc3339(),
            trade.side.to_string(),
            format!("{:.8}", trade.size),
            format!("{:.8}", trade.entry_price),
            format!("{:.8}", trade.exit_price),
            format!("{:.8}", trade.stop_loss),
            format!("{:.8}", trade.take_profit),
            trade
                .trailing_stop
                .map(|t| format!("{t:.8}"))
                .unwrap_or_default(),
            trade.reason.to_string(),
            format!("{:.8}", trade.pnl),
        ])
        .map_err(|e| data_err(path, format!("CSV write error: {e}")))?;
    }

    wtr.flush()?;
    Ok(())
}
