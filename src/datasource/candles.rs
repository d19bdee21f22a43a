//! Candle time-series CSV feed.
//!
//! The file has a header row, then one row per sample: an ISO timestamp
//! and a quoted field holding a JSON array of per-coin candles. The JSON
//! is double-escaped: after CSV unquoting, embedded `""` still stands for
//! `"` and needs one more pass.

use crate::domain::{Decimal, Symbol};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Rows allowed to fail parsing before the whole file is rejected.
const MAX_BAD_ROWS: usize = 10;

#[derive(Debug, Error)]
pub enum CandleError {
    #[error("candle file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("candle file csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("more than {MAX_BAD_ROWS} unparseable rows")]
    TooManyBadRows,
    #[error("no candles for coin {0}")]
    MissingCoin(Symbol),
}

/// Reads the latest close per coin out of the candle CSV.
#[derive(Debug, Clone)]
pub struct CsvCandleFeed {
    path: std::path::PathBuf,
}

impl CsvCandleFeed {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Close price of the most recent sample that carries `coin`.
    pub fn latest_close(&self, coin: &Symbol) -> Result<Decimal, CandleError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let mut bad_rows = 0usize;
        let mut latest: Option<(DateTime<Utc>, Decimal)> = None;

        for (row, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    warn!(row, error = %err, "unreadable candle row");
                    bad_rows += 1;
                    if bad_rows > MAX_BAD_ROWS {
                        return Err(CandleError::TooManyBadRows);
                    }
                    continue;
                }
            };

            match parse_row(&record, coin) {
                Ok(Some((timestamp, close))) => {
                    if latest.map(|(t, _)| timestamp > t).unwrap_or(true) {
                        latest = Some((timestamp, close));
                    }
                }
                // Sample parsed fine, just no entry for this coin.
                Ok(None) => {}
                Err(reason) => {
                    warn!(row, reason, "skipping candle row");
                    bad_rows += 1;
                    if bad_rows > MAX_BAD_ROWS {
                        return Err(CandleError::TooManyBadRows);
                    }
                }
            }
        }

        latest
            .map(|(_, close)| close)
            .ok_or_else(|| CandleError::MissingCoin(coin.clone()))
    }
}

/// One CSV record: `timestamp, candles-json`. Returns the close for
/// `coin` if the sample has one, `None` if the sample simply lacks the
/// coin, and a reason string when the row is malformed.
fn parse_row(
    record: &csv::StringRecord,
    coin: &Symbol,
) -> Result<Option<(DateTime<Utc>, Decimal)>, &'static str> {
    let timestamp_raw = record.get(0).ok_or("missing timestamp column")?;
    let json_raw = record.get(1).ok_or("missing candles column")?;

    let timestamp = timestamp_raw
        .trim()
        .parse::<DateTime<Utc>>()
        .map_err(|_| "unparseable timestamp")?;

    // CSV unquoting already halved the quotes once.
    let fixed = json_raw.replace("\"\"", "\"");
    let candles: serde_json::Value =
        serde_json::from_str(&fixed).map_err(|_| "embedded JSON unparseable")?;
    let candles = candles.as_array().ok_or("embedded JSON is not an array")?;

    let Some(entry) = candles
        .iter()
        .find(|item| item.get("coin").and_then(serde_json::Value::as_str) == Some(coin.as_str()))
    else {
        return Ok(None);
    };

    let close_raw = entry.get("close").ok_or("candle missing close")?;
    let close_text = match close_raw {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let close = Decimal::from_str_canonical(close_text.trim()).map_err(|_| "close not numeric")?;
    Ok(Some((timestamp, close)))
}

#[async_trait::async_trait]
impl super::PriceSource for CsvCandleFeed {
    /// File parsing is blocking; keep it off the runtime workers.
    async fn fetch_spot_usd(&self, symbol: &Symbol) -> Result<Decimal, super::PriceError> {
        let feed = self.clone();
        let symbol = symbol.clone();
        tokio::task::spawn_blocking(move || feed.latest_close(&symbol))
            .await
            .map_err(|e| super::PriceError::NetworkError(e.to_string()))?
            .map_err(|e| match e {
                CandleError::MissingCoin(sym) => super::PriceError::MissingPrice(sym),
                other => super::PriceError::ParseError(other.to_string()),
            })
    }
}
