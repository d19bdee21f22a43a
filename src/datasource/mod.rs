//! External data sources: the ledger RPC, the spot price API, and the
//! candle feed used to backfill fund NAV figures.

use crate::domain::{Address, Decimal, Symbol};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

pub mod candles;
pub mod coingecko;
pub mod mock;
pub mod nav;
pub mod sui;

pub use candles::{CandleError, CsvCandleFeed};
pub use coingecko::HttpPriceSource;
pub use mock::{MockLedgerSource, MockNavSource, MockPriceSource};
pub use nav::SuiNavSource;
pub use sui::SuiLedgerSource;

/// One page of raw ledger events plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct EventsPage {
    pub events: Vec<Value>,
    pub next_cursor: Option<Value>,
}

/// Source of raw transfer events from the ledger.
///
/// Implementations handle retry/backoff and rate limiting; callers handle
/// pagination by threading `cursor` through successive calls.
#[async_trait]
pub trait LedgerSource: Send + Sync + fmt::Debug {
    /// Fetch one page of events for `address`, at most `limit` entries,
    /// newest first. `cursor` of `None` starts from the newest event.
    async fn fetch_events_page(
        &self,
        address: &Address,
        cursor: Option<Value>,
        limit: usize,
    ) -> Result<EventsPage, LedgerError>;
}

/// Source of current spot prices in USD.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    async fn fetch_spot_usd(&self, symbol: &Symbol) -> Result<Decimal, PriceError>;
}

/// Source of fund net-asset-value observations.
#[async_trait]
pub trait NavSource: Send + Sync + fmt::Debug {
    /// Current total fund value in USD for `address`.
    async fn fetch_nav(&self, address: &Address) -> Result<Decimal, PriceError>;
}

/// Error type for ledger fetches.
#[derive(Debug, Clone)]
pub enum LedgerError {
    /// Network error (connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error from the RPC endpoint
    HttpError { status: u16, message: String },
    /// JSON-RPC level error returned in the response body
    RpcError { code: i64, message: String },
    /// Response body did not have any recognized shape
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LedgerError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            LedgerError::RpcError { code, message } => {
                write!(f, "RPC error {}: {}", code, message)
            }
            LedgerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LedgerError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Error type for price fetches. `Clone` matters here: one fetch result
/// fans out to every request coalesced onto it.
#[derive(Debug, Clone)]
pub enum PriceError {
    /// Network error (connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error from the price API
    HttpError { status: u16, message: String },
    /// Response parsed but lacked a price for the symbol
    MissingPrice(Symbol),
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// The symbol has no mapping to an API identifier
    UnknownSymbol(Symbol),
}

impl fmt::Display for PriceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PriceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            PriceError::MissingPrice(symbol) => {
                write!(f, "No price in response for {}", symbol)
            }
            PriceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            PriceError::UnknownSymbol(symbol) => {
                write!(f, "No API identifier for symbol {}", symbol)
            }
        }
    }
}

impl std::error::Error for PriceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = LedgerError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = LedgerError::RpcError {
            code: -32602,
            message: "Invalid params".to_string(),
        };
        assert_eq!(err.to_string(), "RPC error -32602: Invalid params");
    }

    #[test]
    fn test_price_error_display() {
        let err = PriceError::MissingPrice(Symbol::new("SUI".to_string()));
        assert_eq!(err.to_string(), "No price in response for SUI");

        let err = PriceError::UnknownSymbol(Symbol::new("XYZ".to_string()));
        assert_eq!(err.to_string(), "No API identifier for symbol XYZ");
    }
}
