//! Domain primitives: TimeMs, Address, TxId, Symbol, DateKey, Direction.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

/// Account address (hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger transaction digest. One TxId groups all transfer events emitted
/// by a single atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: String) -> Self {
        TxId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asset symbol (e.g., "SUI", "USDC", "DEEP").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: String) -> Self {
        Symbol(symbol)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a transfer relative to the venue: Deposit moves the asset
/// out of the account into the venue, Withdraw moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdraw,
}

impl Direction {
    /// Signed multiplier applied to the event amount when accumulating the
    /// account's balance change: Deposit is an outflow (-1), Withdraw an
    /// inflow (+1).
    pub fn sign(&self) -> i128 {
        match self {
            Direction::Deposit => -1,
            Direction::Withdraw => 1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Deposit => write!(f, "deposit"),
            Direction::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Calendar date key in `YYYY-MM-DD` (UTC). Lexicographic order equals
/// chronological order, which the price time series relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateKey(pub String);

impl DateKey {
    /// Parse a `YYYY-MM-DD` string, validating the format.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
            return None;
        }
        let digits_ok = s
            .char_indices()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
        if !digits_ok {
            return None;
        }
        Some(DateKey(s.to_string()))
    }

    /// The UTC calendar day containing the given timestamp.
    pub fn from_time_ms(time: TimeMs) -> Option<Self> {
        let dt = Utc.timestamp_millis_opt(time.as_ms()).single()?;
        Some(DateKey(dt.format("%Y-%m-%d").to_string()))
    }

    /// Today's UTC date.
    pub fn today() -> Self {
        DateKey(Utc::now().format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
