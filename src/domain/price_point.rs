//! PricePoint: one calendar day's valuation snapshot.

use crate::domain::{DateKey, Decimal, Symbol, TimeMs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One calendar day's valuation record. At most one exists per date;
/// writers merge partial updates into the stored record rather than
/// replacing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: DateKey,
    /// Asset symbol -> USD price at the day's valuation.
    pub prices: BTreeMap<Symbol, Decimal>,
    /// NAV in USD at the day's valuation.
    pub funds_usd: Decimal,
    /// Fund share units outstanding.
    pub shares_outstanding: Decimal,
    /// Time of the last write to this record.
    pub timestamp_ms: TimeMs,
}

impl PricePoint {
    /// The documented default a merge starts from when no record exists
    /// for the date yet: the stable quote asset at 1 USD, everything else
    /// absent until a writer supplies it.
    pub fn default_for_date(date: DateKey, shares_outstanding: Decimal) -> Self {
        let mut prices = BTreeMap::new();
        prices.insert(Symbol::new("USDC".to_string()), Decimal::one());
        PricePoint {
            date,
            prices,
            funds_usd: Decimal::zero(),
            shares_outstanding,
            timestamp_ms: TimeMs::now(),
        }
    }

    /// USD price of a symbol on this day, if recorded.
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    /// Shallow-merge an update over this record. Fields the update does
    /// not supply are preserved; supplied prices overwrite per symbol.
    pub fn apply(&mut self, update: PricePointUpdate) {
        for (symbol, price) in update.prices {
            self.prices.insert(symbol, price);
        }
        if let Some(funds) = update.funds_usd {
            self.funds_usd = funds;
        }
        if let Some(shares) = update.shares_outstanding {
            self.shares_outstanding = shares;
        }
        self.timestamp_ms = update.timestamp_ms.unwrap_or_else(TimeMs::now);
    }
}

/// Partial price point carried by a merge. Only `date` is mandatory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePointUpdate {
    pub date: Option<DateKey>,
    #[serde(default)]
    pub prices: BTreeMap<Symbol, Decimal>,
    pub funds_usd: Option<Decimal>,
    pub shares_outstanding: Option<Decimal>,
    pub timestamp_ms: Option<TimeMs>,
}

impl PricePointUpdate {
    pub fn for_date(date: DateKey) -> Self {
        PricePointUpdate {
            date: Some(date),
            ..Default::default()
        }
    }

    pub fn with_price(mut self, symbol: Symbol, price: Decimal) -> Self {
        self.prices.insert(symbol, price);
        self
    }

    pub fn with_funds_usd(mut self, funds: Decimal) -> Self {
        self.funds_usd = Some(funds);
        self
    }

    pub fn with_shares_outstanding(mut self, shares: Decimal) -> Self {
        self.shares_outstanding = Some(shares);
        self
    }
}
