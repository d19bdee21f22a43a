//! Mock data sources for testing without network calls.

use super::{EventsPage, LedgerError, LedgerSource, NavSource, PriceError, PriceSource};
use crate::domain::{Address, Decimal, Symbol};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Ledger source serving predefined pages of raw events.
#[derive(Debug, Clone, Default)]
pub struct MockLedgerSource {
    pages: Vec<Vec<Value>>,
}

impl MockLedgerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in one page.
    pub fn with_events(self, events: Vec<Value>) -> Self {
        self.with_page(events)
    }

    /// Append a page; pages are served in order, chained by cursor.
    pub fn with_page(mut self, events: Vec<Value>) -> Self {
        self.pages.push(events);
        self
    }
}

#[async_trait]
impl LedgerSource for MockLedgerSource {
    async fn fetch_events_page(
        &self,
        _address: &Address,
        cursor: Option<Value>,
        _limit: usize,
    ) -> Result<EventsPage, LedgerError> {
        let index = match &cursor {
            None => 0,
            Some(value) => value
                .get("page")
                .and_then(Value::as_u64)
                .ok_or_else(|| LedgerError::ParseError("bad mock cursor".to_string()))?
                as usize,
        };

        let events = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < self.pages.len() {
            Some(json!({ "page": index + 1 }))
        } else {
            None
        };
        Ok(EventsPage {
            events,
            next_cursor,
        })
    }
}

/// Price source over a fixed symbol map, with a call counter so tests can
/// assert coalescing, and optional delay/failure injection.
#[derive(Debug, Default)]
pub struct MockPriceSource {
    prices: Mutex<BTreeMap<Symbol, Decimal>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Every fetch fails until `set_failing(false)`.
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Each fetch sleeps first, widening coalescing windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        if let Ok(mut prices) = self.prices.lock() {
            prices.insert(Symbol::new(symbol.to_string()), price);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Upstream calls observed so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_spot_usd(&self, symbol: &Symbol) -> Result<Decimal, PriceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PriceError::NetworkError("mock failure".to_string()));
        }
        let price = self
            .prices
            .lock()
            .ok()
            .and_then(|prices| prices.get(symbol).copied());
        price.ok_or_else(|| PriceError::MissingPrice(symbol.clone()))
    }
}

/// NAV source returning a fixed figure, or always failing.
#[derive(Debug, Clone)]
pub struct MockNavSource {
    nav: Option<Decimal>,
}

impl MockNavSource {
    pub fn new(nav: Decimal) -> Self {
        Self { nav: Some(nav) }
    }

    pub fn failing() -> Self {
        Self { nav: None }
    }
}

#[async_trait]
impl NavSource for MockNavSource {
    async fn fetch_nav(&self, _address: &Address) -> Result<Decimal, PriceError> {
        self.nav
            .ok_or_else(|| PriceError::NetworkError("mock NAV failure".to_string()))
    }
}
