//! Live spot prices with a stale-while-revalidate cache.
//!
//! Per symbol, a quote younger than [`FRESH_WINDOW`] is served as-is. A
//! quote older than that but younger than [`STALE_WINDOW`] is served
//! immediately, marked stale, while a background refresh runs. Older than
//! [`STALE_WINDOW`], the caller waits for a fresh fetch. Concurrent
//! callers never trigger concurrent fetches for the same symbol: the
//! first one fetches and the rest subscribe to its result.

use crate::datasource::{PriceError, PriceSource};
use crate::domain::{Decimal, Symbol, TimeMs};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Age under which a cached quote is authoritative.
pub const FRESH_WINDOW: Duration = Duration::from_secs(10);
/// Age beyond which a cached quote is too old to serve at all.
pub const STALE_WINDOW: Duration = Duration::from_secs(30 * 60);
/// Minimum spacing between upstream fetches for one symbol.
pub const MIN_FETCH_INTERVAL: Duration = Duration::from_secs(10);

/// A spot price and its provenance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub price: Decimal,
    pub fetched_at: TimeMs,
    /// True when the quote was served past its fresh window while a
    /// refresh ran in the background.
    pub stale: bool,
}

#[derive(Debug)]
struct SymbolEntry {
    cached: Option<(Decimal, TimeMs)>,
    last_fetch_started: Option<TimeMs>,
    /// Present while a fetch is in flight; late callers subscribe.
    in_flight: Option<broadcast::Sender<Result<(Decimal, TimeMs), PriceError>>>,
}

impl SymbolEntry {
    fn new() -> Self {
        SymbolEntry {
            cached: None,
            last_fetch_started: None,
            in_flight: None,
        }
    }
}

/// Shared live price cache over any [`PriceSource`].
#[derive(Debug, Clone)]
pub struct LivePriceService {
    source: Arc<dyn PriceSource>,
    entries: Arc<Mutex<HashMap<Symbol, SymbolEntry>>>,
    quote_asset: Symbol,
}

impl LivePriceService {
    /// `quote_asset` is the USD-stable asset whose price is pegged to 1
    /// and never fetched.
    pub fn new(source: Arc<dyn PriceSource>, quote_asset: Symbol) -> Self {
        LivePriceService {
            source,
            entries: Arc::new(Mutex::new(HashMap::new())),
            quote_asset,
        }
    }

    /// Current USD price for `symbol` per the stale-while-revalidate
    /// policy described on the module.
    pub async fn spot_usd(&self, symbol: &Symbol) -> Result<PriceQuote, PriceError> {
        if *symbol == self.quote_asset {
            return Ok(PriceQuote {
                price: Decimal::one(),
                fetched_at: TimeMs::now(),
                stale: false,
            });
        }

        let now = TimeMs::now();
        let decision = {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .entry(symbol.clone())
                .or_insert_with(SymbolEntry::new);
            self.decide(entry, now)
        };

        match decision {
            Decision::Serve {
                price,
                fetched_at,
                stale,
                refresh,
            } => {
                if refresh {
                    self.spawn_background_refresh(symbol.clone());
                }
                Ok(PriceQuote { price, fetched_at, stale })
            }
            Decision::Await(mut rx) => {
                let result = match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => Err(PriceError::NetworkError(
                        "price fetch task dropped".to_string(),
                    )),
                };
                self.resolve_fetched(symbol, result).await
            }
            Decision::Fetch(tx) => {
                let result = self.fetch_and_store(symbol, now).await;
                let _ = tx.send(result.clone());
                self.resolve_fetched(symbol, result).await
            }
        }
    }

    /// What to do for one caller, given the entry's state. Must be called
    /// with the entries lock held; registers the in-flight sender when it
    /// elects the caller to fetch.
    fn decide(&self, entry: &mut SymbolEntry, now: TimeMs) -> Decision {
        if let Some((price, fetched_at)) = entry.cached {
            let age = age_of(fetched_at, now);
            if age <= FRESH_WINDOW {
                return Decision::Serve {
                    price,
                    fetched_at,
                    stale: false,
                    refresh: false,
                };
            }
            if age <= STALE_WINDOW {
                // Serve stale; refresh only if nobody else is and the
                // upstream spacing allows it.
                let refresh = entry.in_flight.is_none()
                    && entry
                        .last_fetch_started
                        .map(|t| age_of(t, now) >= MIN_FETCH_INTERVAL)
                        .unwrap_or(true);
                if refresh {
                    entry.last_fetch_started = Some(now);
                }
                return Decision::Serve {
                    price,
                    fetched_at,
                    stale: true,
                    refresh,
                };
            }
        }

        // No cache worth serving. Join an in-flight fetch or become it.
        if let Some(tx) = &entry.in_flight {
            return Decision::Await(tx.subscribe());
        }
        let (tx, _) = broadcast::channel(1);
        entry.in_flight = Some(tx.clone());
        entry.last_fetch_started = Some(now);
        Decision::Fetch(tx)
    }

    /// A successful fetch is fresh by definition. A failed fetch falls
    /// back to whatever is cached, however old, marked stale; only a
    /// cacheless failure surfaces the error.
    async fn resolve_fetched(
        &self,
        symbol: &Symbol,
        result: Result<(Decimal, TimeMs), PriceError>,
    ) -> Result<PriceQuote, PriceError> {
        match result {
            Ok((price, fetched_at)) => Ok(PriceQuote {
                price,
                fetched_at,
                stale: false,
            }),
            Err(err) => {
                let entries = self.entries.lock().await;
                if let Some((price, fetched_at)) =
                    entries.get(symbol).and_then(|entry| entry.cached)
                {
                    warn!(%symbol, error = %err, "serving cached price after fetch failure");
                    return Ok(PriceQuote {
                        price,
                        fetched_at,
                        stale: true,
                    });
                }
                Err(err)
            }
        }
    }

    async fn fetch_and_store(
        &self,
        symbol: &Symbol,
        started: TimeMs,
    ) -> Result<(Decimal, TimeMs), PriceError> {
        let result = self.source.fetch_spot_usd(symbol).await;
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(symbol.clone())
            .or_insert_with(SymbolEntry::new);
        entry.in_flight = None;
        match result {
            Ok(price) => {
                let fetched_at = TimeMs::now();
                entry.cached = Some((price, fetched_at));
                debug!(%symbol, %price, "spot price refreshed");
                Ok((price, fetched_at))
            }
            Err(err) => {
                // Keep any stale cache; the next caller may retry sooner.
                entry.last_fetch_started = Some(started);
                warn!(%symbol, error = %err, "spot price fetch failed");
                Err(err)
            }
        }
    }

    /// Backdate a cache entry so tests can exercise the stale windows
    /// without waiting them out.
    #[cfg(test)]
    async fn seed_cache(&self, symbol: Symbol, price: Decimal, fetched_at: TimeMs) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(symbol).or_insert_with(SymbolEntry::new);
        entry.cached = Some((price, fetched_at));
    }

    /// Fire-and-forget refresh behind a stale response.
    fn spawn_background_refresh(&self, symbol: Symbol) {
        let service = self.clone();
        tokio::spawn(async move {
            let started = TimeMs::now();
            {
                let mut entries = service.entries.lock().await;
                let entry = entries
                    .entry(symbol.clone())
                    .or_insert_with(SymbolEntry::new);
                if entry.in_flight.is_some() {
                    return;
                }
                let (tx, _) = broadcast::channel(1);
                entry.in_flight = Some(tx);
            }
            let _ = service.fetch_and_store(&symbol, started).await;
        });
    }
}

enum Decision {
    Serve {
        price: Decimal,
        fetched_at: TimeMs,
        stale: bool,
        refresh: bool,
    },
    Await(broadcast::Receiver<Result<(Decimal, TimeMs), PriceError>>),
    Fetch(broadcast::Sender<Result<(Decimal, TimeMs), PriceError>>),
}

fn age_of(then: TimeMs, now: TimeMs) -> Duration {
    Duration::from_millis((now.as_ms() - then.as_ms()).max(0) as u64)
}
