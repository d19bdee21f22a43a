//! End-to-end reconstruction: fetch a ledger window, normalize, group,
//! pair, and aggregate.

use crate::datasource::{LedgerError, LedgerSource};
use crate::domain::{
    ordering, Address, AssetBook, DateKey, Decimal, PricePointUpdate, TimeMs, Trade, TransferEvent,
};
use crate::engine::pairer::PairingError;
use crate::engine::{self, Market, TradeStats};
use crate::pricing::{LivePriceService, PricePointStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("ledger fetch: {0}")]
    Ledger(#[from] LedgerError),
    #[error("pairing: {0}")]
    Pairing(#[from] PairingError),
    #[error("price store: {0}")]
    Store(#[from] StoreError),
}

/// Result of one reconstruction run.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub trades: Vec<Trade>,
    pub stats: TradeStats,
    pub events_fetched: usize,
}

/// Runs the reconstruction pipeline against injected collaborators.
#[derive(Clone)]
pub struct Reconstructor {
    ledger: Arc<dyn LedgerSource>,
    store: Arc<PricePointStore>,
    live: LivePriceService,
    market: Market,
    assets: AssetBook,
    page_limit: usize,
    page_delay: Duration,
    default_shares: Decimal,
}

impl Reconstructor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        store: Arc<PricePointStore>,
        live: LivePriceService,
        market: Market,
        assets: AssetBook,
        page_limit: usize,
        page_delay: Duration,
        default_shares: Decimal,
    ) -> Self {
        Self {
            ledger,
            store,
            live,
            market,
            assets,
            page_limit,
            page_delay,
            default_shares,
        }
    }

    /// Reconstruct trades for `address` over `[from_ms, to_ms]`.
    pub async fn reconstruct(
        &self,
        address: &Address,
        from_ms: TimeMs,
        to_ms: TimeMs,
    ) -> Result<Reconstruction, ReconstructError> {
        let events = self.fetch_events_window(address, from_ms, to_ms).await?;
        let events_fetched = events.len();
        info!(address = %address, events = events_fetched, "ledger window fetched");

        let mut groups = engine::group_by_transaction(events, &self.market.pool_module);

        // Make sure the fee asset has a price for today before the
        // synchronous pairing snapshot is taken. Best effort.
        self.refresh_fee_price().await;
        let book = self.store.snapshot().await;

        ordering::sort_newest_first(&mut groups);

        let trades = engine::pair_trades(groups, &self.market, &self.assets, &book)?;
        let stats = engine::compute_stats(&trades);
        info!(
            trades = trades.len(),
            closed = stats.closed_trades,
            "reconstruction complete"
        );

        Ok(Reconstruction {
            trades,
            stats,
            events_fetched,
        })
    }

    /// Page through the ledger newest-first until the cursor runs out or
    /// the pages move past the window's start. Events outside the window
    /// are dropped; the inter-page delay respects upstream rate limits.
    async fn fetch_events_window(
        &self,
        address: &Address,
        from_ms: TimeMs,
        to_ms: TimeMs,
    ) -> Result<Vec<TransferEvent>, ReconstructError> {
        let mut collected = Vec::new();
        let mut cursor = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .ledger
                .fetch_events_page(address, cursor, self.page_limit)
                .await?;
            pages += 1;

            let normalized = engine::normalize_events(&page.events, address, &self.assets);
            let oldest_in_page = normalized.iter().map(|e| e.time_ms).min();

            collected.extend(
                normalized
                    .into_iter()
                    .filter(|e| e.time_ms >= from_ms && e.time_ms <= to_ms),
            );

            let past_window = oldest_in_page.map(|t| t < from_ms).unwrap_or(false);
            cursor = page.next_cursor;
            if cursor.is_none() || past_window {
                debug!(pages, events = collected.len(), "pagination finished");
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(collected)
    }

    async fn refresh_fee_price(&self) {
        let today = DateKey::today();
        match self.live.spot_usd(&self.market.fee).await {
            Ok(quote) => {
                let update = PricePointUpdate::for_date(today)
                    .with_price(self.market.fee.clone(), quote.price);
                if let Err(err) = self.store.merge(update, self.default_shares).await {
                    warn!(error = %err, "could not persist fee price for today");
                }
            }
            Err(err) => {
                warn!(fee = %self.market.fee, error = %err,
                    "fee price unavailable; fees may be valued from an older point");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{MockLedgerSource, MockPriceSource};
    use crate::domain::{Decimal, Symbol};
    use crate::engine::normalizer::raw_event;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s.to_string())
    }

    fn market() -> Market {
        Market::new("pool".to_string(), sym("USDC"), sym("SUI"), sym("DEEP"))
    }

    fn sui_type() -> &'static str {
        "0x2::sui::SUI"
    }

    fn usdc_type() -> &'static str {
        "0xa1::usdc::USDC"
    }

    #[tokio::test]
    async fn test_round_trip_across_pages() {
        let account = "0xfund";
        let pages = MockLedgerSource::new()
            .with_page(vec![
                raw_event("0xnew", 2000, "pool", "Deposit", usdc_type(), 120_000_000, account),
                raw_event("0xnew", 2000, "pool", "Withdraw", sui_type(), 40_000_000_000, account),
            ])
            .with_page(vec![
                raw_event("0xold", 1000, "pool", "Withdraw", usdc_type(), 150_000_000, account),
                raw_event("0xold", 1000, "pool", "Deposit", sui_type(), 40_000_000_000, account),
            ]);

        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            PricePointStore::open(dir.path().join("prices.json"))
                .await
                .unwrap(),
        );
        let live = LivePriceService::new(
            Arc::new(MockPriceSource::new().with_price("DEEP", dec("0.2"))),
            sym("USDC"),
        );
        let reconstructor = Reconstructor::new(
            Arc::new(pages),
            store,
            live,
            market(),
            AssetBook::mainnet(),
            50,
            Duration::from_millis(0),
            dec("998942"),
        );

        let result = reconstructor
            .reconstruct(
                &Address::new(account.to_string()),
                TimeMs::new(0),
                TimeMs::new(10_000),
            )
            .await
            .unwrap();

        assert_eq!(result.events_fetched, 4);
        assert_eq!(result.trades.len(), 1);
        assert!(result.trades[0].is_closed());
        assert_eq!(result.stats.closed_trades, 1);
    }

    #[tokio::test]
    async fn test_window_filter_drops_outside_events() {
        let account = "0xfund";
        let pages = MockLedgerSource::new().with_page(vec![
            raw_event("0xin", 5000, "pool", "Deposit", usdc_type(), 120_000_000, account),
            raw_event("0xin", 5000, "pool", "Withdraw", sui_type(), 40_000_000_000, account),
            raw_event("0xtoo_old", 100, "pool", "Withdraw", usdc_type(), 1, account),
        ]);

        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            PricePointStore::open(dir.path().join("prices.json"))
                .await
                .unwrap(),
        );
        let live = LivePriceService::new(Arc::new(MockPriceSource::new()), sym("USDC"));
        let reconstructor = Reconstructor::new(
            Arc::new(pages),
            store,
            live,
            market(),
            AssetBook::mainnet(),
            50,
            Duration::from_millis(0),
            dec("998942"),
        );

        let result = reconstructor
            .reconstruct(
                &Address::new(account.to_string()),
                TimeMs::new(1000),
                TimeMs::new(10_000),
            )
            .await
            .unwrap();

        assert_eq!(result.events_fetched, 2);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].status, crate::domain::TradeStatus::Open);
    }
}
