//! Daily valuation merge: fold today's live prices and fund NAV into the
//! stored price point for today's date.

use crate::datasource::NavSource;
use crate::domain::{Address, DateKey, Decimal, PricePoint, PricePointUpdate, Symbol};
use crate::error::AppError;
use crate::pricing::{LivePriceService, PricePointStore};
use futures::future;
use std::sync::Arc;
use tracing::{info, warn};

/// Merges one valuation observation per call into the price point store.
///
/// Price and NAV fetch failures are transient: whatever could be fetched
/// is merged and the stored values cover the rest. Only a missing fund
/// address is fatal, since there is nothing to value without one.
#[derive(Clone)]
pub struct DailyValuationMerger {
    store: Arc<PricePointStore>,
    live: LivePriceService,
    nav_source: Arc<dyn NavSource>,
    fund_address: Option<Address>,
    symbols: Vec<Symbol>,
    default_shares: Decimal,
}

impl DailyValuationMerger {
    pub fn new(
        store: Arc<PricePointStore>,
        live: LivePriceService,
        nav_source: Arc<dyn NavSource>,
        fund_address: Option<Address>,
        symbols: Vec<Symbol>,
        default_shares: Decimal,
    ) -> Self {
        DailyValuationMerger {
            store,
            live,
            nav_source,
            fund_address,
            symbols,
            default_shares,
        }
    }

    /// Run one merge for today. Returns the merged point.
    pub async fn refresh(&self) -> Result<PricePoint, AppError> {
        let address = self
            .fund_address
            .as_ref()
            .ok_or_else(|| AppError::Config("FUND_ADDRESS is not set".to_string()))?;

        let today = DateKey::today();
        let mut update = PricePointUpdate::for_date(today.clone());

        let quotes =
            future::join_all(self.symbols.iter().map(|symbol| self.live.spot_usd(symbol))).await;
        for (symbol, quote) in self.symbols.iter().zip(quotes) {
            match quote {
                Ok(quote) => {
                    update = update.with_price(symbol.clone(), quote.price);
                }
                Err(err) => {
                    warn!(%symbol, error = %err, "live price unavailable; keeping stored value");
                }
            }
        }

        match self.nav_source.fetch_nav(address).await {
            Ok(funds_usd) => {
                update = update.with_funds_usd(funds_usd);
            }
            Err(err) => {
                warn!(error = %err, "NAV unavailable; keeping stored value");
            }
        }

        let merged = self.store.merge(update, self.default_shares).await?;
        info!(date = %today, funds_usd = %merged.funds_usd, "daily valuation merged");
        Ok(merged)
    }
}
