//! CoinGecko simple-price client.

use super::{PriceError, PriceSource};
use crate::domain::{Decimal, Symbol};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

/// Spot price source over the CoinGecko simple-price endpoint.
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
    /// Ticker symbol to API coin identifier.
    ids: BTreeMap<Symbol, String>,
}

impl HttpPriceSource {
    pub fn new(base_url: String) -> Self {
        let mut ids = BTreeMap::new();
        ids.insert(Symbol::new("SUI".to_string()), "sui".to_string());
        ids.insert(Symbol::new("USDC".to_string()), "usd-coin".to_string());
        ids.insert(Symbol::new("DEEP".to_string()), "deep".to_string());
        Self {
            client: Client::new(),
            base_url,
            ids,
        }
    }

    pub fn default_url() -> Self {
        Self::new(DEFAULT_PRICE_API_URL.to_string())
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_spot_usd(&self, symbol: &Symbol) -> Result<Decimal, PriceError> {
        let id = self
            .ids
            .get(symbol)
            .ok_or_else(|| PriceError::UnknownSymbol(symbol.clone()))?;

        let url = format!("{}?ids={}&vs_currencies=usd", self.base_url, id);
        debug!(%symbol, %id, "fetching spot price");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(20)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(PriceError::NetworkError(e.to_string()))
            })?;

            let status = response.status();
            if status == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(PriceError::HttpError {
                    status: status.as_u16(),
                    message: "Upstream error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(PriceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| backoff::Error::permanent(PriceError::ParseError(e.to_string())))
        })
        .await?;

        parse_simple_price(&body, id, symbol)
    }
}

/// Response shape: `{"<id>": {"usd": <number>}}`. Anything else is a
/// missing price, not a hard parse error.
fn parse_simple_price(body: &Value, id: &str, symbol: &Symbol) -> Result<Decimal, PriceError> {
    let usd = body
        .get(id)
        .and_then(|entry| entry.get("usd"))
        .ok_or_else(|| PriceError::MissingPrice(symbol.clone()))?;

    // Go through the textual form so float noise does not leak into the
    // stored decimal.
    Decimal::from_str_canonical(&usd.to_string())
        .map_err(|e| PriceError::ParseError(e.to_string()))
}
