//! Fund NAV from on-chain balances valued at live prices.

use super::{NavSource, PriceError};
use crate::domain::{Address, AssetBook, Decimal};
use crate::pricing::LivePriceService;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// NAV source backed by `suix_getAllBalances`: every recognized holding,
/// valued at its live spot price, summed in USD.
#[derive(Debug, Clone)]
pub struct SuiNavSource {
    client: Client,
    rpc_url: String,
    assets: AssetBook,
    live: LivePriceService,
}

impl SuiNavSource {
    pub fn new(rpc_url: String, assets: AssetBook, live: LivePriceService) -> Self {
        Self {
            client: Client::new(),
            rpc_url,
            assets,
            live,
        }
    }

    async fn fetch_balances(&self, address: &Address) -> Result<Vec<Value>, PriceError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "suix_getAllBalances",
            "params": [address.as_str()],
        });

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(20)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
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

        body.get("result")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| PriceError::ParseError("no balances in response".to_string()))
    }
}

#[async_trait]
impl NavSource for SuiNavSource {
    async fn fetch_nav(&self, address: &Address) -> Result<Decimal, PriceError> {
        let balances = self.fetch_balances(address).await?;
        let mut total = Decimal::zero();

        for balance in &balances {
            let Some(coin_type) = balance.get("coinType").and_then(Value::as_str) else {
                continue;
            };
            let Some(raw) = balance
                .get("totalBalance")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i128>().ok())
            else {
                continue;
            };

            let symbol = self.assets.symbol_for_coin_type(coin_type);
            let Some(decimals) = self.assets.decimals(&symbol) else {
                debug!(coin_type, "skipping unrecognized holding");
                continue;
            };
            let Some(amount) = Decimal::from_units(raw, decimals) else {
                warn!(coin_type, "balance exceeds representable precision; skipping");
                continue;
            };

            match self.live.spot_usd(&symbol).await {
                Ok(quote) => {
                    total = total + amount * quote.price;
                }
                Err(err) => {
                    warn!(%symbol, error = %err, "holding left out of NAV: no price");
                }
            }
        }

        debug!(address = %address, nav = %total, holdings = balances.len(), "NAV computed");
        Ok(total)
    }
}
