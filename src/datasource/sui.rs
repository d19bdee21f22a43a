//! Sui fullnode JSON-RPC client for ledger events.

use super::{EventsPage, LedgerError, LedgerSource};
use crate::domain::Address;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Ledger source backed by the `suix_queryEvents` JSON-RPC method.
#[derive(Debug, Clone)]
pub struct SuiLedgerSource {
    client: Client,
    rpc_url: String,
}

impl SuiLedgerSource {
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: Client::new(),
            rpc_url,
        }
    }

    async fn post_rpc(&self, payload: Value) -> Result<Value, LedgerError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(LedgerError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(LedgerError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(LedgerError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(LedgerError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            let body = response
                .json::<Value>()
                .await
                .map_err(|e| backoff::Error::permanent(LedgerError::ParseError(e.to_string())))?;

            if let Some(err) = body.get("error") {
                let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                return Err(backoff::Error::permanent(LedgerError::RpcError {
                    code,
                    message,
                }));
            }

            Ok(body)
        })
        .await
    }
}

#[async_trait]
impl LedgerSource for SuiLedgerSource {
    async fn fetch_events_page(
        &self,
        address: &Address,
        cursor: Option<Value>,
        limit: usize,
    ) -> Result<EventsPage, LedgerError> {
        debug!(address = %address, limit, has_cursor = cursor.is_some(), "querying events page");

        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "suix_queryEvents",
            "params": [
                { "Sender": address.as_str() },
                cursor,
                limit,
                // Descending: newest events first.
                true
            ]
        });

        let body = self.post_rpc(payload).await?;
        parse_events_page(&body)
    }
}

/// The node returns `{result: {data, nextCursor, hasNextPage}}`, but some
/// gateways flatten this to a bare array or even a single event object.
/// Accept all three.
fn parse_events_page(body: &Value) -> Result<EventsPage, LedgerError> {
    if let Some(result) = body.get("result") {
        if let Some(data) = result.get("data").and_then(Value::as_array) {
            let has_next = result
                .get("hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let next_cursor = if has_next {
                result.get("nextCursor").filter(|c| !c.is_null()).cloned()
            } else {
                None
            };
            return Ok(EventsPage {
                events: data.clone(),
                next_cursor,
            });
        }
        if let Some(items) = result.as_array() {
            return Ok(EventsPage {
                events: items.clone(),
                next_cursor: None,
            });
        }
        if result.is_object() {
            return Ok(EventsPage {
                events: vec![result.clone()],
                next_cursor: None,
            });
        }
    }
    if let Some(items) = body.as_array() {
        return Ok(EventsPage {
            events: items.clone(),
            next_cursor: None,
        });
    }
    Err(LedgerError::ParseError(
        "no recognized events payload shape".to_string(),
    ))
}
