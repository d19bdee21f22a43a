//! Event Normalizer: raw ledger events -> uniform TransferEvents.
//!
//! The raw payloads nest ids and timestamps inconsistently across event
//! shapes; this module digs them out, fixes the asset symbol and amount,
//! and drops (with a warning) anything it cannot make sense of. Dropped
//! events never abort the batch.

use crate::domain::{Address, AssetBook, Direction, Symbol, TimeMs, TransferEvent, TxId};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Normalize a batch of raw ledger events for one account.
pub fn normalize_events(
    raw_events: &[Value],
    account: &Address,
    assets: &AssetBook,
) -> Vec<TransferEvent> {
    let mut transfers = Vec::with_capacity(raw_events.len());
    for raw in raw_events {
        match normalize_one(raw, account, assets) {
            Ok(event) => transfers.push(event),
            Err(reason) => {
                warn!(reason, "dropping malformed ledger event");
            }
        }
    }
    transfers
}

fn normalize_one(
    raw: &Value,
    account: &Address,
    assets: &AssetBook,
) -> Result<TransferEvent, String> {
    let tx_id = extract_tx_id(raw);
    let time_ms = extract_time_ms(raw).ok_or("missing or invalid timestamp")?;

    let venue_module = raw
        .get("transactionModule")
        .and_then(|v| v.as_str())
        .ok_or("missing transactionModule")?
        .to_string();

    let parsed = raw.get("parsedJson").ok_or("missing parsedJson")?;

    let amount_str = parsed
        .get("amount")
        .and_then(|v| v.as_str())
        .ok_or("missing amount")?;
    let amount: i128 = amount_str
        .parse()
        .map_err(|_| format!("unparsable amount: {amount_str}"))?;

    let coin_type = parsed
        .get("asset")
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .ok_or("missing asset name")?;
    let symbol = assets.symbol_for_coin_type(coin_type);

    let direction = extract_direction(raw).ok_or("event type is neither deposit nor withdraw")?;

    // Self-transfers are legitimate in multi-hop transactions; mark rather
    // than drop them.
    let sender = match raw.get("sender").and_then(|v| v.as_str()) {
        Some(s) if s == account.as_str() => Address::new("self".to_string()),
        Some(s) => Address::new(s.to_string()),
        None => Address::new("unknown".to_string()),
    };

    Ok(TransferEvent {
        tx_id,
        time_ms,
        venue_module,
        symbol,
        amount,
        direction,
        sender,
        raw: raw.clone(),
    })
}

/// Transaction id: top-level digest, nested event id, then a stable hash
/// of the payload as the last resort so the event still groups with its
/// exact duplicates.
fn extract_tx_id(raw: &Value) -> TxId {
    if let Some(digest) = raw.get("digest").and_then(|v| v.as_str()) {
        return TxId::new(digest.to_string());
    }
    if let Some(digest) = raw
        .get("id")
        .and_then(|id| id.get("txDigest"))
        .and_then(|v| v.as_str())
    {
        return TxId::new(digest.to_string());
    }

    let mut hasher = Sha256::new();
    hasher.update(raw.to_string().as_bytes());
    let hash = hasher.finalize();
    TxId::new(format!("hash:{}", hex::encode(&hash[..16])))
}

/// Millisecond timestamp: string or number, top-level or nested.
fn extract_time_ms(raw: &Value) -> Option<TimeMs> {
    let candidate = raw
        .get("timestampMs")
        .or_else(|| raw.get("rawEvent").and_then(|e| e.get("timestampMs")))?;
    let ms = match candidate {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Some(TimeMs::new(ms))
}

/// Direction from the event type's trailing name, e.g.
/// `0x2c8d::pool::Deposit<0x..::usdc::USDC>`.
fn extract_direction(raw: &Value) -> Option<Direction> {
    let event_type = raw.get("type").and_then(|v| v.as_str())?;
    let trailing = event_type.rsplit("::").next()?;
    let name = trailing.split('<').next()?.trim();
    if name.eq_ignore_ascii_case("deposit") {
        Some(Direction::Deposit)
    } else if name.eq_ignore_ascii_case("withdraw")
        || name.eq_ignore_ascii_case("withdrawal")
    {
        Some(Direction::Withdraw)
    } else {
        None
    }
}

/// Convenience used by tests and mocks to build a raw event in the shape
/// the fullnode returns.
pub fn raw_event(
    digest: &str,
    time_ms: i64,
    module: &str,
    event_name: &str,
    coin_type: &str,
    amount: i128,
    sender: &str,
) -> Value {
    serde_json::json!({
        "id": { "txDigest": digest, "eventSeq": "0" },
        "digest": digest,
        "timestampMs": time_ms.to_string(),
        "transactionModule": module,
        "sender": sender,
        "type": format!("0x2c8d::{}::{}<{}>", module, event_name, coin_type),
        "parsedJson": {
            "amount": amount.to_string(),
            "asset": { "name": coin_type }
        }
    })
}
