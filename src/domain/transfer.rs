//! TransferEvent: one normalized ledger transfer.

use crate::domain::{Address, Direction, Symbol, TimeMs, TxId};
use serde::{Deserialize, Serialize};

/// A single normalized transfer event from the ledger. Immutable once
/// fetched; several events share one `tx_id` when a transaction moves
/// multiple assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Transaction digest this event belongs to.
    pub tx_id: TxId,
    /// Time of the transaction in milliseconds since Unix epoch.
    pub time_ms: TimeMs,
    /// Contract module that emitted the event (e.g. `pool`).
    pub venue_module: String,
    /// Normalized asset symbol.
    pub symbol: Symbol,
    /// Amount magnitude in the asset's smallest unit. Ledger amounts are
    /// unsigned 64-bit decimal strings; i128 holds any signed sum exactly.
    pub amount: i128,
    /// Deposit/withdraw flag from the raw payload.
    pub direction: Direction,
    /// Sender address ("self" when the account sent to itself).
    pub sender: Address,
    /// Raw event payload, kept for the transaction record.
    pub raw: serde_json::Value,
}

impl TransferEvent {
    /// The account's signed balance change from this event, per the
    /// direction convention (deposit = outflow = negative).
    pub fn signed_amount(&self) -> i128 {
        self.direction.sign() * self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(direction: Direction, amount: i128) -> TransferEvent {
        TransferEvent {
            tx_id: TxId::new("0xabc".to_string()),
            time_ms: TimeMs::new(1000),
            venue_module: "pool".to_string(),
            symbol: Symbol::new("USDC".to_string()),
            amount,
            direction,
            sender: Address::new("0x123".to_string()),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_signed_amount_deposit_is_outflow() {
        let event = make_event(Direction::Deposit, 120_000_000);
        assert_eq!(event.signed_amount(), -120_000_000);
    }

    #[test]
    fn test_signed_amount_withdraw_is_inflow() {
        let event = make_event(Direction::Withdraw, 40_000_000_000);
        assert_eq!(event.signed_amount(), 40_000_000_000);
    }
}
