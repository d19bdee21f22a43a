//! GroupedTransaction: all transfer events of one atomic transaction,
//! folded into a per-asset balance-change map.

use crate::domain::{Symbol, TimeMs, TransferEvent, TxId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One logical transaction reconstructed from its constituent transfer
/// events. `balance_changes` accumulates signed amounts only from events
/// emitted by the pairing-relevant venue; other events are kept in
/// `events` but do not affect the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedTransaction {
    pub tx_id: TxId,
    /// Timestamp of the first event seen for this transaction.
    pub time_ms: TimeMs,
    /// Module of the first pairing-venue event, else of the first event.
    pub venue_module: String,
    /// Signed balance change per asset, pairing-venue events only.
    /// Negative quote-asset change means money left the account.
    pub balance_changes: BTreeMap<Symbol, i128>,
    /// All constituent events, pairing-relevant or not.
    pub events: Vec<TransferEvent>,
}

impl GroupedTransaction {
    /// Start a group from its first event.
    pub fn from_first_event(event: TransferEvent, pairing_venue: &str) -> Self {
        let mut group = GroupedTransaction {
            tx_id: event.tx_id.clone(),
            time_ms: event.time_ms,
            venue_module: event.venue_module.clone(),
            balance_changes: BTreeMap::new(),
            events: Vec::new(),
        };
        group.absorb(event, pairing_venue);
        group
    }

    /// Fold one more event into the group.
    pub fn absorb(&mut self, event: TransferEvent, pairing_venue: &str) {
        if event.venue_module == pairing_venue {
            // The first pairing-venue event decides the group's venue tag.
            if self.venue_module != pairing_venue {
                self.venue_module = event.venue_module.clone();
            }
            *self.balance_changes.entry(event.symbol.clone()).or_insert(0) +=
                event.signed_amount();
        }
        self.events.push(event);
    }

    /// Signed balance change for a symbol (0 when untouched).
    pub fn change(&self, symbol: &Symbol) -> i128 {
        self.balance_changes.get(symbol).copied().unwrap_or(0)
    }

    /// Whether this transaction interacted with the pairing venue.
    pub fn is_pairing_venue(&self, pairing_venue: &str) -> bool {
        self.venue_module == pairing_venue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Direction};

    fn make_event(
        tx: &str,
        module: &str,
        symbol: &str,
        amount: i128,
        direction: Direction,
    ) -> TransferEvent {
        TransferEvent {
            tx_id: TxId::new(tx.to_string()),
            time_ms: TimeMs::new(1000),
            venue_module: module.to_string(),
            symbol: Symbol::new(symbol.to_string()),
            amount,
            direction,
            sender: Address::new("0x123".to_string()),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_pairing_events_accumulate_balance_changes() {
        let mut group = GroupedTransaction::from_first_event(
            make_event("0xa", "pool", "USDC", 120_000_000, Direction::Deposit),
            "pool",
        );
        group.absorb(
            make_event("0xa", "pool", "SUI", 40_000_000_000, Direction::Withdraw),
            "pool",
        );

        assert_eq!(group.change(&Symbol::new("USDC".to_string())), -120_000_000);
        assert_eq!(
            group.change(&Symbol::new("SUI".to_string())),
            40_000_000_000
        );
        assert_eq!(group.events.len(), 2);
    }

    #[test]
    fn test_non_pairing_events_kept_but_excluded_from_changes() {
        let mut group = GroupedTransaction::from_first_event(
            make_event("0xa", "transfer", "SUI", 100, Direction::Withdraw),
            "pool",
        );
        group.absorb(
            make_event("0xa", "pool", "USDC", 50, Direction::Deposit),
            "pool",
        );

        // The pairing-venue event retags the group.
        assert_eq!(group.venue_module, "pool");
        assert_eq!(group.change(&Symbol::new("SUI".to_string())), 0);
        assert_eq!(group.change(&Symbol::new("USDC".to_string())), -50);
        assert_eq!(group.events.len(), 2);
    }
}
