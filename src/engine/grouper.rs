//! Transaction Grouper: fold transfer events into one aggregate per
//! transaction id.

use crate::domain::{GroupedTransaction, TransferEvent, TxId};
use std::collections::BTreeMap;

/// Group events by transaction id, accumulating pairing-venue balance
/// changes. Input order is irrelevant; output order is not significant
/// either (the pairer imposes the order it needs).
pub fn group_by_transaction(
    events: Vec<TransferEvent>,
    pairing_venue: &str,
) -> Vec<GroupedTransaction> {
    let mut groups: BTreeMap<TxId, GroupedTransaction> = BTreeMap::new();

    for event in events {
        match groups.get_mut(&event.tx_id) {
            Some(group) => group.absorb(event, pairing_venue),
            None => {
                let tx_id = event.tx_id.clone();
                groups.insert(
                    tx_id,
                    GroupedTransaction::from_first_event(event, pairing_venue),
                );
            }
        }
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Direction, Symbol, TimeMs};
    use std::collections::BTreeSet;

    fn make_event(
        tx: &str,
        time_ms: i64,
        module: &str,
        symbol: &str,
        amount: i128,
        direction: Direction,
    ) -> TransferEvent {
        TransferEvent {
            tx_id: TxId::new(tx.to_string()),
            time_ms: TimeMs::new(time_ms),
            venue_module: module.to_string(),
            symbol: Symbol::new(symbol.to_string()),
            amount,
            direction,
            sender: Address::new("0x123".to_string()),
            raw: serde_json::json!({ "tx": tx, "symbol": symbol, "amount": amount.to_string() }),
        }
    }

    #[test]
    fn test_one_group_per_transaction_id() {
        let events = vec![
            make_event("0xa", 1000, "pool", "USDC", 120_000_000, Direction::Deposit),
            make_event("0xa", 1000, "pool", "SUI", 40_000_000_000, Direction::Withdraw),
            make_event("0xb", 2000, "pool", "USDC", 150_000_000, Direction::Withdraw),
        ];

        let groups = group_by_transaction(events, "pool");
        assert_eq!(groups.len(), 2);

        let a = groups.iter().find(|g| g.tx_id.as_str() == "0xa").unwrap();
        assert_eq!(a.change(&Symbol::new("USDC".to_string())), -120_000_000);
        assert_eq!(a.change(&Symbol::new("SUI".to_string())), 40_000_000_000);
        assert_eq!(a.time_ms.as_ms(), 1000);

        let b = groups.iter().find(|g| g.tx_id.as_str() == "0xb").unwrap();
        assert_eq!(b.change(&Symbol::new("USDC".to_string())), 150_000_000);
    }

    #[test]
    fn test_grouping_completeness() {
        // The union of all grouped raw events equals the input set, each
        // event exactly once.
        let events = vec![
            make_event("0xa", 1000, "pool", "USDC", 1, Direction::Deposit),
            make_event("0xa", 1000, "transfer", "SUI", 2, Direction::Withdraw),
            make_event("0xb", 2000, "pool", "SUI", 3, Direction::Withdraw),
            make_event("0xc", 3000, "lending", "DEEP", 4, Direction::Deposit),
        ];
        let input_keys: BTreeSet<String> = events
            .iter()
            .map(|e| format!("{}:{}:{}", e.tx_id, e.symbol, e.amount))
            .collect();

        let groups = group_by_transaction(events, "pool");
        let mut output_keys = BTreeSet::new();
        let mut total = 0usize;
        for group in &groups {
            for event in &group.events {
                output_keys.insert(format!("{}:{}:{}", event.tx_id, event.symbol, event.amount));
                total += 1;
            }
        }

        assert_eq!(total, 4, "no event duplicated or dropped");
        assert_eq!(output_keys, input_keys);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = vec![
            make_event("0xa", 1000, "pool", "USDC", 10, Direction::Deposit),
            make_event("0xa", 1000, "pool", "USDC", 5, Direction::Withdraw),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = group_by_transaction(forward, "pool");
        let b = group_by_transaction(reversed, "pool");
        assert_eq!(
            a[0].change(&Symbol::new("USDC".to_string())),
            b[0].change(&Symbol::new("USDC".to_string()))
        );
        assert_eq!(a[0].change(&Symbol::new("USDC".to_string())), -5);
    }

    #[test]
    fn test_non_pairing_venue_excluded_from_balance_changes() {
        let events = vec![
            make_event("0xa", 1000, "lending", "USDC", 99, Direction::Deposit),
            make_event("0xa", 1000, "pool", "USDC", 1, Direction::Deposit),
        ];
        let groups = group_by_transaction(events, "pool");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].change(&Symbol::new("USDC".to_string())), -1);
        assert_eq!(groups[0].events.len(), 2);
    }
}
