//! Newest-first ordering for grouped transactions.
//!
//! The trade pairer walks the stream newest-first: the first opening
//! signal it sees starts the most recent trade and the matching leg is
//! found further back in time. Violating that order silently mispairs
//! legs, so callers validate (and repair) it at the boundary.

use crate::domain::GroupedTransaction;

/// Ordering key: timestamp descending, transaction id as the tie-breaker
/// so equal-timestamp groups sort deterministically.
fn ordering_key(group: &GroupedTransaction) -> (i64, &str) {
    (-group.time_ms.as_ms(), group.tx_id.as_str())
}

/// Sort groups newest-first.
pub fn sort_newest_first(groups: &mut [GroupedTransaction]) {
    groups.sort_by(|a, b| ordering_key(a).cmp(&ordering_key(b)));
}

/// Check the newest-first precondition without repairing it.
pub fn is_newest_first(groups: &[GroupedTransaction]) -> bool {
    groups
        .windows(2)
        .all(|pair| pair[0].time_ms >= pair[1].time_ms)
}
