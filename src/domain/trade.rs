//! Trade: one reconstructed round trip through the pairing venue.

use crate::domain::{Decimal, GroupedTransaction, TimeMs, TxId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a trade during reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    /// Only one leg found inside the queried window.
    Open,
    /// Both legs attached; entry and realized figures are defined.
    Closed,
}

/// One round-trip trade. Field names mirror the pairer's newest-first
/// processing order, not calendar order: the leg seen first (newest in
/// time) supplies `exit_*` and seeds the trade; the matching older leg
/// supplies `entry_*` and closes it. `entry_*` and the realized figures
/// are meaningful iff the trade is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Transaction id of the seeding (first-processed) leg.
    pub id: TxId,
    pub status: TradeStatus,
    pub exit_time_ms: TimeMs,
    pub exit_price: Decimal,
    pub entry_time_ms: Option<TimeMs>,
    pub entry_price: Option<Decimal>,
    /// Fee-asset outflow summed across both legs, smallest units.
    pub fee_raw: i128,
    /// Fee valued at the fee asset's price on the entry date. Zero while
    /// open.
    pub fee_usd: Decimal,
    /// Net quote-asset flow across both legs, in whole quote units. Zero
    /// while open.
    pub realized_pnl_usd: Decimal,
    /// Percentage return; positive always means profit. Zero while open.
    pub realized_pnl_pct: Decimal,
    /// Legs where the account spent quote to acquire base.
    pub buy_legs: Vec<GroupedTransaction>,
    /// Legs where the account received quote for base.
    pub sell_legs: Vec<GroupedTransaction>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Earliest leg timestamp; chronological position of the round trip.
    pub fn chronological_start(&self) -> TimeMs {
        self.buy_legs
            .iter()
            .chain(self.sell_legs.iter())
            .map(|leg| leg.time_ms)
            .min()
            .unwrap_or(self.exit_time_ms)
    }
}
