//! Pure, synchronous transformations over already-fetched ledger data.
//!
//! Nothing in this module suspends; price lookups are served from an
//! immutable [`crate::pricing::PriceBook`] snapshot built by the caller.

use crate::domain::Symbol;

pub mod grouper;
pub mod normalizer;
pub mod pairer;
pub mod stats;

pub use grouper::group_by_transaction;
pub use normalizer::normalize_events;
pub use pairer::pair_trades;
pub use stats::{compute_stats, TradeStats};

/// The market the fund trades: which venue module pairs legs and which
/// assets play the quote/base/fee roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// Contract module whose events represent actual swaps.
    pub pool_module: String,
    /// Asset the trade is priced in (USD-stable).
    pub quote: Symbol,
    /// Asset being bought and sold.
    pub base: Symbol,
    /// Asset the venue charges fees in.
    pub fee: Symbol,
}

impl Market {
    pub fn new(pool_module: String, quote: Symbol, base: Symbol, fee: Symbol) -> Self {
        Self {
            pool_module,
            quote,
            base,
            fee,
        }
    }
}
