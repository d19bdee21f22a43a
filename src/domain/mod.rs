//! Core domain types for trade reconstruction and valuation.

pub mod asset;
pub mod decimal;
pub mod grouped;
pub mod ordering;
pub mod price_point;
pub mod primitives;
pub mod trade;
pub mod transfer;

pub use asset::AssetBook;
pub use decimal::Decimal;
pub use grouped::GroupedTransaction;
pub use price_point::{PricePoint, PricePointUpdate};
pub use primitives::{Address, DateKey, Direction, Symbol, TimeMs, TxId};
pub use trade::{Trade, TradeStatus};
pub use transfer::TransferEvent;
