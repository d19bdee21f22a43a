//! Price persistence and live price serving.
//!
//! [`PricePointStore`] owns the daily price file on disk; [`PriceBook`] is
//! the immutable snapshot handed to synchronous consumers; [`LivePriceService`]
//! serves spot prices with a stale-while-revalidate cache; [`DailyValuationMerger`]
//! folds live figures into the day's stored point.

pub mod live;
pub mod merger;
pub mod point_cache;

pub use live::{LivePriceService, PriceQuote};
pub use merger::DailyValuationMerger;
pub use point_cache::{PriceBook, PricePointStore, StoreError};
