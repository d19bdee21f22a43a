//! Trade Pairer: reconstruct round-trip trades from grouped transactions.
//!
//! Processing order invariant: the input is consumed newest-first. The
//! first qualifying leg seen (a pairing-venue transaction that spent the
//! quote asset) seeds the most recent trade and supplies its `exit_*`
//! fields; the next qualifying leg, further back in time, is the matching
//! opposite side and closes the trade with its `entry_*` fields. The
//! compounding fold over the result runs in the opposite (chronological)
//! order; see `stats`.

use crate::domain::ordering::{is_newest_first, sort_newest_first};
use crate::domain::{
    AssetBook, DateKey, Decimal, GroupedTransaction, Symbol, Trade, TradeStatus,
};
use crate::engine::Market;
use crate::pricing::PriceBook;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PairingError {
    /// A market asset is missing from the asset registry; pairing cannot
    /// price anything without its precision.
    #[error("unknown precision for market asset: {0}")]
    UnknownAsset(Symbol),
}

/// Pair grouped transactions into round-trip trades.
///
/// Out-of-order input is repaired (with a warning) rather than silently
/// mispaired. A seed leg that never finds its opposite side within the
/// window stays `open` and contributes nothing to realized figures.
pub fn pair_trades(
    mut groups: Vec<GroupedTransaction>,
    market: &Market,
    assets: &AssetBook,
    prices: &PriceBook,
) -> Result<Vec<Trade>, PairingError> {
    let quote_decimals = assets
        .decimals(&market.quote)
        .ok_or_else(|| PairingError::UnknownAsset(market.quote.clone()))?;
    let base_decimals = assets
        .decimals(&market.base)
        .ok_or_else(|| PairingError::UnknownAsset(market.base.clone()))?;
    let fee_decimals = assets
        .decimals(&market.fee)
        .ok_or_else(|| PairingError::UnknownAsset(market.fee.clone()))?;

    if !is_newest_first(&groups) {
        warn!("grouped transactions arrived out of order; re-sorting newest-first");
        sort_newest_first(&mut groups);
    }

    let mut trades: Vec<Trade> = Vec::new();
    let mut open: Option<Trade> = None;

    for group in groups {
        if !group.is_pairing_venue(&market.pool_module) {
            debug!(tx_id = %group.tx_id, module = %group.venue_module,
                "ignoring non-pairing venue transaction");
            continue;
        }

        let quote_change = group.change(&market.quote);
        let base_change = group.change(&market.base);

        match open.take() {
            None => {
                // A new trade seed: money left the account to acquire base.
                if quote_change < 0 && base_change != 0 {
                    match leg_price(quote_change, quote_decimals, base_change, base_decimals) {
                        Some(exit_price) => {
                            open = Some(seed_trade(group, exit_price, &market.fee));
                        }
                        None => {
                            warn!(tx_id = %group.tx_id,
                                "leg amounts exceed representable precision; skipping");
                        }
                    }
                } else {
                    warn!(tx_id = %group.tx_id, quote_change,
                        "not a pool interaction we recognize; skipping");
                }
            }
            Some(mut trade) => {
                if quote_change <= 0 {
                    // Two spends in a row do not pair; keep waiting for the
                    // opposite side.
                    warn!(tx_id = %group.tx_id, quote_change,
                        "not a pool interaction we recognize; skipping");
                    open = Some(trade);
                    continue;
                }
                let entry_price =
                    match leg_price(quote_change, quote_decimals, base_change, base_decimals) {
                        Some(price) => price,
                        None => {
                            warn!(tx_id = %group.tx_id,
                                "leg amounts exceed representable precision; skipping");
                            open = Some(trade);
                            continue;
                        }
                    };

                close_trade(
                    &mut trade,
                    group,
                    entry_price,
                    market,
                    quote_decimals,
                    fee_decimals,
                    prices,
                );
                trades.push(trade);
            }
        }
    }

    if let Some(trade) = open {
        debug!(id = %trade.id, "window ended with an unmatched open trade");
        trades.push(trade);
    }

    Ok(trades)
}

fn seed_trade(group: GroupedTransaction, exit_price: Decimal, fee: &Symbol) -> Trade {
    let fee_raw = fee_outflow(&group, fee);
    Trade {
        id: group.tx_id.clone(),
        status: TradeStatus::Open,
        exit_time_ms: group.time_ms,
        exit_price,
        entry_time_ms: None,
        entry_price: None,
        fee_raw,
        fee_usd: Decimal::zero(),
        realized_pnl_usd: Decimal::zero(),
        realized_pnl_pct: Decimal::zero(),
        // Quote was spent, so the seed leg bought base.
        buy_legs: vec![group],
        sell_legs: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn close_trade(
    trade: &mut Trade,
    group: GroupedTransaction,
    entry_price: Decimal,
    market: &Market,
    quote_decimals: u32,
    fee_decimals: u32,
    prices: &PriceBook,
) {
    let entry_time = group.time_ms;
    trade.fee_raw += fee_outflow(&group, &market.fee);

    let seed_quote = trade
        .buy_legs
        .first()
        .map(|leg| leg.change(&market.quote))
        .unwrap_or(0);
    let closing_quote = group.change(&market.quote);

    trade.entry_time_ms = Some(entry_time);
    trade.entry_price = Some(entry_price);
    trade.sell_legs.push(group);
    trade.status = TradeStatus::Closed;

    // Net quote flow across both legs is the realized result in USD terms
    // (the quote asset is USD-stable).
    trade.realized_pnl_usd =
        Decimal::from_units(seed_quote + closing_quote, quote_decimals).unwrap_or_else(|| {
            warn!(id = %trade.id, "realized quote flow exceeds representable precision");
            Decimal::zero()
        });

    // Positive means profit: the newer leg bought back cheaper than the
    // older leg sold. (The upstream variants disagreed on a -1 factor;
    // this convention matches the sign of realized_pnl_usd.)
    if !entry_price.is_zero() {
        trade.realized_pnl_pct =
            (entry_price - trade.exit_price) / entry_price * Decimal::hundred();
    }

    trade.fee_usd = value_fee(trade.fee_raw, fee_decimals, &market.fee, entry_time, prices);
}

/// Price of one leg: |quote| / |base| adjusted for the assets' precision.
fn leg_price(
    quote_change: i128,
    quote_decimals: u32,
    base_change: i128,
    base_decimals: u32,
) -> Option<Decimal> {
    if base_change == 0 {
        return None;
    }
    let quote = Decimal::from_units(quote_change.abs(), quote_decimals)?;
    let base = Decimal::from_units(base_change.abs(), base_decimals)?;
    Some(quote / base)
}

/// Fee-asset outflow from a leg. A net positive change (the venue
/// returned more than it took) contributes nothing.
fn fee_outflow(group: &GroupedTransaction, fee: &Symbol) -> i128 {
    let change = group.change(fee);
    if change < 0 {
        -change
    } else {
        0
    }
}

/// Value an accumulated fee at the fee asset's price on the entry date,
/// falling back to the nearest prior date with a price. A missing price
/// is never fatal; the fee is simply reported as zero USD.
fn value_fee(
    fee_raw: i128,
    fee_decimals: u32,
    fee: &Symbol,
    entry_time: crate::domain::TimeMs,
    prices: &PriceBook,
) -> Decimal {
    if fee_raw == 0 {
        return Decimal::zero();
    }
    let Some(date) = DateKey::from_time_ms(entry_time) else {
        warn!("entry timestamp outside calendar range; fee left unvalued");
        return Decimal::zero();
    };
    let Some(price) = prices.price_on(fee, &date) else {
        warn!(%fee, %date, "no cached price for fee asset; fee left unvalued");
        return Decimal::zero();
    };
    match Decimal::from_units(fee_raw, fee_decimals) {
        Some(amount) => amount * price,
        None => {
            warn!("fee amount exceeds representable precision; fee left unvalued");
            Decimal::zero()
        }
    }
}
