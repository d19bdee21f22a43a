//! Aggregate statistics over reconstructed trades.

use crate::domain::{Decimal, Trade};
use serde::Serialize;

/// Summary figures computed from closed trades only. Open trades have no
/// realized result yet and would skew every ratio here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeStats {
    pub total_trades: usize,
    pub closed_trades: usize,
    pub open_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    pub avg_pnl_pct: Decimal,
    pub total_pnl_usd: Decimal,
    pub total_fees_usd: Decimal,
    pub net_pnl_usd: Decimal,
    pub compounded_return_pct: Decimal,
}

impl TradeStats {
    pub fn empty() -> Self {
        TradeStats {
            total_trades: 0,
            closed_trades: 0,
            open_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::zero(),
            avg_pnl_pct: Decimal::zero(),
            total_pnl_usd: Decimal::zero(),
            total_fees_usd: Decimal::zero(),
            net_pnl_usd: Decimal::zero(),
            compounded_return_pct: Decimal::zero(),
        }
    }
}

pub fn compute_stats(trades: &[Trade]) -> TradeStats {
    let mut stats = TradeStats::empty();
    stats.total_trades = trades.len();

    let mut closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
    stats.closed_trades = closed.len();
    stats.open_trades = stats.total_trades - stats.closed_trades;

    if closed.is_empty() {
        return stats;
    }

    let mut pct_sum = Decimal::zero();
    for trade in &closed {
        if trade.realized_pnl_pct.is_positive() {
            stats.winning_trades += 1;
        } else {
            stats.losing_trades += 1;
        }
        pct_sum = pct_sum + trade.realized_pnl_pct;
        stats.total_pnl_usd = stats.total_pnl_usd + trade.realized_pnl_usd;
        stats.total_fees_usd = stats.total_fees_usd + trade.fee_usd;
    }

    let count = Decimal::from_units(closed.len() as i128, 0).unwrap_or_else(Decimal::one);
    stats.win_rate_pct = Decimal::from_units(stats.winning_trades as i128, 0)
        .unwrap_or_else(Decimal::zero)
        / count
        * Decimal::hundred();
    stats.avg_pnl_pct = pct_sum / count;
    stats.net_pnl_usd = stats.total_pnl_usd - stats.total_fees_usd;

    // Compounding follows the order trades actually happened, oldest first,
    // regardless of the newest-first order the pairer emits.
    closed.sort_by_key(|t| t.chronological_start());
    let mut factor = Decimal::one();
    for trade in &closed {
        factor = factor * (Decimal::one() + trade.realized_pnl_pct / Decimal::hundred());
    }
    stats.compounded_return_pct = (factor - Decimal::one()) * Decimal::hundred();

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupedTransaction, Symbol, TimeMs, TradeStatus, TxId};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn leg(time_ms: i64) -> GroupedTransaction {
        GroupedTransaction {
            tx_id: TxId::new(format!("0x{time_ms}")),
            time_ms: TimeMs::new(time_ms),
            venue_module: "pool".to_string(),
            balance_changes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn closed_trade(start_ms: i64, pnl_pct: &str, pnl_usd: &str, fee_usd: &str) -> Trade {
        Trade {
            id: TxId::new(format!("0x{start_ms}")),
            status: TradeStatus::Closed,
            exit_time_ms: TimeMs::new(start_ms + 1000),
            exit_price: dec("3"),
            entry_time_ms: Some(TimeMs::new(start_ms)),
            entry_price: Some(dec("3.75")),
            fee_raw: 0,
            fee_usd: dec(fee_usd),
            realized_pnl_usd: dec(pnl_usd),
            realized_pnl_pct: dec(pnl_pct),
            buy_legs: vec![leg(start_ms + 1000)],
            sell_legs: vec![leg(start_ms)],
        }
    }

    fn open_trade(start_ms: i64) -> Trade {
        Trade {
            id: TxId::new(format!("0x{start_ms}")),
            status: TradeStatus::Open,
            exit_time_ms: TimeMs::new(start_ms),
            exit_price: dec("3"),
            entry_time_ms: None,
            entry_price: None,
            fee_raw: 0,
            fee_usd: Decimal::zero(),
            realized_pnl_usd: Decimal::zero(),
            realized_pnl_pct: Decimal::zero(),
            buy_legs: vec![leg(start_ms)],
            sell_legs: Vec::new(),
        }
    }

    #[test]
    fn test_empty_input_yields_zeroed_stats() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.total_trades, 0);
        assert!(stats.win_rate_pct.is_zero());
        assert!(stats.compounded_return_pct.is_zero());
    }

    #[test]
    fn test_open_trades_counted_but_excluded_from_ratios() {
        let trades = vec![closed_trade(1000, "20", "30", "1"), open_trade(5000)];
        let stats = compute_stats(&trades);
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.closed_trades, 1);
        assert_eq!(stats.open_trades, 1);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.win_rate_pct, dec("100"));
        assert_eq!(stats.total_pnl_usd, dec("30"));
        assert_eq!(stats.net_pnl_usd, dec("29"));
    }

    #[test]
    fn test_win_rate_and_averages() {
        let trades = vec![
            closed_trade(1000, "20", "30", "0"),
            closed_trade(2000, "-10", "-15", "0"),
        ];
        let stats = compute_stats(&trades);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.win_rate_pct, dec("50"));
        assert_eq!(stats.avg_pnl_pct, dec("5"));
        assert_eq!(stats.total_pnl_usd, dec("15"));
    }

    #[test]
    fn test_compounded_return_is_order_independent() {
        // (1.20 * 0.90 - 1) * 100 = 8, whatever order the trades arrive in.
        let newest_first = vec![
            closed_trade(2000, "-10", "-15", "0"),
            closed_trade(1000, "20", "30", "0"),
        ];
        let oldest_first = vec![
            closed_trade(1000, "20", "30", "0"),
            closed_trade(2000, "-10", "-15", "0"),
        ];
        let a = compute_stats(&newest_first);
        let b = compute_stats(&oldest_first);
        assert_eq!(a.compounded_return_pct, dec("8"));
        assert_eq!(b.compounded_return_pct, dec("8"));
    }

    #[test]
    fn test_zero_pct_trade_counts_as_loss() {
        let trades = vec![closed_trade(1000, "0", "0", "0")];
        let stats = compute_stats(&trades);
        assert_eq!(stats.winning_trades, 0);
        assert_eq!(stats.losing_trades, 1);
    }
}
