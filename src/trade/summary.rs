//! Trade summary (spec.md §4.6): derived, not authoritatively
//! persisted — recomputed from the active/inactive trade sets on
//! every read, the way `tax::TaxSummary` is built by folding records
//! rather than loaded from disk.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ActiveTrade, InactiveTrade};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Summary {
    pub open_trades: u64,
    pub closed_trades: u64,
    pub unrealized_pnl_eth: Decimal,
    pub realized_pnl_eth: Decimal,
    pub wins: u64,
    pub losses: u64,
    pub avg_win_pct: Decimal,
    pub avg_loss_pct: Decimal,
    pub win_rate_pct: Decimal,
    pub volume_eth: Decimal,
    pub net_roi_pct: Decimal,
}

/// Fold the active and inactive trade sets into a `Summary`
/// (spec.md §4.6): `unrealized_pnl_eth = Σ(current_eth_value +
/// eth_sold − eth_spent)`, `realized_pnl_eth = Σ(eth_sold −
/// eth_spent)`, wins/losses counted by `eth_sold ≥ eth_spent`.
pub fn build_summary(active: &[&ActiveTrade], inactive: &[&InactiveTrade]) -> Summary {
    let open_trades = active.len() as u64;
    let closed_trades = inactive.len() as u64;

    let unrealized_pnl_eth: Decimal = active
        .iter()
        .map(|t| Decimal::from_f64(t.current_eth_value()).unwrap_or_default() + t.eth_sold - t.eth_spent)
        .sum();

    let mut realized_pnl_eth = Decimal::ZERO;
    let mut wins = 0u64;
    let mut losses = 0u64;
    let mut win_pcts = Vec::new();
    let mut loss_pcts = Vec::new();
    let mut volume_eth = Decimal::ZERO;
    let mut total_spent = Decimal::ZERO;

    for t in inactive {
        realized_pnl_eth += t.realized_pnl_eth;
        volume_eth += t.trade.eth_spent + t.trade.eth_sold;
        total_spent += t.trade.eth_spent;
        if t.trade.eth_sold >= t.trade.eth_spent {
            wins += 1;
            win_pcts.push(t.realized_pnl_pct);
        } else {
            losses += 1;
            loss_pcts.push(t.realized_pnl_pct);
        }
    }
    for t in active {
        volume_eth += t.eth_spent + t.eth_sold;
        total_spent += t.eth_spent;
    }

    let avg_win_pct = avg(&win_pcts);
    let avg_loss_pct = avg(&loss_pcts);
    let win_rate_pct = if wins + losses > 0 {
        Decimal::from(wins) / Decimal::from(wins + losses) * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    let net_roi_pct = if total_spent > Decimal::ZERO {
        (unrealized_pnl_eth + realized_pnl_eth) / total_spent * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    Summary {
        open_trades,
        closed_trades,
        unrealized_pnl_eth,
        realized_pnl_eth,
        wins,
        losses,
        avg_win_pct,
        avg_loss_pct,
        win_rate_pct,
        volume_eth,
        net_roi_pct,
    }
}

fn avg(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        Decimal::ZERO
    } else {
        values.iter().sum::<Decimal>() / Decimal::from(values.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CloseReason, Fork, PairSnapshot, Protocol};
    use rust_decimal_macros::dec;

    fn trade(eth_spent: Decimal, eth_sold: Decimal, tokens: f64, price: f64) -> ActiveTrade {
        ActiveTrade {
            pair: PairSnapshot {
                pair_address: alloy::primitives::Address::ZERO,
                token0: alloy::primitives::Address::ZERO,
                token1: alloy::primitives::Address::ZERO,
                token0_decimals: 18,
                token1_decimals: 18,
                protocol: Protocol::V3,
                fork: Fork::Uniswap,
                fee_bps: 3000,
                symbol: "TEST".into(),
            },
            base_token: alloy::primitives::Address::ZERO,
            policy_id: "p1".into(),
            entry_price: price,
            eth_spent,
            eth_sold,
            tokens_bought: tokens,
            tokens_in_possession: tokens,
            tokens_in_possession_raw: "0".into(),
            current_price: price,
            price_change_pct: 0.0,
            min_price_since_entry: price,
            max_price_since_entry: price,
            opened_at: 0,
        }
    }

    #[test]
    fn summary_counts_wins_and_losses_by_sold_vs_spent() {
        let win = crate::types::InactiveTrade::close(trade(dec!(0.01), dec!(0.02), 0.0, 1.0), 2.0, 10, CloseReason::PolicyExit);
        let loss = crate::types::InactiveTrade::close(trade(dec!(0.01), dec!(0.005), 0.0, 1.0), 0.5, 10, CloseReason::PolicyExit);
        let summary = build_summary(&[], &[&win, &loss]);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 1);
        assert_eq!(summary.win_rate_pct, dec!(50.0));
    }

    #[test]
    fn summary_is_zeroed_with_no_trades() {
        let summary = build_summary(&[], &[]);
        assert_eq!(summary.open_trades, 0);
        assert_eq!(summary.win_rate_pct, Decimal::ZERO);
    }

    #[test]
    fn unrealized_pnl_matches_current_value_plus_sold_minus_spent() {
        let t = trade(dec!(0.01), dec!(0.0), 100.0, 2.0);
        let expected = Decimal::from_f64(t.current_eth_value()).unwrap() + t.eth_sold - t.eth_spent;
        let summary = build_summary(&[&t], &[]);
        assert_eq!(summary.unrealized_pnl_eth, expected);
    }
}
