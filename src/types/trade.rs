//! ActiveTrade / InactiveTrade — the trade lifecycle's owned records.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pair::{Fork, Protocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    PolicyExit,
    Manual,
    ZeroBalance,
}

/// Snapshot of the pair metadata an ActiveTrade was opened against,
/// so the trade record stays meaningful even if the live PairState is
/// later evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub pair_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub protocol: Protocol,
    pub fork: Fork,
    pub fee_bps: u32,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub pair: PairSnapshot,
    pub base_token: Address,
    pub policy_id: String,
    pub entry_price: f64,
    pub eth_spent: Decimal,
    pub eth_sold: Decimal,
    pub tokens_bought: f64,
    pub tokens_in_possession: f64,
    pub tokens_in_possession_raw: String,
    pub current_price: f64,
    pub price_change_pct: f64,
    pub min_price_since_entry: f64,
    pub max_price_since_entry: f64,
    pub opened_at: i64,
}

impl ActiveTrade {
    pub fn current_eth_value(&self) -> f64 {
        self.tokens_in_possession * self.current_price
    }

    /// Update entry-dependent stats from a fresh price observation.
    pub fn observe_price(&mut self, price: f64) {
        self.current_price = price;
        self.price_change_pct = if self.entry_price != 0.0 {
            (price - self.entry_price) / self.entry_price * 100.0
        } else {
            0.0
        };
        if price < self.min_price_since_entry {
            self.min_price_since_entry = price;
        }
        if price > self.max_price_since_entry {
            self.max_price_since_entry = price;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactiveTrade {
    #[serde(flatten)]
    pub trade: ActiveTrade,
    pub exit_price: f64,
    pub closed_at: i64,
    pub realized_pnl_eth: Decimal,
    pub realized_pnl_pct: Decimal,
    pub close_reason: CloseReason,
}

impl InactiveTrade {
    pub fn close(trade: ActiveTrade, exit_price: f64, closed_at: i64, reason: CloseReason) -> Self {
        let realized_pnl_eth = trade.eth_sold - trade.eth_spent;
        let realized_pnl_pct = if trade.eth_spent != Decimal::ZERO {
            realized_pnl_eth / trade.eth_spent * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
        Self {
            trade,
            exit_price,
            closed_at,
            realized_pnl_eth,
            realized_pnl_pct,
            close_reason: reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_trade() -> ActiveTrade {
        ActiveTrade {
            pair: PairSnapshot {
                pair_address: Address::ZERO,
                token0: Address::ZERO,
                token1: Address::ZERO,
                token0_decimals: 18,
                token1_decimals: 18,
                protocol: Protocol::V3,
                fork: Fork::Uniswap,
                fee_bps: 3000,
                symbol: "TEST".into(),
            },
            base_token: Address::ZERO,
            policy_id: "p1".into(),
            entry_price: 1.3,
            eth_spent: dec!(0.01),
            eth_sold: dec!(0.0),
            tokens_bought: 1000.0,
            tokens_in_possession: 1000.0,
            tokens_in_possession_raw: "1000000000000000000000".into(),
            current_price: 1.3,
            price_change_pct: 0.0,
            min_price_since_entry: 1.3,
            max_price_since_entry: 1.3,
            opened_at: 0,
        }
    }

    #[test]
    fn realized_pnl_matches_sold_minus_spent_i6() {
        let mut t = sample_trade();
        t.eth_sold = dec!(0.015);
        let inactive = InactiveTrade::close(t, 1.6, 100, CloseReason::PolicyExit);
        assert_eq!(inactive.realized_pnl_eth, dec!(0.015) - dec!(0.01));
    }

    #[test]
    fn current_eth_value_is_tokens_times_price() {
        let t = sample_trade();
        assert_eq!(t.current_eth_value(), 1000.0 * 1.3);
    }
}
