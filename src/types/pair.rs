//! PairState and Group — the per-pair rolling aggregation state.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protocol generation a pair trades through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    V2,
    V3,
    V4,
}

/// DEX fork identity within a protocol generation (V3's router ABI
/// differs by fork: Uniswap vs. Aerodrome vs. Algebra-style clones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fork {
    Uniswap,
    Aerodrome,
    Algebra,
    Other(String),
}

impl Fork {
    pub fn from_tag(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "uniswap" | "uniswap_v3" | "uniswap_v4" => Fork::Uniswap,
            "aerodrome" => Fork::Aerodrome,
            "algebra" | "quickswap" => Fork::Algebra,
            other => Fork::Other(other.to_string()),
        }
    }
}

/// One OHLCV-style rolling window for a pair, keyed by `group_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub first_price: f64,
    pub last_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub total_volume: f64,
    pub buy_count: u64,
    pub sell_count: u64,
    pub volatility: f64,
}

impl Group {
    /// Seed a new window — `first_price = min_price = max_price = last_price`
    /// per spec.md §4.4 step 3.
    pub fn seed(last_price: f64) -> Self {
        Self {
            first_price: last_price,
            last_price,
            min_price: last_price,
            max_price: last_price,
            price_change: 0.0,
            price_change_pct: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            total_volume: 0.0,
            buy_count: 0,
            sell_count: 0,
            volatility: 0.0,
        }
    }

    /// Apply one accepted event to this window (spec.md §4.4 step 4).
    pub fn apply(&mut self, last_price: f64, buy_volume: f64, sell_volume: f64, liquidity: f64) {
        self.last_price = last_price;
        if last_price < self.min_price {
            self.min_price = last_price;
        }
        if last_price > self.max_price {
            self.max_price = last_price;
        }
        if buy_volume > 0.0 {
            self.buy_volume += buy_volume;
            self.buy_count += 1;
        }
        if sell_volume > 0.0 {
            self.sell_volume += sell_volume;
            self.sell_count += 1;
        }
        self.total_volume = self.buy_volume + self.sell_volume;
        self.price_change = self.last_price - self.first_price;
        self.price_change_pct = if self.first_price != 0.0 {
            self.price_change / self.first_price * 100.0
        } else {
            0.0
        };
        self.volatility = if liquidity > 0.0 {
            self.total_volume / liquidity * 100.0
        } else {
            0.0
        };
    }
}

/// Per-pair state: identity fields fixed at first sight, the rest
/// mutable as new feed events arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairState {
    pub pair_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub protocol: Protocol,
    pub fork: Fork,
    pub fee_bps: u32,
    pub tick_spacing: Option<i32>,
    pub hooks: Option<Address>,
    pub chain_tag: String,

    pub last_price: f64,
    pub liquidity: f64,
    pub symbol: String,
    pub name: String,
    pub buy_tax: f64,
    pub sell_tax: f64,
    pub last_group_key: i64,
    pub first_seen_ts: i64,

    /// group_key -> Group, oldest to newest by key order.
    pub groups: BTreeMap<i64, Group>,

    /// Per-pair policy scratch space; dropped only when the PairState
    /// itself is evicted (not on group retention).
    #[serde(default)]
    pub custom_data: std::collections::HashMap<String, serde_json::Value>,
}

impl PairState {
    pub fn new(
        pair_address: Address,
        token0: Address,
        token1: Address,
        token0_decimals: u8,
        token1_decimals: u8,
        protocol: Protocol,
        fork: Fork,
        fee_bps: u32,
        chain_tag: String,
        now_ts: i64,
    ) -> Self {
        Self {
            pair_address,
            token0,
            token1,
            token0_decimals,
            token1_decimals,
            protocol,
            fork,
            fee_bps,
            tick_spacing: None,
            hooks: None,
            chain_tag,
            last_price: 0.0,
            liquidity: 0.0,
            symbol: String::new(),
            name: String::new(),
            buy_tax: 0.0,
            sell_tax: 0.0,
            last_group_key: 0,
            first_seen_ts: now_ts,
            groups: BTreeMap::new(),
            custom_data: std::collections::HashMap::new(),
        }
    }

    /// Trim the group map to the newest `max_groups` entries.
    pub fn trim_groups(&mut self, max_groups: usize) {
        while self.groups.len() > max_groups {
            if let Some((&oldest_key, _)) = self.groups.iter().next() {
                self.groups.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    /// Whether this pair is eligible for eviction: newest group older
    /// than `max_age_secs` and no active trade on it (caller checks
    /// the latter; this only checks staleness).
    pub fn is_stale(&self, now_ts: i64, max_age_secs: i64) -> bool {
        match self.groups.keys().next_back() {
            Some(&newest_key) => now_ts - newest_key * 60 >= max_age_secs,
            None => now_ts - self.first_seen_ts >= max_age_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_seed_sets_first_price_once() {
        let g = Group::seed(1.3);
        assert_eq!(g.first_price, 1.3);
        assert_eq!(g.min_price, 1.3);
        assert_eq!(g.max_price, 1.3);
    }

    #[test]
    fn group_apply_tracks_min_max_and_invariant_i1() {
        let mut g = Group::seed(1.0);
        g.apply(1.3, 5.0, 0.0, 10.0);
        g.apply(0.9, 0.0, 2.0, 10.0);
        assert!(g.min_price <= g.first_price && g.first_price <= g.max_price);
        assert!(g.min_price <= g.last_price && g.last_price <= g.max_price);
        assert_eq!(g.min_price, 0.9);
        assert_eq!(g.max_price, 1.3);
    }

    #[test]
    fn group_total_volume_invariant_i2() {
        let mut g = Group::seed(1.0);
        g.apply(1.1, 3.0, 4.0, 10.0);
        assert_eq!(g.total_volume, g.buy_volume + g.sell_volume);
        assert_eq!(g.buy_count, 1);
        assert_eq!(g.sell_count, 1);
    }

    #[test]
    fn trim_groups_enforces_max_groups_i3() {
        let addr = Address::ZERO;
        let mut p = PairState::new(
            addr,
            addr,
            addr,
            18,
            18,
            Protocol::V3,
            Fork::Uniswap,
            3000,
            "base".into(),
            0,
        );
        for k in 0..10 {
            p.groups.insert(k, Group::seed(1.0));
        }
        p.trim_groups(5);
        assert!(p.groups.len() <= 5);
        // newest keys survive
        assert!(p.groups.contains_key(&9));
        assert!(!p.groups.contains_key(&0));
    }
}
