//! Aggregation engine (C4, spec.md §4.4): per-pair rolling `Group`
//! windows built from the normalized feed stream.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod normalize;

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::types::{Group, PairState};
use normalize::NormalizedEvent;

/// Thread-safe per-pair state, keyed by pair address. Mirrors the
/// teacher's `PoolStateManager`'s DashMap-of-states shape, generalized
/// from a `(DexType, symbol)` compound key to a single pair address
/// and from pool reserves to rolling price/volume groups.
#[derive(Debug, Default)]
pub struct AggregationState {
    pairs: Arc<DashMap<Address, PairState>>,
}

/// Outcome of folding one event into the aggregation state: whether a
/// new `PairState` was created, and the state needed to build a
/// PolicyContext if the caller should now dispatch to the policy
/// engine.
pub struct IntegrationResult {
    pub pair_created: bool,
    pub group_key: i64,
}

impl AggregationState {
    pub fn new() -> Self {
        Self { pairs: Arc::new(DashMap::new()) }
    }

    /// Apply one accepted, normalized event (spec.md §4.4 steps 1-4).
    /// `group_interval` is in minutes; `protocol`/`fork`/decimals are
    /// only consulted the first time a pair is observed.
    pub fn integrate(
        &self,
        event: &NormalizedEvent,
        group_interval: i64,
        max_groups: usize,
        now_ts: i64,
    ) -> IntegrationResult {
        let group_key = (event.minute_key / group_interval.max(1)) * group_interval.max(1);

        let mut pair_created = false;
        let mut entry = self.pairs.entry(event.pair_address).or_insert_with(|| {
            pair_created = true;
            PairState::new(
                event.pair_address,
                event.token0.unwrap_or(Address::ZERO),
                event.token1.unwrap_or(Address::ZERO),
                event.token0_decimals.unwrap_or(18),
                event.token1_decimals.unwrap_or(18),
                event.protocol,
                event.fork.clone(),
                event.fee_bps.unwrap_or(0),
                event.chain_tag.clone(),
                now_ts,
            )
        });

        entry.last_price = event.last_price;
        entry.liquidity = event.liquidity;
        if let Some(symbol) = &event.symbol {
            entry.symbol = symbol.clone();
        }
        if let Some(name) = &event.name {
            entry.name = name.clone();
        }
        if let Some(fee) = event.fee_bps {
            entry.fee_bps = fee;
        }
        if !pair_created {
            entry.fork = event.fork.clone();
        }
        if let Some(ts) = event.tick_spacing {
            entry.tick_spacing = Some(ts);
        }
        if let Some(tax) = event.buy_tax {
            entry.buy_tax = tax;
        }
        if let Some(tax) = event.sell_tax {
            entry.sell_tax = tax;
        }

        entry
            .groups
            .entry(group_key)
            .or_insert_with(|| Group::seed(event.last_price))
            .apply(event.last_price, event.buy_volume, event.sell_volume, event.liquidity);

        if group_key > entry.last_group_key {
            entry.last_group_key = group_key;
        }

        entry.trim_groups(max_groups);

        debug!(pair = %event.pair_address, group_key, pair_created, "integrated feed event");

        IntegrationResult { pair_created, group_key }
    }

    pub fn get(&self, pair_address: &Address) -> Option<PairState> {
        self.pairs.get(pair_address).map(|e| e.clone())
    }

    pub fn contains(&self, pair_address: &Address) -> bool {
        self.pairs.contains_key(pair_address)
    }

    /// Mutate a pair's `custom_data` in place (policy write-back);
    /// no-op if the pair is unknown.
    pub fn set_custom_data(&self, pair_address: &Address, data: std::collections::HashMap<String, serde_json::Value>) {
        if let Some(mut entry) = self.pairs.get_mut(pair_address) {
            entry.custom_data = data;
        }
    }

    /// Pairs eligible for retention cleanup: newest group older than
    /// `max_age_secs` and not present in `has_active_trade`.
    pub fn pairs_for_cleanup(&self, now_ts: i64, max_age_secs: i64, has_active_trade: impl Fn(&Address) -> bool) -> Vec<Address> {
        self.pairs
            .iter()
            .filter(|entry| entry.is_stale(now_ts, max_age_secs) && !has_active_trade(entry.key()))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn trim_all_groups(&self, max_groups: usize) {
        for mut entry in self.pairs.iter_mut() {
            entry.trim_groups(max_groups);
        }
    }

    pub fn remove(&self, pair_address: &Address) -> Option<PairState> {
        self.pairs.remove(pair_address).map(|(_, v)| v)
    }

    pub fn stats(&self) -> (usize, usize) {
        let pair_count = self.pairs.len();
        let group_count = self.pairs.iter().map(|e| e.groups.len()).sum();
        (pair_count, group_count)
    }
}

impl Clone for AggregationState {
    fn clone(&self) -> Self {
        Self { pairs: Arc::clone(&self.pairs) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fork, Protocol};

    fn sample_event(pair: Address, price: f64, minute_key: i64, buy: f64, sell: f64) -> NormalizedEvent {
        NormalizedEvent {
            pair_address: pair,
            chain_tag: "base".into(),
            last_price: price,
            buy_volume: buy,
            sell_volume: sell,
            liquidity: 10.0,
            minute_key,
            token0: Some(Address::ZERO),
            token1: Some(Address::ZERO),
            token0_decimals: Some(18),
            token1_decimals: Some(18),
            protocol: Protocol::V3,
            fork: Fork::Uniswap,
            fee_bps: Some(3000),
            tick_spacing: None,
            symbol: Some("TEST".into()),
            name: None,
            buy_tax: None,
            sell_tax: None,
        }
    }

    #[test]
    fn first_event_creates_pair_and_seeds_group() {
        let state = AggregationState::new();
        let pair = Address::repeat_byte(1);
        let res = state.integrate(&sample_event(pair, 1.0, 100, 0.0, 0.0), 1, 500, 0);
        assert!(res.pair_created);
        let p = state.get(&pair).unwrap();
        assert_eq!(p.groups.len(), 1);
        assert_eq!(p.groups[&100].first_price, 1.0);
    }

    #[test]
    fn breakout_scenario_1_three_updates_builds_expected_group() {
        let state = AggregationState::new();
        let pair = Address::repeat_byte(2);
        state.integrate(&sample_event(pair, 1.0, 100, 0.0, 0.0), 1, 500, 0);
        state.integrate(&sample_event(pair, 1.3, 100, 5.0, 0.0), 1, 500, 0);
        let res = state.integrate(&sample_event(pair, 1.62, 101, 5.0, 0.0), 1, 500, 0);
        assert_eq!(res.group_key, 101);
        let p = state.get(&pair).unwrap();
        let g100 = &p.groups[&100];
        assert!((g100.price_change_pct - 30.0).abs() < 1e-9);
        assert_eq!(p.last_price, 1.62);
    }

    #[test]
    fn trim_groups_respects_max_groups_invariant_i3() {
        let state = AggregationState::new();
        let pair = Address::repeat_byte(3);
        for k in 0..20 {
            state.integrate(&sample_event(pair, 1.0, k, 0.0, 0.0), 1, 5, 0);
        }
        let p = state.get(&pair).unwrap();
        assert!(p.groups.len() <= 5);
    }

    #[test]
    fn out_of_order_minute_key_does_not_rewind_last_group_key() {
        let state = AggregationState::new();
        let pair = Address::repeat_byte(4);
        state.integrate(&sample_event(pair, 1.0, 200, 0.0, 0.0), 1, 500, 0);
        state.integrate(&sample_event(pair, 1.0, 150, 0.0, 0.0), 1, 500, 0);
        let p = state.get(&pair).unwrap();
        assert_eq!(p.last_group_key, 200);
        assert!(p.groups.contains_key(&150));
    }

    #[test]
    fn pairs_for_cleanup_skips_pairs_with_active_trades() {
        let state = AggregationState::new();
        let pair = Address::repeat_byte(5);
        state.integrate(&sample_event(pair, 1.0, 0, 0.0, 0.0), 1, 500, 0);
        let cleanup = state.pairs_for_cleanup(100_000, 1800, |_| true);
        assert!(cleanup.is_empty());
        let cleanup = state.pairs_for_cleanup(100_000, 1800, |_| false);
        assert_eq!(cleanup, vec![pair]);
    }
}
