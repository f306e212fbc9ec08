//! Heterogeneous feed-payload normalization (spec.md §4.4, §9).
//!
//! Feed events arrive with inconsistent shape: some fields live under
//! a nested `data` object, some at the top level; naming alternates
//! between camelCase and snake_case. `extract_field` is a small, pure
//! defensive walker in the same spirit as `filters::whitelist::
//! normalize_addr` — a tiny normalization helper feeding a larger
//! typed structure, generalized here from address casing to field
//! shape.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::Address;
use serde_json::Value;
use std::str::FromStr;

use crate::types::{Fork, Protocol};

/// One accepted, normalized event, ready to fold into `AggregationState`.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub pair_address: Address,
    pub chain_tag: String,
    pub last_price: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub liquidity: f64,
    pub minute_key: i64,
    pub token0: Option<Address>,
    pub token1: Option<Address>,
    pub token0_decimals: Option<u8>,
    pub token1_decimals: Option<u8>,
    pub protocol: Protocol,
    pub fork: Fork,
    pub fee_bps: Option<u32>,
    pub tick_spacing: Option<i32>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub buy_tax: Option<f64>,
    pub sell_tax: Option<f64>,
}

/// Try each candidate field name, first under `data.*`, then at the
/// top level.
fn extract_field<'a>(raw: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let data = raw.get("data");
    for name in candidates {
        if let Some(data) = data {
            if let Some(v) = data.get(*name) {
                if !v.is_null() {
                    return Some(v);
                }
            }
        }
        if let Some(v) = raw.get(*name) {
            if !v.is_null() {
                return Some(v);
            }
        }
    }
    None
}

fn extract_str(raw: &Value, candidates: &[&str]) -> Option<String> {
    extract_field(raw, candidates).and_then(|v| v.as_str().map(String::from))
}

fn extract_f64(raw: &Value, candidates: &[&str]) -> Option<f64> {
    extract_field(raw, candidates).and_then(|v| v.as_f64())
}

fn extract_u64(raw: &Value, candidates: &[&str]) -> Option<u64> {
    extract_field(raw, candidates).and_then(|v| v.as_u64())
}

fn normalize_addr(s: &str) -> Option<Address> {
    let s = s.trim();
    Address::from_str(s).ok()
}

/// Normalize one raw `marketData` payload into a `NormalizedEvent`.
/// Returns `None` if the event fails the basic acceptance filter
/// (`last_price <= 0` or no parseable pair address) per spec.md §4.4.
pub fn normalize(raw: &Value, default_minute_key: i64) -> Option<NormalizedEvent> {
    let pair_address_str = extract_str(raw, &["pairAddress", "pair_address", "pair"])?;
    let pair_address = normalize_addr(&pair_address_str)?;

    let last_price = extract_f64(raw, &["lastPrice", "last_price", "price"])?;
    if last_price <= 0.0 {
        return None;
    }

    let chain_tag = extract_str(raw, &["chainTag", "chain_tag", "chain"]).unwrap_or_else(|| "base".into());
    let buy_volume = extract_f64(raw, &["buyVolume", "buy_volume"]).unwrap_or(0.0);
    let sell_volume = extract_f64(raw, &["sellVolume", "sell_volume"]).unwrap_or(0.0);
    let liquidity = extract_f64(raw, &["liquidity"]).unwrap_or(0.0);
    let minute_key = extract_u64(raw, &["minuteKey", "minute_key"])
        .map(|v| v as i64)
        .unwrap_or(default_minute_key);

    let token0 = extract_str(raw, &["token0", "token0Address"]).and_then(|s| normalize_addr(&s));
    let token1 = extract_str(raw, &["token1", "token1Address"]).and_then(|s| normalize_addr(&s));
    let token0_decimals = extract_u64(raw, &["token0Decimals", "token0_decimals"]).map(|v| v as u8);
    let token1_decimals = extract_u64(raw, &["token1Decimals", "token1_decimals"]).map(|v| v as u8);

    let protocol = match extract_str(raw, &["protocol"]).as_deref() {
        Some("v2") | Some("V2") => Protocol::V2,
        Some("v4") | Some("V4") => Protocol::V4,
        _ => Protocol::V3,
    };
    let fork = extract_str(raw, &["fork", "dex"])
        .map(|s| Fork::from_tag(&s))
        .unwrap_or(Fork::Uniswap);

    let fee_bps = extract_u64(raw, &["fee", "feeBps", "fee_bps"]).map(|v| v as u32);
    let tick_spacing = extract_u64(raw, &["tickSpacing", "tick_spacing"]).map(|v| v as i32);
    let symbol = extract_str(raw, &["symbol"]);
    let name = extract_str(raw, &["name"]);
    let buy_tax = extract_f64(raw, &["buyTax", "buy_tax"]);
    let sell_tax = extract_f64(raw, &["sellTax", "sell_tax"]);

    Some(NormalizedEvent {
        pair_address,
        chain_tag,
        last_price,
        buy_volume,
        sell_volume,
        liquidity,
        minute_key,
        token0,
        token1,
        token0_decimals,
        token1_decimals,
        protocol,
        fork,
        fee_bps,
        tick_spacing,
        symbol,
        name,
        buy_tax,
        sell_tax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_nested_camel_case_payload() {
        let raw = json!({
            "data": {
                "pairAddress": "0x0000000000000000000000000000000000000001",
                "lastPrice": 1.3,
                "buyVolume": 5.0,
                "liquidity": 10.0,
                "minuteKey": 100
            }
        });
        let event = normalize(&raw, 0).unwrap();
        assert_eq!(event.last_price, 1.3);
        assert_eq!(event.minute_key, 100);
    }

    #[test]
    fn normalizes_flat_snake_case_payload() {
        let raw = json!({
            "pair_address": "0x0000000000000000000000000000000000000002",
            "last_price": 2.5,
            "sell_volume": 1.0,
            "liquidity": 4.0
        });
        let event = normalize(&raw, 42).unwrap();
        assert_eq!(event.last_price, 2.5);
        assert_eq!(event.minute_key, 42);
    }

    #[test]
    fn rejects_non_positive_price() {
        let raw = json!({"pair_address": "0x0000000000000000000000000000000000000003", "last_price": 0.0});
        assert!(normalize(&raw, 0).is_none());
    }

    #[test]
    fn rejects_unparseable_pair_address() {
        let raw = json!({"pair_address": "not-an-address", "last_price": 1.0});
        assert!(normalize(&raw, 0).is_none());
    }

    #[test]
    fn prefers_nested_field_over_missing_top_level() {
        let raw = json!({
            "data": {"lastPrice": 9.0},
            "pair_address": "0x0000000000000000000000000000000000000004"
        });
        let event = normalize(&raw, 0).unwrap();
        assert_eq!(event.last_price, 9.0);
    }
}
