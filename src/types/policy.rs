//! PolicyContext — the record passed into a predicate evaluation.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::pair::{Group, PairState};
use super::trade::ActiveTrade;

/// One accepted, normalized feed event — the `event` field of a
/// PolicyContext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub pair_address: String,
    pub chain_tag: String,
    pub last_price: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub liquidity: f64,
    pub minute_key: i64,
}

/// Evaluation-time gas snapshot, informational only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct GasSnapshot {
    pub max_fee_gwei: f64,
    pub priority_fee_gwei: f64,
}

/// Built fresh for every evaluation; not persisted. `custom_data` and
/// `global_data` alias the trade lifecycle's scratch maps so predicate
/// writes persist across evaluations (spec.md §4.5, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyContext {
    pub event: NormalizedEvent,
    pub group: Group,
    pub groups: Vec<Group>,
    pub pair: PairState,
    pub trade: Option<ActiveTrade>,
    pub prices: HashMap<String, f64>,
    pub gas: GasSnapshot,
    pub custom_data: HashMap<String, serde_json::Value>,
    pub global_data: HashMap<String, serde_json::Value>,
}

/// Result of interpreting a predicate's return value (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionPercent(pub u8);

impl ActionPercent {
    pub const NONE: ActionPercent = ActionPercent(0);
    pub const FULL: ActionPercent = ActionPercent(100);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Map a predicate's raw return value to a clamped action percent.
///
/// - `false` or `0` -> 0
/// - `true` or `100` -> 100
/// - numeric in [1, 99] -> that value
/// - any other number is clamped to [0, 100]
/// - NaN -> 0
pub fn action_from_value(value: &crate::policy::lang::Value) -> ActionPercent {
    use crate::policy::lang::Value;
    match value {
        Value::Bool(true) => ActionPercent::FULL,
        Value::Bool(false) => ActionPercent::NONE,
        Value::Number(n) => {
            if n.is_nan() {
                ActionPercent::NONE
            } else {
                let clamped = n.clamp(0.0, 100.0);
                ActionPercent(clamped.round() as u8)
            }
        }
        _ => ActionPercent::NONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::lang::Value;

    #[test]
    fn predicate_value_mapping_i9() {
        let cases: Vec<(Value, u8)> = vec![
            (Value::Bool(false), 0),
            (Value::Number(0.0), 0),
            (Value::Number(50.0), 50),
            (Value::Number(100.0), 100),
            (Value::Bool(true), 100),
            (Value::Number(150.0), 100),
            (Value::Number(-10.0), 0),
            (Value::Number(f64::NAN), 0),
        ];
        for (input, expected) in cases {
            assert_eq!(action_from_value(&input).0, expected, "input={:?}", input);
        }
    }
}
