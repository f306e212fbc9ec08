//! Policy sandbox (spec.md §4.5): lazy compile-and-cache predicates,
//! build the evaluation context from a `PolicyContext`, and map the
//! result to an `ActionPercent`.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod lang;

use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

use crate::types::{action_from_value, ActionPercent, PolicyContext};
use lang::{compile, CompiledPredicate, CtxValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    Entry,
    Exit,
}

/// Lazily compiles and caches predicates by `(kind, policy_id)`. A
/// policy whose source fails to compile is disabled: the failure is
/// logged once and every subsequent lookup returns `None` without
/// retrying the compile (mirroring the decimals-cache "compute once,
/// remember the outcome" shape).
#[derive(Debug, Default)]
pub struct PolicySandbox {
    cache: DashMap<(PredicateKind, String), Option<Arc<CompiledPredicate>>>,
}

impl PolicySandbox {
    pub fn new() -> Self {
        Self { cache: DashMap::new() }
    }

    /// Compile (or fetch from cache) the predicate source for
    /// `policy_id`/`kind`. Returns `None` if there is no predicate
    /// configured, or if it failed to compile.
    fn compiled(
        &self,
        kind: PredicateKind,
        policy_id: &str,
        source: Option<&str>,
    ) -> Option<Arc<CompiledPredicate>> {
        let key = (kind, policy_id.to_string());
        if let Some(entry) = self.cache.get(&key) {
            return entry.clone();
        }
        let compiled = match source {
            None => None,
            Some(src) => match compile(src) {
                Ok(p) => Some(Arc::new(p)),
                Err(e) => {
                    warn!(policy_id, ?kind, error = %e, "predicate failed to compile; disabling");
                    None
                }
            },
        };
        self.cache.insert(key, compiled.clone());
        compiled
    }

    /// Evaluate `policy_id`'s entry or exit predicate against `ctx`.
    /// A missing predicate, a compile failure, or a runtime error all
    /// resolve to `ActionPercent::NONE` — per spec.md §4.5, uncaught
    /// predicate errors are logged and treated as "no action".
    /// `custom_data`/`global_data` on `ctx` are updated in place with
    /// whatever the predicate wrote during evaluation.
    pub fn evaluate(
        &self,
        kind: PredicateKind,
        policy_id: &str,
        source: Option<&str>,
        ctx: &mut PolicyContext,
    ) -> ActionPercent {
        let predicate = match self.compiled(kind, policy_id, source) {
            Some(p) => p,
            None => return ActionPercent::NONE,
        };

        let json = match serde_json::to_value(&*ctx) {
            Ok(v) => v,
            Err(e) => {
                warn!(policy_id, error = %e, "failed to build policy context; treating as no action");
                return ActionPercent::NONE;
            }
        };
        let mut tree = CtxValue::from_json(&json);

        let result = match predicate.eval(&mut tree) {
            Ok(v) => v,
            Err(e) => {
                warn!(policy_id, ?kind, error = %e, "predicate runtime error; treating as no action");
                return ActionPercent::NONE;
            }
        };

        if let Some(CtxValue::Object(map)) = tree_get(&tree, "custom_data") {
            if let Ok(updated) = serde_json::from_value(map_to_json(map)) {
                ctx.custom_data = updated;
            }
        }
        if let Some(CtxValue::Object(map)) = tree_get(&tree, "global_data") {
            if let Ok(updated) = serde_json::from_value(map_to_json(map)) {
                ctx.global_data = updated;
            }
        }

        action_from_value(&result)
    }

    /// Drop every cached compile result for `policy_id` (e.g. after a
    /// config reload changes its predicate source).
    pub fn invalidate(&self, policy_id: &str) {
        self.cache
            .retain(|(_, id), _| id != policy_id);
    }
}

fn tree_get<'a>(tree: &'a CtxValue, key: &str) -> Option<&'a CtxValue> {
    match tree {
        CtxValue::Object(map) => map.get(key),
        _ => None,
    }
}

fn map_to_json(map: &std::collections::BTreeMap<String, CtxValue>) -> serde_json::Value {
    CtxValue::Object(map.clone()).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fork, GasSnapshot, NormalizedEvent, PairState, Protocol};
    use alloy::primitives::Address;
    use std::collections::HashMap;

    fn sample_ctx() -> PolicyContext {
        let pair = PairState::new(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            18,
            18,
            Protocol::V3,
            Fork::Uniswap,
            3000,
            "base".into(),
            0,
        );
        PolicyContext {
            event: NormalizedEvent {
                pair_address: format!("{:#x}", Address::ZERO),
                chain_tag: "base".into(),
                last_price: 1.62,
                buy_volume: 5.0,
                sell_volume: 0.0,
                liquidity: 10.0,
                minute_key: 101,
            },
            group: crate::types::Group::seed(1.62),
            groups: vec![],
            pair,
            trade: None,
            prices: HashMap::new(),
            gas: GasSnapshot::default(),
            custom_data: HashMap::new(),
            global_data: HashMap::new(),
        }
    }

    #[test]
    fn missing_predicate_is_no_action() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        let action = sandbox.evaluate(PredicateKind::Entry, "p1", None, &mut ctx);
        assert!(action.is_none());
    }

    #[test]
    fn entry_predicate_fires_on_breakout_scenario_1() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        ctx.group.first_price = 1.0;
        ctx.group.price_change_pct = 62.0;
        let action = sandbox.evaluate(
            PredicateKind::Entry,
            "p1",
            Some("group.price_change_pct > 50 ? 100 : 0"),
            &mut ctx,
        );
        assert_eq!(action.0, 100);
    }

    #[test]
    fn compile_failure_disables_predicate_and_caches_the_failure() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        let action = sandbox.evaluate(PredicateKind::Entry, "bad", Some("(("), &mut ctx);
        assert!(action.is_none());
        // Cached as a compile failure; a second call does not attempt
        // to recompile (no panic / no change in outcome).
        let action2 = sandbox.evaluate(PredicateKind::Entry, "bad", Some("(("), &mut ctx);
        assert!(action2.is_none());
    }

    #[test]
    fn runtime_error_from_disallowed_assignment_is_no_action() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        let action = sandbox.evaluate(
            PredicateKind::Entry,
            "p2",
            Some("pair.symbol = \"X\""),
            &mut ctx,
        );
        assert!(action.is_none());
    }

    #[test]
    fn custom_data_assignment_persists_back_into_context() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        sandbox.evaluate(
            PredicateKind::Entry,
            "p3",
            Some("custom_data.armed = true; 0"),
            &mut ctx,
        );
        assert_eq!(ctx.custom_data.get("armed"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn invalidate_clears_cached_compile_result() {
        let sandbox = PolicySandbox::new();
        let mut ctx = sample_ctx();
        sandbox.evaluate(PredicateKind::Entry, "p4", Some("100"), &mut ctx);
        sandbox.invalidate("p4");
        assert!(sandbox.cache.is_empty());
    }
}
