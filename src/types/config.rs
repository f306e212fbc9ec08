//! Config — the agent's user-tunable parameters (spec.md §3).
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub entry_predicate: Option<String>,
    #[serde(default)]
    pub exit_predicate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub max_eth_per_trade: f64,
    /// Stored and round-tripped through the Control API; not read by
    /// any swap path (see SPEC_FULL.md / DESIGN.md open-question note
    /// on slippage — min_amount_out is always 0).
    pub slippage: f64,
    pub max_positions: usize,
    pub group_interval: i64,
    pub max_groups: usize,
    #[serde(default)]
    pub only_pairs: Vec<String>,
    #[serde(default)]
    pub exclude_pairs: Vec<String>,
    #[serde(default)]
    pub policies: Vec<Policy>,

    /// Whether the V4 path attempts a staticCall simulation before
    /// submitting. Default true preserves the source behavior of
    /// logging-but-not-blocking on simulation failure; set false to
    /// skip simulation entirely. See SPEC_FULL.md §9 open question.
    #[serde(default = "default_true")]
    pub v4_simulate: bool,

    /// Base-token candidates checked against a pair's `{token0,
    /// token1}` in order (spec.md §4.6 step 2): the first one present
    /// wins, `weth` is the fallback. `Address::ZERO` means
    /// "unconfigured" and is never matched.
    #[serde(default)]
    pub zora_address: alloy::primitives::Address,
    #[serde(default)]
    pub clanker_address: alloy::primitives::Address,
    #[serde(default = "default_weth")]
    pub weth_address: alloy::primitives::Address,
}

fn default_weth() -> alloy::primitives::Address {
    // Base mainnet canonical WETH.
    "0x4200000000000000000000000000000000000006".parse().unwrap()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_eth_per_trade: 0.01,
            slippage: 0.05,
            max_positions: 5,
            group_interval: 1,
            max_groups: 60,
            only_pairs: Vec::new(),
            exclude_pairs: Vec::new(),
            policies: Vec::new(),
            v4_simulate: true,
            zora_address: alloy::primitives::Address::ZERO,
            clanker_address: alloy::primitives::Address::ZERO,
            weth_address: default_weth(),
        }
    }
}

impl Config {
    /// Base token for a pair per spec.md §4.6 step 2: the first of
    /// `{zora, clanker}` present in `{token0, token1}`, else WETH.
    pub fn base_token_for(&self, token0: alloy::primitives::Address, token1: alloy::primitives::Address) -> alloy::primitives::Address {
        for candidate in [self.zora_address, self.clanker_address] {
            if candidate != alloy::primitives::Address::ZERO && (candidate == token0 || candidate == token1) {
                return candidate;
            }
        }
        self.weth_address
    }
}

impl Config {
    /// Keys accepted by `POST /config` (spec.md §4.8). Anything else
    /// in the request body is ignored, not an error.
    pub const WHITELISTED_KEYS: &'static [&'static str] = &[
        "max_eth_per_trade",
        "slippage",
        "max_positions",
        "group_interval",
        "max_groups",
        "only_pairs",
        "exclude_pairs",
    ];

    pub fn pair_allowed(&self, pair_address_lower: &str) -> bool {
        if !self.only_pairs.is_empty() && !self.only_pairs.iter().any(|p| p == pair_address_lower) {
            return false;
        }
        if self.exclude_pairs.iter().any(|p| p == pair_address_lower) {
            return false;
        }
        true
    }

    /// Apply a whitelisted-key patch from `POST /config`. Unknown keys
    /// are silently ignored; values of the wrong shape are ignored per
    /// field rather than failing the whole patch.
    pub fn apply_patch(&mut self, patch: &serde_json::Value) {
        let obj = match patch.as_object() {
            Some(o) => o,
            None => return,
        };
        if let Some(v) = obj.get("max_eth_per_trade").and_then(|v| v.as_f64()) {
            self.max_eth_per_trade = v;
        }
        if let Some(v) = obj.get("slippage").and_then(|v| v.as_f64()) {
            self.slippage = v;
        }
        if let Some(v) = obj.get("max_positions").and_then(|v| v.as_u64()) {
            self.max_positions = v as usize;
        }
        if let Some(v) = obj.get("group_interval").and_then(|v| v.as_i64()) {
            self.group_interval = v;
        }
        if let Some(v) = obj.get("max_groups").and_then(|v| v.as_u64()) {
            self.max_groups = v as usize;
        }
        if let Some(v) = obj.get("only_pairs").and_then(|v| v.as_array()) {
            self.only_pairs = v
                .iter()
                .filter_map(|x| x.as_str().map(|s| s.to_lowercase()))
                .collect();
        }
        if let Some(v) = obj.get("exclude_pairs").and_then(|v| v.as_array()) {
            self.exclude_pairs = v
                .iter()
                .filter_map(|x| x.as_str().map(|s| s.to_lowercase()))
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_filter_only_pairs_takes_precedence_when_set() {
        let mut c = Config::default();
        c.only_pairs = vec!["0xaaa".into()];
        assert!(c.pair_allowed("0xaaa"));
        assert!(!c.pair_allowed("0xbbb"));
    }

    #[test]
    fn pair_filter_exclude_pairs_blocks() {
        let mut c = Config::default();
        c.exclude_pairs = vec!["0xbbb".into()];
        assert!(c.pair_allowed("0xaaa"));
        assert!(!c.pair_allowed("0xbbb"));
    }

    #[test]
    fn apply_patch_ignores_unknown_keys() {
        let mut c = Config::default();
        let before = c.max_positions;
        c.apply_patch(&json!({"not_a_real_key": 123}));
        assert_eq!(c.max_positions, before);
    }

    #[test]
    fn base_token_prefers_zora_over_clanker_over_weth() {
        let mut c = Config::default();
        let zora: alloy::primitives::Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let other: alloy::primitives::Address = "0x2222222222222222222222222222222222222222".parse().unwrap();
        c.zora_address = zora;
        assert_eq!(c.base_token_for(other, zora), zora);
        assert_eq!(c.base_token_for(other, other), c.weth_address);
    }

    #[test]
    fn apply_patch_updates_whitelisted_keys() {
        let mut c = Config::default();
        c.apply_patch(&json!({"max_eth_per_trade": 0.02, "max_positions": 10}));
        assert_eq!(c.max_eth_per_trade, 0.02);
        assert_eq!(c.max_positions, 10);
    }
}
