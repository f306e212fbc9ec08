//! Trade lifecycle (C6, spec.md §4.6): entry/exit dispatch guarded by
//! a per-pair execution lock, plus periodic reconciliation against
//! on-chain balances.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::persistence::{LogEventType, LogStatus, TradeLogRecord};
use crate::chain::approvals::{ensure_erc20_approval, ensure_permit2_approval};
use crate::chain::ChainClient;
use crate::swap::{perform_swap, spender_for, RouterAddresses, SwapAction, SwapOutcome};
use crate::types::{ActiveTrade, CloseReason, Config, InactiveTrade, PairSnapshot, PairState, Protocol};

/// `eth_amount` for a new entry (spec.md §4.6 step 1).
pub fn compute_entry_amount(max_eth_per_trade: f64, action_percent: u8) -> f64 {
    max_eth_per_trade * action_percent.min(100) as f64 / 100.0
}

/// `sell_raw = balance × min(action_percent, 100) / 100` (spec.md
/// §4.6 Exit).
pub fn compute_sell_raw(balance_raw: U256, action_percent: u8) -> U256 {
    let pct = U256::from(action_percent.min(100) as u64);
    balance_raw * pct / U256::from(100u64)
}

/// Entry preconditions (spec.md §4.6): agent not paused, under the
/// position cap, no existing trade on the pair, execution lock free.
pub fn can_enter(paused: bool, active_count: usize, max_positions: usize, already_open: bool, lock_free: bool) -> bool {
    !paused && active_count < max_positions && !already_open && lock_free
}

fn readable_to_raw(amount: f64, decimals: u8) -> U256 {
    let raw = (amount * 10f64.powi(decimals as i32)).round();
    if raw <= 0.0 {
        U256::ZERO
    } else {
        U256::from(raw as u128)
    }
}

/// Convert a live `f64` reading into the `Decimal` persisted on trade
/// records and the trade log.
fn to_decimal(amount: f64) -> Decimal {
    Decimal::from_f64(amount).unwrap_or_default()
}

/// Convert a raw on-chain token amount into its `Decimal` readable
/// form, dividing out `decimals` without the precision loss of
/// round-tripping through `f64`.
fn raw_to_decimal(raw: U256, decimals: u8) -> Decimal {
    let divisor = Decimal::from_str(&format!("1{}", "0".repeat(decimals as usize))).unwrap_or(Decimal::ONE);
    Decimal::from_str(&raw.to_string()).unwrap_or_default() / divisor
}

fn to_datetime(now_ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(now_ts, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

/// Owns the active/inactive trade sets and the per-pair execution
/// lock map. `inactive` is a plain `Mutex<Vec<_>>`, never held across
/// an `.await`, since its operations are push-and-iterate only.
pub struct TradeLifecycle {
    active: DashMap<Address, ActiveTrade>,
    inactive: std::sync::Mutex<Vec<InactiveTrade>>,
    locks: DashMap<Address, Arc<tokio::sync::Mutex<()>>>,
    trade_log_path: std::path::PathBuf,
}

impl TradeLifecycle {
    pub fn new(
        active: std::collections::HashMap<Address, ActiveTrade>,
        inactive: Vec<InactiveTrade>,
        trade_log_path: std::path::PathBuf,
    ) -> Self {
        Self {
            active: active.into_iter().collect(),
            inactive: std::sync::Mutex::new(inactive),
            locks: DashMap::new(),
            trade_log_path,
        }
    }

    pub fn lock_for(&self, pair: Address) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.entry(pair).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn has_active_trade(&self, pair: &Address) -> bool {
        self.active.contains_key(pair)
    }

    /// Whether `pair`'s execution lock is currently held by an
    /// in-flight entry or exit (used by the Control API to return 409
    /// instead of blocking on the lock).
    pub fn is_locked(&self, pair: &Address) -> bool {
        match self.locks.get(pair) {
            Some(lock) => lock.try_lock().is_err(),
            None => false,
        }
    }

    pub fn get_active(&self, pair: &Address) -> Option<ActiveTrade> {
        self.active.get(pair).map(|r| r.clone())
    }

    pub fn snapshot_active(&self) -> std::collections::HashMap<Address, ActiveTrade> {
        self.active.iter().map(|r| (*r.key(), r.value().clone())).collect()
    }

    pub fn snapshot_inactive(&self) -> Vec<InactiveTrade> {
        self.inactive.lock().unwrap().clone()
    }

    /// Entry (spec.md §4.6): acquire the per-pair lock, approve, swap,
    /// record. On swap failure the lock is released and an error is
    /// appended to the trade log; there is no retry at this level.
    /// `eth_amount` is already resolved by the caller: a
    /// policy-driven entry passes `compute_entry_amount(config.
    /// max_eth_per_trade, action_percent)`, a manual `/buy` passes the
    /// request's `ethAmount` directly. `action_percent` is carried
    /// through only for the trade log record.
    pub async fn enter<P: Provider + Clone>(
        &self,
        chain: &ChainClient<P>,
        pair: &PairState,
        config: &Config,
        routers: RouterAddresses,
        eth_amount: f64,
        action_percent: u8,
        policy_id: &str,
        now_ts: i64,
    ) -> Result<SwapOutcome> {
        let lock = self.lock_for(pair.pair_address);
        let _guard = lock.try_lock().map_err(|_| crate::error::AgentError::Locked(pair.pair_address.to_string()))?;

        let base_token = config.base_token_for(pair.token0, pair.token1);
        let is_token0_in = base_token == pair.token0;
        let amount_in = readable_to_raw(eth_amount, if is_token0_in { pair.token0_decimals } else { pair.token1_decimals });

        let spender = spender_for(
            pair.protocol,
            &pair.fork,
            routers.v2_swapper,
            routers.v3_router,
            routers.aerodrome_router,
            routers.universal_router,
            routers.permit2,
        );
        ensure_erc20_approval(chain, base_token, spender, amount_in).await?;
        if pair.protocol == Protocol::V4 {
            ensure_permit2_approval(chain, routers.permit2, base_token, routers.universal_router, u128::MAX, now_ts).await?;
        }

        let outcome = perform_swap(chain, pair, amount_in, is_token0_in, U256::ZERO, SwapAction::Buy, routers, config.v4_simulate).await;

        let record = TradeLogRecord {
            timestamp: to_datetime(now_ts),
            event_type: LogEventType::Buy,
            status: if outcome.success { LogStatus::Success } else { LogStatus::Failed },
            symbol: pair.symbol.clone(),
            pair: pair.pair_address,
            policy_id: policy_id.to_string(),
            action_percent,
            amount_in: to_decimal(eth_amount),
            amount_out: to_decimal(outcome.readable_out),
            error: outcome.error.clone(),
        };

        if outcome.success {
            let trade = ActiveTrade {
                pair: PairSnapshot {
                    pair_address: pair.pair_address,
                    token0: pair.token0,
                    token1: pair.token1,
                    token0_decimals: pair.token0_decimals,
                    token1_decimals: pair.token1_decimals,
                    protocol: pair.protocol,
                    fork: pair.fork.clone(),
                    fee_bps: pair.fee_bps,
                    symbol: pair.symbol.clone(),
                },
                base_token,
                policy_id: policy_id.to_string(),
                entry_price: pair.last_price,
                eth_spent: to_decimal(eth_amount),
                eth_sold: Decimal::ZERO,
                tokens_bought: outcome.readable_out,
                tokens_in_possession: outcome.readable_out,
                tokens_in_possession_raw: outcome.amount_out_raw.to_string(),
                current_price: pair.last_price,
                price_change_pct: 0.0,
                min_price_since_entry: pair.last_price,
                max_price_since_entry: pair.last_price,
                opened_at: now_ts,
            };
            self.active.insert(pair.pair_address, trade);
            info!(pair = %pair.pair_address, eth_amount, "entered trade");
        } else {
            warn!(pair = %pair.pair_address, error = ?outcome.error, "entry swap failed");
        }

        self.append_and_ignore(&record);
        Ok(outcome)
    }

    /// Exit (spec.md §4.6): re-reads the actual on-chain balance
    /// before acting. A zero balance closes the trade immediately
    /// without a swap.
    pub async fn exit<P: Provider + Clone>(
        &self,
        chain: &ChainClient<P>,
        pair: &PairState,
        config: &Config,
        routers: RouterAddresses,
        action_percent: u8,
        now_ts: i64,
    ) -> Result<Option<SwapOutcome>> {
        let lock = self.lock_for(pair.pair_address);
        let _guard = lock.try_lock().map_err(|_| crate::error::AgentError::Locked(pair.pair_address.to_string()))?;

        let Some(trade) = self.get_active(&pair.pair_address) else {
            return Ok(None);
        };
        let is_token0_out = trade.base_token == pair.token0;
        let (token_held, decimals_held) = if is_token0_out { (pair.token1, pair.token1_decimals) } else { (pair.token0, pair.token0_decimals) };

        let balance_raw = chain.balance_of(token_held, chain.wallet_address()).await?;
        if balance_raw.is_zero() {
            let closed = InactiveTrade::close(trade, pair.last_price, now_ts, CloseReason::ZeroBalance);
            self.active.remove(&pair.pair_address);
            self.inactive.lock().unwrap().push(closed);
            info!(pair = %pair.pair_address, "zero balance on exit; archived");
            return Ok(None);
        }

        let sell_raw = compute_sell_raw(balance_raw, action_percent);
        if sell_raw.is_zero() {
            return Ok(None);
        }

        let spender = spender_for(
            pair.protocol,
            &pair.fork,
            routers.v2_swapper,
            routers.v3_router,
            routers.aerodrome_router,
            routers.universal_router,
            routers.permit2,
        );
        ensure_erc20_approval(chain, token_held, spender, sell_raw).await?;
        if pair.protocol == Protocol::V4 {
            ensure_permit2_approval(chain, routers.permit2, token_held, routers.universal_router, u128::MAX, now_ts).await?;
        }

        let outcome = perform_swap(chain, pair, sell_raw, is_token0_out, U256::ZERO, SwapAction::Sell, routers, config.v4_simulate).await;

        let record = TradeLogRecord {
            timestamp: to_datetime(now_ts),
            event_type: LogEventType::Sell,
            status: if outcome.success { LogStatus::Success } else { LogStatus::Failed },
            symbol: pair.symbol.clone(),
            pair: pair.pair_address,
            policy_id: trade.policy_id.clone(),
            action_percent,
            amount_in: raw_to_decimal(sell_raw, decimals_held),
            amount_out: to_decimal(outcome.readable_out),
            error: outcome.error.clone(),
        };
        self.append_and_ignore(&record);

        if outcome.success {
            let mut updated = trade;
            updated.eth_sold += to_decimal(outcome.readable_out);
            if action_percent >= 100 {
                let closed = InactiveTrade::close(updated, pair.last_price, now_ts, CloseReason::PolicyExit);
                self.active.remove(&pair.pair_address);
                self.inactive.lock().unwrap().push(closed);
                info!(pair = %pair.pair_address, "exited trade fully");
            } else {
                let remaining_raw = balance_raw - sell_raw;
                let remaining = remaining_raw.to_string().parse::<f64>().unwrap_or(0.0) / 10f64.powi(decimals_held as i32);
                updated.tokens_in_possession = remaining;
                updated.tokens_in_possession_raw = remaining_raw.to_string();
                self.active.insert(pair.pair_address, updated);
                info!(pair = %pair.pair_address, action_percent, "partial exit");
            }
        }

        Ok(Some(outcome))
    }

    /// Reconciliation (spec.md §4.6): on startup and every 5 minutes,
    /// re-read each ActiveTrade's on-chain balance; archive on zero,
    /// otherwise refresh `tokens_in_possession`. Returns whether any
    /// trade changed (callers use this to decide whether to persist).
    pub async fn reconcile<P: Provider + Clone>(&self, chain: &ChainClient<P>, now_ts: i64) -> bool {
        let pairs: Vec<Address> = self.active.iter().map(|r| *r.key()).collect();
        let mut changed = false;
        for pair_address in pairs {
            let Some(trade) = self.get_active(&pair_address) else { continue };
            let is_token0_out = trade.base_token == trade.pair.token0;
            let token_held = if is_token0_out { trade.pair.token1 } else { trade.pair.token0 };
            let decimals_held = if is_token0_out { trade.pair.token1_decimals } else { trade.pair.token0_decimals };

            let balance_raw = match chain.balance_of(token_held, chain.wallet_address()).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(%pair_address, error = %e, "reconciliation balance read failed");
                    continue;
                }
            };

            if balance_raw.is_zero() {
                let fallback_price = trade_price_fallback(&trade);
                let closed = InactiveTrade::close(trade, fallback_price, now_ts, CloseReason::ZeroBalance);
                self.active.remove(&pair_address);
                self.inactive.lock().unwrap().push(closed);
                changed = true;
                continue;
            }

            let readable = balance_raw.to_string().parse::<f64>().unwrap_or(0.0) / 10f64.powi(decimals_held as i32);
            if (readable - trade.tokens_in_possession).abs() > f64::EPSILON {
                let mut updated = trade;
                updated.tokens_in_possession = readable;
                updated.tokens_in_possession_raw = balance_raw.to_string();
                self.active.insert(pair_address, updated);
                changed = true;
            }
        }
        changed
    }

    fn append_and_ignore(&self, record: &TradeLogRecord) {
        if let Err(e) = super::persistence::append_trade_log(&self.trade_log_path, record) {
            warn!(error = %e, "failed to append trade log record");
        }
    }
}

fn trade_price_fallback(trade: &ActiveTrade) -> f64 {
    trade.current_price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_amount_scales_by_action_percent() {
        assert_eq!(compute_entry_amount(0.01, 50), 0.005);
        assert_eq!(compute_entry_amount(0.01, 100), 0.01);
    }

    #[test]
    fn sell_raw_is_proportional_to_balance() {
        let balance = U256::from(1000u64);
        assert_eq!(compute_sell_raw(balance, 50), U256::from(500u64));
        assert_eq!(compute_sell_raw(balance, 150), U256::from(1000u64));
        assert_eq!(compute_sell_raw(balance, 0), U256::ZERO);
    }

    #[test]
    fn cannot_enter_when_paused() {
        assert!(!can_enter(true, 0, 5, false, true));
    }

    #[test]
    fn cannot_enter_past_position_cap() {
        assert!(!can_enter(false, 5, 5, false, true));
    }

    #[test]
    fn cannot_enter_when_already_open_or_locked() {
        assert!(!can_enter(false, 0, 5, true, true));
        assert!(!can_enter(false, 0, 5, false, false));
    }

    #[test]
    fn can_enter_when_all_preconditions_hold() {
        assert!(can_enter(false, 2, 5, false, true));
    }

    #[test]
    fn lock_for_returns_same_mutex_for_same_pair() {
        let lifecycle = TradeLifecycle::new(Default::default(), Vec::new(), std::path::PathBuf::from("/tmp/unused.jsonl"));
        let pair = Address::repeat_byte(1);
        let a = lifecycle.lock_for(pair);
        let b = lifecycle.lock_for(pair);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
