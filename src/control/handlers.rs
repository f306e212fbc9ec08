//! Control API route handlers (spec.md §4.8's endpoint table).
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::Address;
use alloy::providers::Provider;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::AppState;
use crate::error::AgentError;
use crate::swap::SwapOutcome;

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn parse_pair(s: &str) -> Result<Address, AgentError> {
    s.parse().map_err(|_| AgentError::BadRequest(format!("malformed pair address: {s}")))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub paused: bool,
    pub uptime_secs: i64,
    pub pair_count: usize,
    pub wallet_address: String,
    pub active_trades: usize,
    pub summary: crate::trade::summary::Summary,
}

pub async fn status<P: Provider + Clone>(State(state): State<Arc<AppState<P>>>) -> Json<StatusResponse> {
    let (pair_count, _) = state.aggregation.stats();
    Json(StatusResponse {
        paused: state.paused.load(Ordering::SeqCst),
        uptime_secs: now_ts() - state.started_at,
        pair_count,
        wallet_address: state.chain.wallet_address().to_string(),
        active_trades: state.trades.lifecycle.active_count(),
        summary: state.trades.summary(),
    })
}

#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub summary: crate::trade::summary::Summary,
    pub open: Vec<crate::types::ActiveTrade>,
    pub closed: Vec<crate::types::InactiveTrade>,
}

pub async fn trades<P: Provider + Clone>(State(state): State<Arc<AppState<P>>>) -> Json<TradesResponse> {
    Json(TradesResponse {
        summary: state.trades.summary(),
        open: state.trades.lifecycle.snapshot_active().into_values().collect(),
        closed: state.trades.lifecycle.snapshot_inactive(),
    })
}

#[derive(Debug, Serialize)]
pub struct BalanceEntry {
    pub pair: Address,
    pub token: Address,
    pub readable: f64,
}

pub async fn balances<P: Provider + Clone>(
    State(state): State<Arc<AppState<P>>>,
) -> Result<Json<Vec<BalanceEntry>>, AgentError> {
    let changed = state.trades.lifecycle.reconcile(&state.chain, now_ts()).await;
    if changed {
        let _ = state.trades.persist();
    }
    let entries = state
        .trades
        .lifecycle
        .snapshot_active()
        .into_iter()
        .map(|(pair, trade)| BalanceEntry {
            pair,
            token: if trade.base_token == trade.pair.token0 { trade.pair.token1 } else { trade.pair.token0 },
            readable: trade.tokens_in_possession,
        })
        .collect();
    Ok(Json(entries))
}

pub async fn get_config<P: Provider + Clone>(State(state): State<Arc<AppState<P>>>) -> Json<crate::types::Config> {
    Json(state.config.read().await.clone())
}

pub async fn post_config<P: Provider + Clone>(
    State(state): State<Arc<AppState<P>>>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<crate::types::Config>, AgentError> {
    let mut cfg = state.config.write().await;
    cfg.apply_patch(&patch);
    crate::config::save_config_file(&state.config_path, &cfg).map_err(|e| AgentError::Persistence(e.to_string()))?;
    Ok(Json(cfg.clone()))
}

pub async fn pause<P: Provider + Clone>(State(state): State<Arc<AppState<P>>>) -> Json<serde_json::Value> {
    state.paused.store(true, Ordering::SeqCst);
    Json(serde_json::json!({"paused": true}))
}

pub async fn resume<P: Provider + Clone>(State(state): State<Arc<AppState<P>>>) -> Json<serde_json::Value> {
    state.paused.store(false, Ordering::SeqCst);
    Json(serde_json::json!({"paused": false}))
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub pair: String,
    pub percent: u8,
}

async fn sell_one<P: Provider + Clone>(
    state: &AppState<P>,
    pair_address: Address,
    percent: u8,
) -> Result<SwapOutcome, AgentError> {
    if state.trades.lifecycle.is_locked(&pair_address) {
        return Err(AgentError::Locked(pair_address.to_string()));
    }
    if !state.trades.lifecycle.has_active_trade(&pair_address) {
        return Err(AgentError::NoSuchTrade(pair_address.to_string()));
    }
    let pair = state
        .aggregation
        .get(&pair_address)
        .ok_or_else(|| AgentError::UnknownPair(pair_address.to_string()))?;
    let cfg = state.config.read().await;
    let outcome = state
        .trades
        .lifecycle
        .exit(&state.chain, &pair, &cfg, state.routers, percent, now_ts())
        .await
        .map_err(|e| AgentError::SwapExecution(e.to_string()))?;
    let _ = state.trades.persist();
    // `None` means the position was archived on a zero on-chain
    // balance without a swap (spec.md §4.6 Exit) — report that as a
    // no-op success rather than an error.
    Ok(outcome.unwrap_or(SwapOutcome { success: true, amount_out_raw: alloy::primitives::U256::ZERO, readable_out: 0.0, error: None }))
}

pub async fn sell<P: Provider + Clone>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<SellRequest>,
) -> Result<Json<SwapOutcome>, AgentError> {
    if !(1..=100).contains(&req.percent) {
        return Err(AgentError::BadRequest("percent must be in (0, 100]".into()));
    }
    let pair_address = parse_pair(&req.pair)?;
    let outcome = sell_one(&state, pair_address, req.percent).await?;
    Ok(Json(outcome))
}

pub async fn sell_all<P: Provider + Clone>(
    State(state): State<Arc<AppState<P>>>,
) -> Json<Vec<(Address, Result<SwapOutcome, String>)>> {
    let pairs: Vec<Address> = state.trades.lifecycle.snapshot_active().into_keys().collect();
    let mut results = Vec::with_capacity(pairs.len());
    for pair_address in pairs {
        let result = sell_one(&state, pair_address, 100).await.map_err(|e| e.to_string());
        results.push((pair_address, result));
    }
    Json(results)
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub pair: String,
    #[serde(rename = "ethAmount")]
    pub eth_amount: f64,
}

pub async fn buy<P: Provider + Clone>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<BuyRequest>,
) -> Result<Json<SwapOutcome>, AgentError> {
    if req.eth_amount <= 0.0 {
        return Err(AgentError::BadRequest("ethAmount must be positive".into()));
    }
    let pair_address = parse_pair(&req.pair)?;
    if state.trades.lifecycle.has_active_trade(&pair_address) {
        return Err(AgentError::Locked(format!("trade already open on pair {pair_address}")));
    }
    if state.trades.lifecycle.is_locked(&pair_address) {
        return Err(AgentError::Locked(pair_address.to_string()));
    }
    let pair = state
        .aggregation
        .get(&pair_address)
        .ok_or_else(|| AgentError::UnknownPair(pair_address.to_string()))?;
    let cfg = state.config.read().await;

    // `enter` handles the approval dance (including Permit2 for V4)
    // internally; a manual buy differs from a policy-driven one only
    // in where `eth_amount` comes from.
    let outcome = state
        .trades
        .lifecycle
        .enter(&state.chain, &pair, &cfg, state.routers, req.eth_amount, 100, "manual", now_ts())
        .await
        .map_err(|e| AgentError::SwapExecution(e.to_string()))?;
    let _ = state.trades.persist();
    Ok(Json(outcome))
}
