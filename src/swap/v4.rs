//! V4 swap path: the Universal Router + Permit2 (spec.md §4.3).
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use super::v3::{default_tick_spacing, last_transfer_to, parse_swap_log};
use super::{SwapAction, SwapOutcome};
use crate::chain::ChainClient;
use crate::contracts::IUniversalRouter;
use crate::types::PairState;

const V4_GAS_LIMIT: u64 = 800_000;
const V4_DEADLINE_SECS: u64 = 60;

const CMD_V4_SWAP: u8 = 0x10;
const ACTION_SWAP_EXACT_IN_SINGLE: u8 = 0x06;
const ACTION_SETTLE_ALL: u8 = 0x0c;
const ACTION_TAKE_ALL: u8 = 0x0f;

pub async fn swap<P: Provider + Clone>(
    chain: &ChainClient<P>,
    pair: &PairState,
    amount_in: U256,
    is_token0_in: bool,
    min_amount_out: U256,
    action: SwapAction,
    universal_router: Address,
    v4_simulate: bool,
) -> Result<SwapOutcome> {
    let direction_in = match action {
        SwapAction::Buy => is_token0_in,
        SwapAction::Sell => !is_token0_in,
    };

    // Canonical currency ordering: sorted(token0, token1).
    let (currency0, currency1) = if pair.token0 <= pair.token1 {
        (pair.token0, pair.token1)
    } else {
        (pair.token1, pair.token0)
    };
    let zero_for_one = if direction_in { pair.token0 } else { pair.token1 } == currency0;

    let tick_spacing = pair.tick_spacing.unwrap_or_else(|| default_tick_spacing(pair.fee_bps));
    let hooks = pair.hooks.unwrap_or(Address::ZERO);

    let (commands, inputs) = build_v4_swap(
        currency0,
        currency1,
        pair.fee_bps,
        tick_spacing,
        hooks,
        zero_for_one,
        amount_in,
        min_amount_out,
    );
    let deadline = U256::from(now_secs() + V4_DEADLINE_SECS);

    let router = IUniversalRouter::new(universal_router, chain.provider());

    if v4_simulate {
        let call = router.execute(commands.clone(), inputs.clone(), deadline);
        if let Err(e) = call.call().await {
            warn!(pair = %pair.pair_address, error = %e, "V4 staticCall simulation failed; proceeding anyway");
        }
    }

    let call = router.execute(commands, inputs, deadline);
    let tx = TransactionRequest::default()
        .to(universal_router)
        .input(call.calldata().clone().into());

    let receipt = chain.submit(tx, V4_GAS_LIMIT).await.context("submitting V4 swap")?;

    let (token_out, decimals_out) = if direction_in {
        (pair.token1, pair.token1_decimals)
    } else {
        (pair.token0, pair.token0_decimals)
    };
    let owner = chain.wallet_address();

    // Result parsed from the last Transfer to owner; fall back to V3
    // Swap-log parsing if no Transfer log is present.
    let amount_out_raw = last_transfer_to(&receipt, token_out, owner)
        .or_else(|| parse_swap_log(&receipt, pair.pair_address, direction_in))
        .unwrap_or(U256::ZERO);
    let readable_out = raw_to_readable(amount_out_raw, decimals_out);

    Ok(SwapOutcome {
        success: receipt.status(),
        amount_out_raw,
        readable_out,
        error: if receipt.status() { None } else { Some("transaction reverted".into()) },
    })
}

/// Build the Universal Router `commands`/`inputs` pair for a single
/// V4_SWAP wrapping SWAP_EXACT_IN_SINGLE + SETTLE_ALL + TAKE_ALL
/// (spec.md §4.3).
fn build_v4_swap(
    currency0: Address,
    currency1: Address,
    fee_bps: u32,
    tick_spacing: i32,
    hooks: Address,
    zero_for_one: bool,
    amount_in: U256,
    min_amount_out: U256,
) -> (Bytes, Vec<Bytes>) {
    use alloy::sol_types::SolValue;

    let pool_key = (currency0, currency1, fee_bps, tick_spacing, hooks);
    let swap_params = (zero_for_one, amount_in, min_amount_out);
    let exact_in_single = (pool_key, swap_params, Bytes::new());
    let settle_all = (if zero_for_one { currency0 } else { currency1 }, amount_in);
    let take_all = (if zero_for_one { currency1 } else { currency0 }, min_amount_out);

    let actions = Bytes::from(vec![ACTION_SWAP_EXACT_IN_SINGLE, ACTION_SETTLE_ALL, ACTION_TAKE_ALL]);
    let action_inputs = vec![
        Bytes::from(exact_in_single.abi_encode()),
        Bytes::from(settle_all.abi_encode()),
        Bytes::from(take_all.abi_encode()),
    ];
    let v4_swap_input = Bytes::from((actions, action_inputs).abi_encode());

    let commands = Bytes::from(vec![CMD_V4_SWAP]);
    (commands, vec![v4_swap_input])
}

fn raw_to_readable(raw: U256, decimals: u8) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let raw_f64: f64 = raw.to_string().parse().unwrap_or(0.0);
    raw_f64 / scale
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_v4_swap_produces_single_v4_swap_command() {
        let (commands, inputs) = build_v4_swap(
            Address::ZERO,
            Address::repeat_byte(1),
            3000,
            60,
            Address::ZERO,
            true,
            U256::from(1000u64),
            U256::ZERO,
        );
        assert_eq!(commands.as_ref(), &[CMD_V4_SWAP]);
        assert_eq!(inputs.len(), 1);
    }

    #[test]
    fn canonical_ordering_sorts_tokens() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let (c0, c1) = if a <= b { (a, b) } else { (b, a) };
        assert!(c0 <= c1);
    }
}
