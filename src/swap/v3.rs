//! V3 swap path: Uniswap V3 / Aerodrome V3 routers (spec.md §4.3).
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::{Address, Signed, Uint, B256, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{SwapAction, SwapOutcome};
use crate::chain::ChainClient;
use crate::contracts::{IAerodromeV3Router, IERC20, IUniswapV3Pool, IUniswapV3SwapRouter};
use crate::types::{Fork, PairState};

const V3_GAS_LIMIT: u64 = 800_000;
const V3_DEADLINE_SECS: u64 = 30;

pub async fn swap<P: Provider + Clone>(
    chain: &ChainClient<P>,
    pair: &PairState,
    amount_in: U256,
    is_token0_in: bool,
    min_amount_out: U256,
    action: SwapAction,
    router_v3: Address,
    router_aerodrome: Address,
) -> Result<SwapOutcome> {
    let direction_in = match action {
        SwapAction::Buy => is_token0_in,
        SwapAction::Sell => !is_token0_in,
    };
    let (token_in, token_out, decimals_out) = if direction_in {
        (pair.token0, pair.token1, pair.token1_decimals)
    } else {
        (pair.token1, pair.token0, pair.token0_decimals)
    };

    let owner = chain.wallet_address();
    let deadline = U256::from(now_secs() + V3_DEADLINE_SECS);

    let (router_address, calldata) = match pair.fork {
        Fork::Aerodrome => {
            let tick_spacing = pair.tick_spacing.unwrap_or_else(|| default_tick_spacing(pair.fee_bps));
            let router = IAerodromeV3Router::new(router_aerodrome, chain.provider());
            let call = router.exactInputSingle(IAerodromeV3Router::ExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                tickSpacing: Signed::<24, 1>::try_from(tick_spacing).unwrap_or_default(),
                recipient: owner,
                deadline,
                amountIn: amount_in,
                amountOutMinimum: min_amount_out,
                sqrtPriceLimitX96: Uint::<160, 3>::ZERO,
            });
            (router_aerodrome, call.calldata().clone())
        }
        _ => {
            let fee = Uint::<24, 1>::from(pair.fee_bps);
            let router = IUniswapV3SwapRouter::new(router_v3, chain.provider());
            let call = router.exactInputSingle(IUniswapV3SwapRouter::ExactInputSingleParams {
                tokenIn: token_in,
                tokenOut: token_out,
                fee,
                recipient: owner,
                deadline,
                amountIn: amount_in,
                amountOutMinimum: min_amount_out,
                sqrtPriceLimitX96: Uint::<160, 3>::ZERO,
            });
            (router_v3, call.calldata().clone())
        }
    };

    let tx = TransactionRequest::default().to(router_address).input(calldata.into());
    let receipt = chain.submit(tx, V3_GAS_LIMIT).await.context("submitting V3 swap")?;

    let amount_out_raw = parse_swap_log(&receipt, pair.pair_address, direction_in)
        .or_else(|| last_transfer_to(&receipt, token_out, owner))
        .unwrap_or(U256::ZERO);
    let readable_out = raw_to_readable(amount_out_raw, decimals_out);

    Ok(SwapOutcome {
        success: receipt.status(),
        amount_out_raw,
        readable_out,
        error: if receipt.status() { None } else { Some("transaction reverted".into()) },
    })
}

/// Default tick spacing per fee tier (spec.md §4.3), used when a
/// pair's `tick_spacing` has not yet been observed/cached.
pub fn default_tick_spacing(fee_bps: u32) -> i32 {
    match fee_bps {
        100 => 1,
        500 => 10,
        3000 => 60,
        10000 => 200,
        _ => 60,
    }
}

/// Parse the pool's `Swap` event from a receipt: `amount0`/`amount1`
/// are signed two's-complement int256 values; `amount_out = |amount1|`
/// if token0 was the input, else `|amount0|`.
pub fn parse_swap_log(receipt: &TransactionReceipt, pool: Address, token0_was_input: bool) -> Option<U256> {
    for log in receipt.inner.logs() {
        if log.address() != pool {
            continue;
        }
        if let Ok(decoded) = IUniswapV3Pool::Swap::decode_log(&log.inner) {
            let out = if token0_was_input { decoded.amount1 } else { decoded.amount0 };
            return Some(abs_i256(out));
        }
    }
    None
}

fn abs_i256(v: Signed<256, 4>) -> U256 {
    if v.is_negative() {
        (-v).into_raw()
    } else {
        v.into_raw()
    }
}

/// Find the last `Transfer` log to `owner` in a receipt. Used as the
/// V2 path's primary result source and the V3/V4 paths' fallback.
pub fn last_transfer_to(receipt: &TransactionReceipt, token: Address, owner: Address) -> Option<U256> {
    let mut found = None;
    for log in receipt.inner.logs() {
        if log.address() != token {
            continue;
        }
        if let Ok(decoded) = IERC20::Transfer::decode_log(&log.inner) {
            if decoded.to == owner {
                found = Some(decoded.value);
            }
        }
    }
    found
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
    fn default_tick_spacing_matches_known_fee_tiers() {
        assert_eq!(default_tick_spacing(100), 1);
        assert_eq!(default_tick_spacing(500), 10);
        assert_eq!(default_tick_spacing(3000), 60);
        assert_eq!(default_tick_spacing(10000), 200);
        assert_eq!(default_tick_spacing(9999), 60);
    }

    #[test]
    fn abs_i256_handles_negative_twos_complement_value() {
        let negative = Signed::<256, 4>::try_from(-1_000_i64).unwrap();
        assert_eq!(abs_i256(negative), U256::from(1000u64));
        let positive = Signed::<256, 4>::try_from(1_000_i64).unwrap();
        assert_eq!(abs_i256(positive), U256::from(1000u64));
    }

    #[test]
    fn raw_to_readable_applies_decimals() {
        let raw = U256::from(2_000_000u64); // 2 tokens at 6 decimals
        assert!((raw_to_readable(raw, 6) - 2.0).abs() < 1e-9);
    }
}
