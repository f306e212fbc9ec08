//! V2 swap path: the custom swapper proxy (spec.md §4.3).
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};

use super::{SwapAction, SwapOutcome};
use crate::chain::ChainClient;
use crate::contracts::IV2SwapperProxy;
use crate::types::PairState;

const V2_GAS_LIMIT: u64 = 300_000;

pub async fn swap<P: Provider + Clone>(
    chain: &ChainClient<P>,
    pair: &PairState,
    amount_in: U256,
    is_token0_in: bool,
    min_amount_out: U256,
    action: SwapAction,
    proxy_address: Address,
) -> Result<SwapOutcome> {
    let tax_pct = match action {
        SwapAction::Buy => pair.buy_tax,
        SwapAction::Sell => pair.sell_tax,
    };
    let tax_bps = U256::from(tax_pct.round().max(0.0) as u64);

    // A sell reverses the buy direction, same convention used by the
    // V3/V4 paths.
    let direction = match action {
        SwapAction::Buy => is_token0_in,
        SwapAction::Sell => !is_token0_in,
    };

    let proxy = IV2SwapperProxy::new(proxy_address, chain.provider());
    let call = proxy.swap(pair.pair_address, amount_in, min_amount_out, direction, tax_bps);

    let tx = TransactionRequest::default()
        .to(proxy_address)
        .input(call.calldata().clone().into());

    let receipt = chain
        .submit(tx, V2_GAS_LIMIT)
        .await
        .context("submitting V2 swap")?;

    let token_out = if direction { pair.token1 } else { pair.token0 };
    let decimals_out = if direction { pair.token1_decimals } else { pair.token0_decimals };
    let owner = chain.wallet_address();

    let amount_out_raw = super::v3::last_transfer_to(&receipt, token_out, owner)
        .unwrap_or(U256::ZERO);
    let readable_out = raw_to_readable(amount_out_raw, decimals_out);

    Ok(SwapOutcome {
        success: receipt.status(),
        amount_out_raw,
        readable_out,
        error: if receipt.status() { None } else { Some("transaction reverted".into()) },
    })
}

fn raw_to_readable(raw: U256, decimals: u8) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    let raw_f64: f64 = raw.to_string().parse().unwrap_or(0.0);
    raw_f64 / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_to_readable_applies_decimals() {
        let raw = U256::from(1_500_000_000_000_000_000u128);
        assert!((raw_to_readable(raw, 18) - 1.5).abs() < 1e-9);
    }
}
