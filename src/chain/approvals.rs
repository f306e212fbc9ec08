//! Approval manager (C2, spec.md §4.2): idempotent ERC-20 and Permit2
//! allowance top-up.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::primitives::aliases::U48;
use alloy::primitives::{Address, U160, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};

use super::ChainClient;
use crate::contracts::{IERC20, IPermit2};
use crate::error::AgentError;

const ALLOWANCE_RETRIES: u32 = 3;
const ALLOWANCE_RETRY_DELAY: Duration = Duration::from_secs(1);
const APPROVAL_GAS_LIMIT: u64 = 120_000;
const PERMIT2_APPROVAL_GAS_LIMIT: u64 = 120_000;
const PERMIT2_EXPIRATION_SECS: i64 = 30 * 24 * 60 * 60;

/// Ensure `owner` has granted `spender` at least `amount` allowance on
/// `token`. A no-op if the current allowance already suffices;
/// otherwise submits an approval for `uint256::MAX`.
pub async fn ensure_erc20_approval<P: Provider + Clone>(
    chain: &ChainClient<P>,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<()> {
    let erc20 = IERC20::new(token, chain.provider());
    let owner = chain.wallet_address();

    let mut current = U256::ZERO;
    let mut last_err = None;
    for attempt in 1..=ALLOWANCE_RETRIES {
        match erc20.allowance(owner, spender).call().await {
            Ok(v) => {
                current = v;
                last_err = None;
                break;
            }
            Err(e) => {
                last_err = Some(e);
                if attempt < ALLOWANCE_RETRIES {
                    tokio::time::sleep(ALLOWANCE_RETRY_DELAY).await;
                }
            }
        }
    }
    if let Some(e) = last_err {
        return Err(AgentError::Rpc(format!("allowance({token}, {spender}): {e}")).into());
    }

    if current >= amount {
        debug!(%token, %spender, "allowance already sufficient");
        return Ok(());
    }

    info!(%token, %spender, "topping up ERC-20 allowance to u256::MAX");
    let call = erc20.approve(spender, U256::MAX);
    let tx = TransactionRequest::default()
        .to(token)
        .input(call.calldata().clone().into());
    chain
        .submit(tx, APPROVAL_GAS_LIMIT)
        .await
        .context("submitting ERC-20 approval")?;
    Ok(())
}

/// Ensure the Permit2 contract has granted `universal_router` at
/// least `amount` allowance on `token`, with an unexpired expiration.
/// V4 path only.
pub async fn ensure_permit2_approval<P: Provider + Clone>(
    chain: &ChainClient<P>,
    permit2: Address,
    token: Address,
    universal_router: Address,
    amount: u128,
    now_ts: i64,
) -> Result<()> {
    let contract = IPermit2::new(permit2, chain.provider());
    let owner = chain.wallet_address();

    let allowance_result = contract
        .allowance(owner, token, universal_router)
        .call()
        .await
        .map_err(|e| AgentError::Rpc(format!("Permit2 allowance({token}): {e}")))?;
    let (current_amount, expiration, _nonce) = (
        allowance_result.amount,
        allowance_result.expiration,
        allowance_result.nonce,
    );

    let sufficient = u128::try_from(current_amount).unwrap_or(u128::MAX) >= amount
        && (u64::try_from(expiration).unwrap_or(u64::MAX) as i64) > now_ts;
    if sufficient {
        debug!(%token, "Permit2 allowance already sufficient");
        return Ok(());
    }

    info!(%token, "topping up Permit2 allowance");
    let new_expiration = (now_ts + PERMIT2_EXPIRATION_SECS) as u64;
    let call = contract.approve(token, universal_router, U160::MAX, U48::from(new_expiration));
    let tx = TransactionRequest::default()
        .to(permit2)
        .input(call.calldata().clone().into());
    chain
        .submit(tx, PERMIT2_APPROVAL_GAS_LIMIT)
        .await
        .context("submitting Permit2 approval")?;
    Ok(())
}
