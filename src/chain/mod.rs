//! Chain client (C1, spec.md §4.1): fee estimation, nonce tracking,
//! balance reads, and retrying submission.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod approvals;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::contracts::IERC20;
use crate::error::AgentError;

/// `(max_fee_per_gas, max_priority_fee_per_gas)` in wei.
#[derive(Debug, Clone, Copy)]
pub struct FeeSuggestion {
    pub max_fee: u128,
    pub priority_fee: u128,
}

const GWEI: u128 = 1_000_000_000;
const FALLBACK_MAX_FEE_GWEI: u128 = 5; // 0.05 gwei, expressed in 1/100 gwei units below
const FALLBACK_PRIORITY_FEE_GWEI: u128 = 1; // 0.001 gwei, expressed in 1/1000 gwei units below

/// Wraps a connected alloy provider and wallet with the retry and
/// fee-suggestion policy of spec.md §4.1. Built on `ProviderBuilder`
/// over a WebSocket transport, the same construction the teacher uses
/// in its mempool observation loop, generalized here to also carry a
/// signer for transaction submission.
pub struct ChainClient<P: Provider + Clone> {
    provider: P,
    wallet_address: Address,
    nonce: AtomicU64,
}

impl<P: Provider + Clone> ChainClient<P> {
    pub fn new(provider: P, wallet_address: Address, starting_nonce: u64) -> Self {
        Self {
            provider,
            wallet_address,
            nonce: AtomicU64::new(starting_nonce),
        }
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet_address
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Compute max_fee/priority_fee per spec.md §4.1: base = latest
    /// gas price; priority = max(0.01 gwei, reported priority fee,
    /// 10% of base); both multiplied by 1.01. Falls back to
    /// 0.05/0.001 gwei on RPC failure.
    pub async fn fee_suggestion(&self) -> FeeSuggestion {
        match self.provider.get_gas_price().await {
            Ok(base) => {
                let reported_priority = self.provider.get_max_priority_fee_per_gas().await.unwrap_or(0);
                let ten_pct_base = base / 10;
                let min_priority = GWEI / 100; // 0.01 gwei
                let priority = min_priority.max(reported_priority).max(ten_pct_base);
                FeeSuggestion {
                    max_fee: (base * 101) / 100,
                    priority_fee: (priority * 101) / 100,
                }
            }
            Err(e) => {
                warn!(error = %e, "fee suggestion RPC failed; using fallback");
                FeeSuggestion {
                    max_fee: FALLBACK_MAX_FEE_GWEI * GWEI / 100,
                    priority_fee: FALLBACK_PRIORITY_FEE_GWEI * GWEI / 1000,
                }
            }
        }
    }

    /// Next nonce to use, issued monotonically from this process's
    /// in-memory counter (spec.md §5: nonces issued strictly
    /// monotonically from a single source).
    pub fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Re-read the nonce from the latest-block tag, used on the
    /// "nonce too low" retry path only.
    pub async fn refresh_nonce(&self) -> Result<u64> {
        let n = self
            .provider
            .get_transaction_count(self.wallet_address)
            .await
            .context("refreshing nonce")?;
        self.nonce.store(n, Ordering::SeqCst);
        Ok(n)
    }

    pub async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.provider
            .get_balance(owner)
            .await
            .map_err(|e| AgentError::Rpc(format!("native balance: {e}")).into())
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = IERC20::new(token, &self.provider);
        erc20
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| AgentError::Rpc(format!("balanceOf({token}): {e}")).into())
    }

    pub async fn decimals(&self, token: Address) -> Result<u8> {
        let erc20 = IERC20::new(token, &self.provider);
        erc20
            .decimals()
            .call()
            .await
            .map_err(|e| AgentError::Rpc(format!("decimals({token}): {e}")).into())
    }

    /// Submit a partially-built transaction request, filling nonce and
    /// fee fields, with the retry policy of spec.md §4.1: up to 3
    /// attempts; re-fetch nonce on "nonce too low"/"nonce expired";
    /// sleep 250ms and retry on generic network error; any other
    /// failure is terminal. Each attempt rebuilds the fee suggestion.
    pub async fn submit(&self, mut tx: TransactionRequest, gas_limit: u64) -> Result<TransactionReceipt> {
        const MAX_RETRIES: u32 = 3;
        let mut last_err: Option<anyhow::Error> = None;

        for attempt in 1..=MAX_RETRIES {
            let fee = self.fee_suggestion().await;
            let nonce = self.nonce.load(Ordering::SeqCst);
            tx = tx
                .with_nonce(nonce)
                .with_gas_limit(gas_limit)
                .with_max_fee_per_gas(fee.max_fee)
                .with_max_priority_fee_per_gas(fee.priority_fee);

            match self.provider.send_transaction(tx.clone()).await {
                Ok(pending) => {
                    let hash = *pending.tx_hash();
                    debug!(?hash, attempt, "transaction submitted");
                    match pending.get_receipt().await {
                        Ok(receipt) => {
                            self.nonce.fetch_add(1, Ordering::SeqCst);
                            return Ok(receipt);
                        }
                        Err(e) => {
                            last_err = Some(AgentError::Rpc(format!("receipt wait failed: {e}")).into());
                        }
                    }
                }
                Err(e) => {
                    let msg = e.to_string();
                    if msg.contains("nonce too low") || msg.contains("nonce expired") {
                        warn!(attempt, "nonce stale; refreshing and retrying");
                        if let Err(refresh_err) = self.refresh_nonce().await {
                            return Err(refresh_err);
                        }
                        last_err = Some(AgentError::Rpc(msg).into());
                        continue;
                    }
                    if attempt < MAX_RETRIES {
                        warn!(attempt, error = %msg, "submit failed; retrying after 250ms");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                        last_err = Some(AgentError::Rpc(msg).into());
                        continue;
                    }
                    return Err(AgentError::Rpc(msg).into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| AgentError::Rpc("submission retries exhausted".into()).into()))
    }
}

/// Connect a websocket provider with a signing wallet attached, and
/// seed the chain client's nonce from the current transaction count.
pub async fn connect(rpc_url: &str, private_key: &str) -> Result<ChainClient<impl Provider + Clone>> {
    let signer: PrivateKeySigner = private_key.parse().context("parsing PRIVATE_KEY")?;
    let wallet_address = signer.address();
    let wallet = EthereumWallet::from(signer);

    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_ws(WsConnect::new(rpc_url))
        .await
        .context("connecting RPC websocket")?;

    let nonce = provider
        .get_transaction_count(wallet_address)
        .await
        .context("fetching starting nonce")?;

    info!(%wallet_address, nonce, "chain client connected");
    Ok(ChainClient::new(provider, wallet_address, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_fee_values_are_well_formed() {
        let max_fee = FALLBACK_MAX_FEE_GWEI * GWEI / 100;
        let priority_fee = FALLBACK_PRIORITY_FEE_GWEI * GWEI / 1000;
        assert_eq!(max_fee, 50_000_000); // 0.05 gwei in wei
        assert_eq!(priority_fee, 1_000_000); // 0.001 gwei in wei
    }
}
