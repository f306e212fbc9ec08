//! Swap router (C3, spec.md §4.3): per-protocol calldata build,
//! submit, and result parsing.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

pub mod v2;
pub mod v3;
pub mod v4;

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::{Fork, PairState, Protocol};
use crate::chain::ChainClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapAction {
    Buy,
    Sell,
}

/// Deployment-wide router/proxy addresses the swap paths dispatch
/// against, distinct from any single pair (spec.md §6's on-chain
/// interfaces list).
#[derive(Debug, Clone, Copy)]
pub struct RouterAddresses {
    pub v2_swapper: Address,
    pub v3_router: Address,
    pub aerodrome_router: Address,
    pub universal_router: Address,
    pub permit2: Address,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapOutcome {
    pub success: bool,
    pub amount_out_raw: U256,
    pub readable_out: f64,
    pub error: Option<String>,
}

impl SwapOutcome {
    fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            amount_out_raw: U256::ZERO,
            readable_out: 0.0,
            error: Some(msg.into()),
        }
    }
}

/// Dispatch a swap on `pair` by its protocol generation. `is_token0_in`
/// describes the buy direction from the base token; a sell direction
/// is the logical inverse, handled by each protocol submodule. Never
/// panics: any failure is captured in the returned `SwapOutcome`.
pub async fn perform_swap<P: Provider + Clone>(
    chain: &ChainClient<P>,
    pair: &PairState,
    amount_in: U256,
    is_token0_in: bool,
    min_amount_out: U256,
    action: SwapAction,
    routers: RouterAddresses,
    v4_simulate: bool,
) -> SwapOutcome {
    let result = match pair.protocol {
        Protocol::V2 => v2::swap(chain, pair, amount_in, is_token0_in, min_amount_out, action, routers.v2_swapper).await,
        Protocol::V3 => {
            v3::swap(
                chain,
                pair,
                amount_in,
                is_token0_in,
                min_amount_out,
                action,
                routers.v3_router,
                routers.aerodrome_router,
            )
            .await
        }
        Protocol::V4 => {
            v4::swap(
                chain,
                pair,
                amount_in,
                is_token0_in,
                min_amount_out,
                action,
                routers.universal_router,
                v4_simulate,
            )
            .await
        }
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(pair = %pair.pair_address, protocol = ?pair.protocol, error = %e, "swap failed");
            SwapOutcome::failed(e.to_string())
        }
    }
}

/// Which address a path should request ERC-20 approval for, per
/// spec.md §4.6 step 3. For V4, `permit2` is the approval spender;
/// `universal_router` is a separate, later Permit2-delegated approval
/// handled by `chain::approvals::ensure_permit2_approval`.
pub fn spender_for(
    protocol: Protocol,
    fork: &Fork,
    v2_swapper: Address,
    v3_router: Address,
    aerodrome_router: Address,
    _universal_router: Address,
    permit2: Address,
) -> Address {
    match protocol {
        Protocol::V4 => permit2,
        Protocol::V3 => match fork {
            Fork::Aerodrome => aerodrome_router,
            _ => v3_router,
        },
        Protocol::V2 => v2_swapper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spender_for_v4_is_permit2() {
        let a = Address::repeat_byte(1);
        let permit2 = Address::repeat_byte(2);
        let universal_router = Address::repeat_byte(3);
        let spender = spender_for(Protocol::V4, &Fork::Uniswap, a, a, a, universal_router, permit2);
        assert_eq!(spender, permit2);
    }

    #[test]
    fn spender_for_v3_aerodrome_uses_aerodrome_router() {
        let v3_router = Address::repeat_byte(1);
        let aerodrome_router = Address::repeat_byte(2);
        let spender = spender_for(Protocol::V3, &Fork::Aerodrome, v3_router, v3_router, aerodrome_router, v3_router, v3_router);
        assert_eq!(spender, aerodrome_router);
    }

    #[test]
    fn spender_for_v2_is_swapper_proxy() {
        let v2_swapper = Address::repeat_byte(9);
        let other = Address::repeat_byte(1);
        let spender = spender_for(Protocol::V2, &Fork::Uniswap, v2_swapper, other, other, other, other);
        assert_eq!(spender, v2_swapper);
    }
}
