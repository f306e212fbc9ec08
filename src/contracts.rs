//! Centralized contract interfaces
//!
//! All Solidity ABIs the agent talks to, defined with alloy's `sol!`
//! macro and annotated `#[sol(rpc)]` so each generates a contract
//! instance callable through any alloy `Provider`.
//!
//! Author: AI-Generated
//! Created: 2026-02-01
//! Modified: 2026-02-14 — reworked from the arbitrage-bot ABI set to
//! the swap-router-family set this agent dispatches against (custom
//! V2 swapper proxy, V3 routers incl. Aerodrome, V4 Universal Router +
//! Permit2).

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
        function name() external view returns (string memory);

        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

// ── V2 custom swapper proxy ───────────────────────────────────────────
//
// Not a stock UniswapV2Router02 — the agent's V2 path routes through a
// purpose-built proxy contract that also applies a buy/sell tax in
// basis points, per spec.md §4.3.

sol! {
    #[sol(rpc)]
    interface IV2SwapperProxy {
        /// direction = true when token0 is the input (buy), false for a sell.
        function swap(address pair, uint256 amountIn, uint256 minOut, bool direction, uint256 taxBps)
            external returns (uint256 amountOut);
    }
}

// ── Uniswap V3 family ─────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function tickSpacing() external view returns (int24);
        function token0() external view returns (address);
        function token1() external view returns (address);

        event Swap(address indexed sender, address indexed recipient, int256 amount0, int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick);
    }
}

sol! {
    #[sol(rpc)]
    interface IUniswapV3SwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

// Aerodrome's V3-style router takes `tickSpacing` in place of `fee`.
sol! {
    #[sol(rpc)]
    interface IAerodromeV3Router {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            int24 tickSpacing;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

// Algebra-family (QuickSwap-style) V3 pool: globalState() instead of slot0().
sol! {
    #[sol(rpc)]
    interface IAlgebraPool {
        function globalState() external view returns (uint160 price, int24 tick, uint16 fee, uint16 timepointIndex, uint8 communityFeeToken0, uint8 communityFeeToken1, bool unlocked);
        function liquidity() external view returns (uint128);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── V4 Universal Router + Permit2 ─────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniversalRouter {
        function execute(bytes calldata commands, bytes[] calldata inputs, uint256 deadline) external payable;
    }
}

sol! {
    #[sol(rpc)]
    interface IPermit2 {
        function allowance(address owner, address token, address spender) external view returns (uint160 amount, uint48 expiration, uint48 nonce);
        function approve(address token, address spender, uint160 amount, uint48 expiration) external;
    }
}
