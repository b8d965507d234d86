//! ABI-encoded calldata for the state-mutating calls issued against a deployment.
//!
//! Encoding is kept separate from dispatch: the caller decides who signs and broadcasts.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use crate::contracts::{
    CollectParams, DecreaseLiquidityParams, IERC20, IPositionManager, IncreaseLiquidityParams,
};

/// `decreaseLiquidity` on the PositionManager
pub fn decrease_liquidity(
    token_id: U256,
    liquidity: u128,
    amount0_min: U256,
    amount1_min: U256,
    deadline: U256,
) -> Bytes {
    IPositionManager::decreaseLiquidityCall {
        params: DecreaseLiquidityParams {
            tokenId: token_id,
            liquidity,
            amount0Min: amount0_min,
            amount1Min: amount1_min,
            deadline,
        },
    }
    .abi_encode()
    .into()
}

/// `collect` on the PositionManager for every owed token, paid to `recipient`
pub fn collect_all(token_id: U256, recipient: Address) -> Bytes {
    IPositionManager::collectCall {
        params: CollectParams {
            tokenId: token_id,
            recipient,
            amount0Max: u128::MAX,
            amount1Max: u128::MAX,
        },
    }
    .abi_encode()
    .into()
}

/// `increaseLiquidity` on the PositionManager
pub fn increase_liquidity(
    token_id: U256,
    amount0_desired: U256,
    amount1_desired: U256,
    amount0_min: U256,
    amount1_min: U256,
    deadline: U256,
) -> Bytes {
    IPositionManager::increaseLiquidityCall {
        params: IncreaseLiquidityParams {
            tokenId: token_id,
            amount0Desired: amount0_desired,
            amount1Desired: amount1_desired,
            amount0Min: amount0_min,
            amount1Min: amount1_min,
            deadline,
        },
    }
    .abi_encode()
    .into()
}

/// ERC-20 `approve`
pub fn approve(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}
