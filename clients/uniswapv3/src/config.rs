//! Configuration types for Uniswap V3 clients.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Addresses of one Uniswap V3 deployment on a single network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniswapV3Deployment {
    /// The UniswapV3Factory contract, used to resolve pool addresses
    pub pool_factory: Address,
    /// The NonfungiblePositionManager contract that custodies LP positions
    pub position_manager: Address,
}
