mod calls;
mod config;
mod contracts;
mod erc20;
mod pool;
mod position_manager;

pub use config::UniswapV3Deployment;
pub use contracts::{IERC20, IPositionManager, IUniswapV3Factory, IUniswapV3Pool};
pub use erc20::Erc20;
pub use pool::{UniswapV3Factory, UniswapV3Pool};
pub use position_manager::{PositionInfo, PositionTransfer, UniswapV3PositionManager};

/// Calldata builders for state-mutating calls.
pub mod calldata {
    pub use crate::calls::{approve, collect_all, decrease_liquidity, increase_liquidity};
}
