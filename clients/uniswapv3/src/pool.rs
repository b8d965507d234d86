//! Factory and pool read clients.

use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use anyhow::Result;
use std::sync::Arc;

use crate::contracts::{IUniswapV3Factory, IUniswapV3Pool};

/// Resolves pool addresses through the UniswapV3Factory
#[derive(Clone)]
pub struct UniswapV3Factory {
    factory: IUniswapV3Factory::IUniswapV3FactoryInstance<Arc<DynProvider>>,
}

impl UniswapV3Factory {
    pub fn new(address: Address, provider: Arc<DynProvider>) -> Self {
        Self {
            factory: IUniswapV3Factory::new(address, provider),
        }
    }

    /// Returns the pool for the unordered pair at `fee`, or `None` when the factory has none.
    pub async fn get_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Option<Address>> {
        let pool = self
            .factory
            .getPool(token_a, token_b, U24::from(fee))
            .call()
            .await?;
        Ok((!pool.is_zero()).then_some(pool))
    }
}

/// Reads price and liquidity from a single pool
#[derive(Clone)]
pub struct UniswapV3Pool {
    pool: IUniswapV3Pool::IUniswapV3PoolInstance<Arc<DynProvider>>,
}

impl UniswapV3Pool {
    pub fn new(address: Address, provider: Arc<DynProvider>) -> Self {
        Self {
            pool: IUniswapV3Pool::new(address, provider),
        }
    }

    /// Current `sqrtPriceX96` from `slot0`
    pub async fn sqrt_price_x96(&self) -> Result<U256> {
        let slot0 = self.pool.slot0().call().await?;
        Ok(U256::from(slot0.sqrtPriceX96))
    }

    /// In-range liquidity
    pub async fn liquidity(&self) -> Result<u128> {
        Ok(self.pool.liquidity().call().await?)
    }
}
