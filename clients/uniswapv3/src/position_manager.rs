//! Uniswap V3 PositionManager client and position data types.

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::contracts::{DecreaseLiquidityParams, IPositionManager};

/// Position record as reported by `positions(tokenId)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionInfo {
    /// The position NFT token ID
    pub token_id: U256,
    /// Address of token0 in the pair
    pub token0: Address,
    /// Address of token1 in the pair
    pub token1: Address,
    /// Pool fee tier in hundredths of a bip
    pub fee: u32,
    /// Lower tick bound of the position range
    pub tick_lower: i32,
    /// Upper tick bound of the position range
    pub tick_upper: i32,
    /// Current liquidity amount in the position
    pub liquidity: u128,
}

/// A position NFT transfer touching the watched owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionTransfer {
    /// Block the transfer was included in
    pub block_number: u64,
    /// The position NFT token ID
    pub token_id: U256,
    /// Previous holder
    pub from: Address,
    /// New holder
    pub to: Address,
}

/// UniswapV3PositionManager provides read access to a NonfungiblePositionManager contract
#[derive(Clone)]
pub struct UniswapV3PositionManager {
    position_manager: IPositionManager::IPositionManagerInstance<Arc<DynProvider>>,
}

impl UniswapV3PositionManager {
    /// Creates a new `UniswapV3PositionManager` bound to `address`
    pub fn new(address: Address, provider: Arc<DynProvider>) -> Self {
        Self {
            position_manager: IPositionManager::new(address, provider),
        }
    }

    /// Address of the bound PositionManager contract
    pub fn address(&self) -> Address {
        *self.position_manager.address()
    }

    /// Number of position NFTs currently held by `owner`
    pub async fn balance_of(&self, owner: Address) -> Result<u64> {
        let balance = self.position_manager.balanceOf(owner).call().await?;
        u64::try_from(balance).context("position balance does not fit in u64")
    }

    /// Token ID of the `index`-th position held by `owner`
    pub async fn token_of_owner_by_index(&self, owner: Address, index: u64) -> Result<U256> {
        let token_id = self
            .position_manager
            .tokenOfOwnerByIndex(owner, U256::from(index))
            .call()
            .await?;
        Ok(token_id)
    }

    /// Reads the full position record for `token_id`
    pub async fn position(&self, token_id: U256) -> Result<PositionInfo> {
        let info = self.position_manager.positions(token_id).call().await?;
        Ok(PositionInfo {
            token_id,
            token0: info.token0,
            token1: info.token1,
            fee: info.fee.to::<u32>(),
            tick_lower: info.tickLower.as_i32(),
            tick_upper: info.tickUpper.as_i32(),
            liquidity: info.liquidity,
        })
    }

    /// Simulates `decreaseLiquidity` from `owner` and returns the token amounts it would release.
    ///
    /// The call is an `eth_call`; nothing is broadcast.
    pub async fn quote_decrease(
        &self,
        owner: Address,
        token_id: U256,
        liquidity: u128,
        deadline: U256,
    ) -> Result<(U256, U256)> {
        let params = DecreaseLiquidityParams {
            tokenId: token_id,
            liquidity,
            amount0Min: U256::ZERO,
            amount1Min: U256::ZERO,
            deadline,
        };
        let result = self
            .position_manager
            .decreaseLiquidity(params)
            .from(owner)
            .call()
            .await?;
        Ok((result.amount0, result.amount1))
    }

    /// Collects position NFT transfers into or out of `owner` within `[from_block, to_block]`.
    ///
    /// Two log queries are issued, one per indexed side of the `Transfer` event.
    pub async fn transfers(
        &self,
        owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionTransfer>> {
        let base = Filter::new()
            .address(self.address())
            .event_signature(IPositionManager::Transfer::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let provider = self.position_manager.provider();
        let outgoing = provider
            .get_logs(&base.clone().topic1(owner.into_word()))
            .await?;
        let incoming = provider.get_logs(&base.topic2(owner.into_word())).await?;

        let mut transfers = Vec::with_capacity(outgoing.len() + incoming.len());
        for log in outgoing.iter().chain(incoming.iter()) {
            let decoded = log
                .log_decode::<IPositionManager::Transfer>()
                .context("malformed position Transfer log")?;
            let event = decoded.inner.data;
            transfers.push(PositionTransfer {
                block_number: log.block_number.unwrap_or_default(),
                token_id: event.tokenId,
                from: event.from,
                to: event.to,
            });
        }
        tracing::debug!(
            target: "positions",
            %owner,
            from_block,
            to_block,
            count = transfers.len(),
            "scanned position transfers"
        );
        Ok(transfers)
    }
}
