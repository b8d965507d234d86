//! [`ChainReader`] backed by an alloy provider, with every read wrapped in the retry policy.

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use anyhow::Context;
use async_trait::async_trait;
use clients_uniswapv3::{
    Erc20, PositionInfo, PositionTransfer, UniswapV3Factory, UniswapV3Pool,
    UniswapV3PositionManager,
};
use std::future::Future;
use std::sync::Arc;

use crate::chain::{ChainError, ChainReader, ProjectCreated};
use crate::contracts::{IProject, IProjectRegistry};
use crate::retry::RetryPolicy;
use crate::types::ProjectInfo;

pub struct RpcChainReader {
    provider: Arc<DynProvider>,
    retry: RetryPolicy,
}

impl RpcChainReader {
    pub fn new(provider: Arc<DynProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    async fn read<F, Fut, T>(&self, label: &'static str, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.retry
            .run(label, || {
                let fut = op();
                async move { fut.await.map_err(|e| ChainError::from_anyhow(label, &e)) }
            })
            .await
    }

    fn position_manager(&self, address: Address) -> UniswapV3PositionManager {
        UniswapV3PositionManager::new(address, Arc::clone(&self.provider))
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.read("eth_chainId", || async move {
            Ok::<_, anyhow::Error>(self.provider.get_chain_id().await?)
        })
        .await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.read("eth_blockNumber", || async move {
            Ok::<_, anyhow::Error>(self.provider.get_block_number().await?)
        })
        .await
    }

    async fn project_count(&self, registry: Address) -> Result<u64, ChainError> {
        self.read("registry.projectCount", || async move {
            let registry = IProjectRegistry::new(registry, Arc::clone(&self.provider));
            let count = registry.projectCount().call().await?;
            u64::try_from(count).context("project count does not fit in u64")
        })
        .await
    }

    async fn project_created(
        &self,
        registry: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ProjectCreated>, ChainError> {
        self.read("registry.ProjectCreated", || async move {
            let filter = Filter::new()
                .address(registry)
                .event_signature(IProjectRegistry::ProjectCreated::SIGNATURE_HASH)
                .from_block(from_block)
                .to_block(to_block);
            let logs = self.provider.get_logs(&filter).await?;

            let mut events = Vec::with_capacity(logs.len());
            for log in &logs {
                let decoded = log
                    .log_decode::<IProjectRegistry::ProjectCreated>()
                    .context("malformed ProjectCreated log")?;
                let event = decoded.inner.data;
                events.push(ProjectCreated {
                    block_number: log.block_number.unwrap_or_default(),
                    log_index: log.log_index.unwrap_or_default(),
                    project: ProjectInfo {
                        project: event.project,
                        project_token: event.token,
                        stable_token: event.stable,
                    },
                });
            }
            Ok::<_, anyhow::Error>(events)
        })
        .await
    }

    async fn nav_per_share(&self, project: Address) -> Result<U256, ChainError> {
        self.read("project.navPerShare", || async move {
            let project = IProject::new(project, Arc::clone(&self.provider));
            Ok::<_, anyhow::Error>(project.navPerShare().call().await?)
        })
        .await
    }

    async fn pool_address(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError> {
        self.read("factory.getPool", || async move {
            UniswapV3Factory::new(factory, Arc::clone(&self.provider))
                .get_pool(token_a, token_b, fee)
                .await
        })
        .await
    }

    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256, ChainError> {
        self.read("pool.slot0", || async move {
            UniswapV3Pool::new(pool, Arc::clone(&self.provider))
                .sqrt_price_x96()
                .await
        })
        .await
    }

    async fn pool_liquidity(&self, pool: Address) -> Result<u128, ChainError> {
        self.read("pool.liquidity", || async move {
            UniswapV3Pool::new(pool, Arc::clone(&self.provider))
                .liquidity()
                .await
        })
        .await
    }

    async fn position_count(
        &self,
        position_manager: Address,
        owner: Address,
    ) -> Result<u64, ChainError> {
        self.read("positionManager.balanceOf", || async move {
            self.position_manager(position_manager)
                .balance_of(owner)
                .await
        })
        .await
    }

    async fn position_token_id(
        &self,
        position_manager: Address,
        owner: Address,
        index: u64,
    ) -> Result<U256, ChainError> {
        self.read("positionManager.tokenOfOwnerByIndex", || async move {
            self.position_manager(position_manager)
                .token_of_owner_by_index(owner, index)
                .await
        })
        .await
    }

    async fn position(
        &self,
        position_manager: Address,
        token_id: U256,
    ) -> Result<PositionInfo, ChainError> {
        self.read("positionManager.positions", || async move {
            self.position_manager(position_manager)
                .position(token_id)
                .await
        })
        .await
    }

    async fn position_transfers(
        &self,
        position_manager: Address,
        owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionTransfer>, ChainError> {
        self.read("positionManager.Transfer", || async move {
            self.position_manager(position_manager)
                .transfers(owner, from_block, to_block)
                .await
        })
        .await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        self.read("erc20.balanceOf", || async move {
            Erc20::new(token, Arc::clone(&self.provider))
                .balance_of(owner)
                .await
        })
        .await
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.read("erc20.allowance", || async move {
            Erc20::new(token, Arc::clone(&self.provider))
                .allowance(owner, spender)
                .await
        })
        .await
    }

    async fn quote_decrease(
        &self,
        position_manager: Address,
        owner: Address,
        token_id: U256,
        liquidity: u128,
        deadline: U256,
    ) -> Result<(U256, U256), ChainError> {
        self.read("positionManager.decreaseLiquidity(eth_call)", || async move {
            self.position_manager(position_manager)
                .quote_decrease(owner, token_id, liquidity, deadline)
                .await
        })
        .await
    }
}
