//! In-memory chain and dispatcher used by the unit tests.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use clients_uniswapv3::{PositionInfo, PositionTransfer, UniswapV3Deployment};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use utils::WAD;

use crate::chain::{ChainError, ChainErrorKind, ChainReader, ProjectCreated};
use crate::config::DelegationContext;
use crate::executor::{CallDispatcher, ContractCall};
use crate::matching::pair_key;
use crate::types::ProjectInfo;

pub const WALLET: Address = Address::repeat_byte(0xd0);

fn tagged(tag: u8, i: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = tag;
    bytes[19] = i;
    Address::from(bytes)
}

/// Project `i` with a project token that sorts before its stable token (pool token0).
pub fn project(i: u8) -> ProjectInfo {
    ProjectInfo {
        project: tagged(0x10, i),
        project_token: tagged(0x20, i),
        stable_token: tagged(0x30, i),
    }
}

pub fn pool_of(p: &ProjectInfo) -> Address {
    tagged(0x40, p.project.as_slice()[19])
}

pub fn position(token_id: u64, token0: Address, token1: Address, liquidity: u128) -> PositionInfo {
    PositionInfo {
        token_id: U256::from(token_id),
        token0,
        token1,
        fee: 3_000,
        tick_lower: -887_220,
        tick_upper: 887_220,
        liquidity,
    }
}

pub fn delegation() -> DelegationContext {
    DelegationContext {
        wallet: WALLET,
        credential: "test-credential".into(),
        public_key: None,
    }
}

fn isqrt(n: U256) -> U256 {
    if n < U256::from(2u64) {
        return n;
    }
    let mut x = n;
    let mut y = (x + U256::from(1u64)) >> 1;
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x
}

/// `sqrtPriceX96` for an 18-decimal token1-per-token0 price.
pub fn price_to_sqrt(price: U256) -> U256 {
    isqrt((price << 192) / WAD)
}

#[derive(Default)]
pub struct MockChain {
    /// `None` makes `chain_id` fail
    pub chain_id: Option<u64>,
    pub latest_block: u64,
    pub registry_count: u64,
    pub created: Vec<ProjectCreated>,
    pub(crate) next_log_index: u64,
    pub navs: HashMap<Address, U256>,
    pub pools: HashMap<(Address, Address, u32), Address>,
    pub sqrt_prices: HashMap<Address, U256>,
    pub liquidity: HashMap<Address, u128>,
    /// Token ids owned by the delegated wallet, in index order
    pub owned: Vec<U256>,
    pub positions: HashMap<U256, PositionInfo>,
    pub transfers: Vec<PositionTransfer>,
    pub balances: HashMap<(Address, Address), U256>,
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub quotes: HashMap<U256, (U256, U256)>,
    /// Method names that fail with a non-retryable error
    pub failing: HashSet<&'static str>,
    pub(crate) event_queries: Mutex<Vec<(u64, u64)>>,
    pub(crate) transfer_queries: Mutex<Vec<(u64, u64)>>,
}

impl MockChain {
    pub fn deployment(&self) -> UniswapV3Deployment {
        UniswapV3Deployment {
            pool_factory: Address::repeat_byte(0xfa),
            position_manager: Address::repeat_byte(0xbb),
        }
    }

    pub fn add_project(&mut self, block: u64, project: ProjectInfo) {
        self.created.push(ProjectCreated {
            block_number: block,
            log_index: self.next_log_index,
            project,
        });
        self.next_log_index += 1;
        self.registry_count += 1;
    }

    /// NAV, pool and pool price (stable per project token) for `project` at the 0.3% tier.
    pub fn set_project_market(
        &mut self,
        project: ProjectInfo,
        nav: U256,
        price: U256,
        liquidity: u128,
    ) {
        let pool = pool_of(&project);
        let (a, b) = pair_key(project.project_token, project.stable_token);
        self.navs.insert(project.project, nav);
        self.pools.insert((a, b, 3_000), pool);
        self.sqrt_prices.insert(pool, price_to_sqrt(price));
        self.liquidity.insert(pool, liquidity);
    }

    pub fn add_owned_position(&mut self, info: PositionInfo) {
        self.owned.push(info.token_id);
        self.positions.insert(info.token_id, info);
    }

    pub fn event_queries(&self) -> Vec<(u64, u64)> {
        self.event_queries.lock().unwrap().clone()
    }

    pub fn transfer_queries(&self) -> Vec<(u64, u64)> {
        self.transfer_queries.lock().unwrap().clone()
    }

    fn check(&self, method: &'static str) -> Result<(), ChainError> {
        if self.failing.contains(method) {
            return Err(ChainError::new(method, ChainErrorKind::Call, "execution reverted"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.chain_id.ok_or_else(|| {
            ChainError::new("eth_chainId", ChainErrorKind::Network, "connection refused")
        })
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.check("block_number")?;
        Ok(self.latest_block)
    }

    async fn project_count(&self, _registry: Address) -> Result<u64, ChainError> {
        self.check("project_count")?;
        Ok(self.registry_count)
    }

    async fn project_created(
        &self,
        _registry: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ProjectCreated>, ChainError> {
        self.check("project_created")?;
        self.event_queries.lock().unwrap().push((from_block, to_block));
        let mut events: Vec<_> = self
            .created
            .iter()
            .filter(|e| (from_block..=to_block).contains(&e.block_number))
            .copied()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn nav_per_share(&self, project: Address) -> Result<U256, ChainError> {
        self.check("nav_per_share")?;
        Ok(self.navs.get(&project).copied().unwrap_or_default())
    }

    async fn pool_address(
        &self,
        _factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError> {
        self.check("pool_address")?;
        let (a, b) = pair_key(token_a, token_b);
        Ok(self.pools.get(&(a, b, fee)).copied())
    }

    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256, ChainError> {
        self.check("sqrt_price_x96")?;
        Ok(self.sqrt_prices.get(&pool).copied().unwrap_or_default())
    }

    async fn pool_liquidity(&self, pool: Address) -> Result<u128, ChainError> {
        self.check("pool_liquidity")?;
        Ok(self.liquidity.get(&pool).copied().unwrap_or_default())
    }

    async fn position_count(
        &self,
        _position_manager: Address,
        _owner: Address,
    ) -> Result<u64, ChainError> {
        self.check("position_count")?;
        Ok(self.owned.len() as u64)
    }

    async fn position_token_id(
        &self,
        _position_manager: Address,
        _owner: Address,
        index: u64,
    ) -> Result<U256, ChainError> {
        self.check("position_token_id")?;
        self.owned
            .get(index as usize)
            .copied()
            .ok_or_else(|| ChainError::new("tokenOfOwnerByIndex", ChainErrorKind::Call, "index out of bounds"))
    }

    async fn position(
        &self,
        _position_manager: Address,
        token_id: U256,
    ) -> Result<PositionInfo, ChainError> {
        self.check("position")?;
        self.positions
            .get(&token_id)
            .cloned()
            .ok_or_else(|| ChainError::new("positions", ChainErrorKind::Call, "invalid token id"))
    }

    async fn position_transfers(
        &self,
        _position_manager: Address,
        _owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionTransfer>, ChainError> {
        self.check("position_transfers")?;
        self.transfer_queries
            .lock()
            .unwrap()
            .push((from_block, to_block));
        Ok(self
            .transfers
            .iter()
            .filter(|t| (from_block..=to_block).contains(&t.block_number))
            .copied()
            .collect())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        self.check("token_balance")?;
        Ok(self.balances.get(&(token, owner)).copied().unwrap_or_default())
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.check("token_allowance")?;
        Ok(self
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn quote_decrease(
        &self,
        _position_manager: Address,
        _owner: Address,
        token_id: U256,
        _liquidity: u128,
        _deadline: U256,
    ) -> Result<(U256, U256), ChainError> {
        self.check("quote_decrease")?;
        Ok(self.quotes.get(&token_id).copied().unwrap_or_default())
    }
}

/// Records every dispatched call and hands back sequential hashes.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub calls: Mutex<Vec<ContractCall>>,
    /// Zero-based call index that fails instead of being recorded
    pub fail_at: Option<usize>,
}

impl RecordingDispatcher {
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    pub fn functions(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|c| c.function).collect()
    }
}

#[async_trait]
impl CallDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        _delegation: &DelegationContext,
        call: &ContractCall,
    ) -> anyhow::Result<TxHash> {
        let mut calls = self.calls.lock().unwrap();
        if self.fail_at == Some(calls.len()) {
            anyhow::bail!("signing service rejected {}", call.function);
        }
        calls.push(call.clone());
        Ok(TxHash::with_last_byte(calls.len() as u8))
    }
}
