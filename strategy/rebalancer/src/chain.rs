//! Read-side seam between the engine and the blockchain.
//!
//! Everything the engine learns about chain state goes through [`ChainReader`]. The RPC-backed
//! implementation lives in [`crate::rpc`]; tests substitute an in-memory chain.

use alloy::primitives::{Address, U256};
use alloy::transports::{RpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;
use clients_uniswapv3::{PositionInfo, PositionTransfer};
use thiserror::Error;

use crate::retry::Retryable;
use crate::types::ProjectInfo;

/// How a failed read should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainErrorKind {
    /// Connection-level failure; the request may not have reached the node
    Network,
    /// The node or gateway failed to serve the request
    Server { status: Option<u16> },
    /// The call itself is bad: revert, malformed input, undecodable output
    Call,
}

#[derive(Debug, Clone, Error)]
#[error("{label}: {message}")]
pub struct ChainError {
    pub label: String,
    pub kind: ChainErrorKind,
    pub message: String,
}

impl ChainError {
    pub fn new(label: impl Into<String>, kind: ChainErrorKind, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classifies an error returned by the alloy-backed clients.
    pub fn from_anyhow(label: &str, err: &anyhow::Error) -> Self {
        Self::new(label, classify(err), format!("{:#}", err))
    }
}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ChainErrorKind::Network | ChainErrorKind::Server { .. }
        )
    }
}

fn classify(err: &anyhow::Error) -> ChainErrorKind {
    for cause in err.chain() {
        if let Some(contract_err) = cause.downcast_ref::<alloy::contract::Error>() {
            return match contract_err {
                alloy::contract::Error::TransportError(e) => classify_transport(e),
                _ => ChainErrorKind::Call,
            };
        }
        if let Some(e) = cause.downcast_ref::<TransportError>() {
            return classify_transport(e);
        }
    }
    ChainErrorKind::Call
}

/// JSON-RPC implementation-defined server error range.
const SERVER_ERROR_CODES: std::ops::RangeInclusive<i64> = -32099..=-32000;

pub(crate) fn classify_transport(err: &TransportError) -> ChainErrorKind {
    match err {
        RpcError::Transport(TransportErrorKind::HttpError(http)) => {
            if http.status >= 500 || http.status == 429 {
                ChainErrorKind::Server {
                    status: Some(http.status),
                }
            } else {
                ChainErrorKind::Call
            }
        }
        RpcError::Transport(_) => ChainErrorKind::Network,
        RpcError::NullResp => ChainErrorKind::Network,
        RpcError::ErrorResp(payload) => {
            let reverted = payload.data.is_some() || payload.message.contains("revert");
            if SERVER_ERROR_CODES.contains(&payload.code) && !reverted {
                ChainErrorKind::Server { status: None }
            } else {
                ChainErrorKind::Call
            }
        }
        _ => ChainErrorKind::Call,
    }
}

/// A `ProjectCreated` registry event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectCreated {
    pub block_number: u64,
    pub log_index: u64,
    pub project: ProjectInfo,
}

/// Every chain read the engine performs.
///
/// Implementations are expected to apply the retry policy themselves; callers treat any error as
/// final.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Authoritative number of projects the registry has recorded
    async fn project_count(&self, registry: Address) -> Result<u64, ChainError>;

    /// `ProjectCreated` events emitted by `registry` within `[from_block, to_block]`
    async fn project_created(
        &self,
        registry: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ProjectCreated>, ChainError>;

    async fn nav_per_share(&self, project: Address) -> Result<U256, ChainError>;

    async fn pool_address(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError>;

    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256, ChainError>;

    async fn pool_liquidity(&self, pool: Address) -> Result<u128, ChainError>;

    async fn position_count(
        &self,
        position_manager: Address,
        owner: Address,
    ) -> Result<u64, ChainError>;

    async fn position_token_id(
        &self,
        position_manager: Address,
        owner: Address,
        index: u64,
    ) -> Result<U256, ChainError>;

    async fn position(
        &self,
        position_manager: Address,
        token_id: U256,
    ) -> Result<PositionInfo, ChainError>;

    async fn position_transfers(
        &self,
        position_manager: Address,
        owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionTransfer>, ChainError>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Simulated token amounts released by removing `liquidity` from `token_id` as `owner`
    async fn quote_decrease(
        &self,
        position_manager: Address,
        owner: Address,
        token_id: U256,
        liquidity: u128,
        deadline: U256,
    ) -> Result<(U256, U256), ChainError>;
}
