//! Registry-driven LP rebalancing strategy crate.
//!
//! Discovers projects from a registry contract, compares each project's pool price against its
//! NAV-derived target, and keeps the delegated wallet's Uniswap V3 positions in line through an
//! external signing service.

pub mod chain;
pub mod config;
mod contracts;
pub mod discovery;
mod engine;
pub mod error;
pub mod executor;
pub mod matching;
pub mod metrics;
pub mod network;
pub mod plan;
pub mod positions;
pub mod retry;
mod rpc;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{ChainError, ChainErrorKind, ChainReader};
pub use config::{
    BackfillConfig, DelegationContext, MetricsFailurePolicy, RebalanceConfig, DEFAULT_RPC_URL,
};
pub use engine::{parse_registry, Evaluation, RebalanceEngine};
pub use error::{EngineError, ErrorCategory, FailureReport};
pub use executor::{CallDispatcher, ContractCall, SequentialDispatcher};
pub use network::{NetworkRegistry, ResolvedNetwork};
pub use retry::{Backoff, RetryPolicy};
pub use rpc::RpcChainReader;
pub use types::{
    ActionKind, ActionRecord, ContractKind, Direction, ExecutionReport, ProjectExecution,
    ProjectInfo, ProjectMetrics, ProjectSummary, SkippedProject, StatusReport,
};
