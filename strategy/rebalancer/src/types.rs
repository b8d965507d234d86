//! Shared types for the rebalancing engine.

use alloy::primitives::{Address, TxHash, U256};
use clients_uniswapv3::PositionInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FailureReport;

/// A project recorded by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project contract address (identity of the project)
    pub project: Address,
    /// Yield-bearing project token
    pub project_token: Address,
    /// Stable reference token the project token is paired with
    pub stable_token: Address,
}

/// Which way a project's pool price has to move to reach its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Pool price is below target: add liquidity
    Increase,
    /// Pool price is above target: remove liquidity
    Decrease,
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Increase => write!(f, "increase"),
            Direction::Decrease => write!(f, "decrease"),
            Direction::None => write!(f, "none"),
        }
    }
}

/// Per-project evaluation, recomputed on every cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMetrics {
    pub project: ProjectInfo,
    /// Pool for the project/stable pair at the configured fee tier, if one exists
    pub pool: Option<Address>,
    /// NAV per share reported by the project (18 decimals)
    pub nav_per_share: U256,
    /// Target pool price, derived from NAV (18 decimals)
    pub target_price: U256,
    /// Pool price expressed as stable per project token (18 decimals)
    pub current_price: U256,
    /// In-range pool liquidity
    pub pool_liquidity: u128,
    /// `|current - target| * 10000 / target`
    pub deviation_bps: u64,
    pub direction: Direction,
    /// Delegated wallet positions in this project's pair, in discovery order
    pub positions: Vec<PositionInfo>,
}

/// A state-mutating call kind, named after the contract function it invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    AccrueInterest,
    DecreaseLiquidity,
    Collect,
    Approve,
    IncreaseLiquidity,
}

impl ActionKind {
    /// Solidity function name invoked by this action
    pub fn function_name(&self) -> &'static str {
        match self {
            ActionKind::AccrueInterest => "accrueInterest",
            ActionKind::DecreaseLiquidity => "decreaseLiquidity",
            ActionKind::Collect => "collect",
            ActionKind::Approve => "approve",
            ActionKind::IncreaseLiquidity => "increaseLiquidity",
        }
    }

    /// Contract ABI the action is encoded against
    pub fn contract(&self) -> ContractKind {
        match self {
            ActionKind::AccrueInterest => ContractKind::Project,
            ActionKind::Approve => ContractKind::Erc20,
            ActionKind::DecreaseLiquidity
            | ActionKind::Collect
            | ActionKind::IncreaseLiquidity => ContractKind::PositionManager,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

/// Contract ABIs the engine issues calls against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractKind {
    Project,
    PositionManager,
    Erc20,
}

/// One executed state-mutating call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    pub project: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<U256>,
    pub action: ActionKind,
    pub tx_hash: TxHash,
}

/// Report-friendly view of [`ProjectMetrics`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub project: Address,
    pub project_token: Address,
    pub stable_token: Address,
    pub pool: Option<Address>,
    pub nav_per_share: String,
    pub target_price: String,
    pub current_price: String,
    pub pool_liquidity: String,
    pub deviation_bps: u64,
    pub direction: Direction,
    pub position_count: usize,
    pub position_ids: Vec<U256>,
}

impl From<&ProjectMetrics> for ProjectSummary {
    fn from(m: &ProjectMetrics) -> Self {
        Self {
            project: m.project.project,
            project_token: m.project.project_token,
            stable_token: m.project.stable_token,
            pool: m.pool,
            nav_per_share: utils::format_wad(m.nav_per_share),
            target_price: utils::format_wad(m.target_price),
            current_price: utils::format_wad(m.current_price),
            pool_liquidity: m.pool_liquidity.to_string(),
            deviation_bps: m.deviation_bps,
            direction: m.direction,
            position_count: m.positions.len(),
            position_ids: m.positions.iter().map(|p| p.token_id).collect(),
        }
    }
}

/// A project left out of the cycle because its metrics could not be read
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedProject {
    pub project: Address,
    pub failure: FailureReport,
}

/// Read-only evaluation report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub registry: Address,
    pub chain_id: u64,
    pub project_count: usize,
    /// Positions currently owned by the delegated wallet
    pub position_count: usize,
    /// Position IDs seen in transfer history, when backfill is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfilled_count: Option<usize>,
    pub projects: Vec<ProjectSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedProject>,
}

/// Actions executed for one project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExecution {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    pub actions: Vec<ActionRecord>,
}

/// Execution report: per-project summaries plus the ordered actions taken
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub registry: Address,
    pub chain_id: u64,
    pub projects: Vec<ProjectExecution>,
    pub total_actions: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedProject>,
}
