//! Configuration types for the rebalancing engine.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;
use crate::retry::RetryPolicy;

/// Public endpoint used when the caller does not supply one.
pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

/// What to do when one project's metrics cannot be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsFailurePolicy {
    /// Any failed project read aborts the whole cycle
    #[default]
    AbortRun,
    /// The failed project is reported as skipped and the cycle continues
    SkipProject,
}

/// Transfer-history reconstruction of position IDs (audit only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub enabled: bool,
    /// How far back from the latest block to look
    pub lookback_blocks: u64,
    /// Blocks per log query
    pub window: u64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lookback_blocks: 5_000,
            window: 10,
        }
    }
}

/// Parameters of one rebalancing cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Minimum deviation (bps) before a project is rebalanced
    pub threshold_bps: u64,
    /// Share of a position's liquidity removed on the decrease path (bps)
    pub rebalance_bps: u32,
    /// Pool fee tier used to locate each project's pool
    pub fee_tier: u32,
    /// Blocks per registry log query
    pub scan_window: u64,
    /// Registry deployment block; discovery never scans below it
    pub discovery_start_block: u64,
    pub backfill: BackfillConfig,
    /// Deadline offset for time-bounded calls
    pub deadline_secs: u64,
    /// Tolerated shortfall against simulated decrease output; `None` disables the guard
    pub slippage_bps: Option<u32>,
    pub metrics_failure: MetricsFailurePolicy,
    pub retry: RetryPolicy,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            threshold_bps: 150,
            rebalance_bps: 2_500,
            fee_tier: 3_000,
            scan_window: 10,
            discovery_start_block: 0,
            backfill: BackfillConfig::default(),
            deadline_secs: 900,
            slippage_bps: Some(100),
            metrics_failure: MetricsFailurePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RebalanceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(s).map_err(|e| EngineError::InvalidInput(format!("config: {}", e)))?;
        if config.rebalance_bps > 10_000 {
            return Err(EngineError::InvalidInput(format!(
                "rebalance_bps must be at most 10000, got {}",
                config.rebalance_bps
            )));
        }
        if matches!(config.slippage_bps, Some(bps) if bps > 10_000) {
            return Err(EngineError::InvalidInput(
                "slippage_bps must be at most 10000".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Identity and credential the signing service needs to act for the delegated wallet
#[derive(Clone, Serialize, Deserialize)]
pub struct DelegationContext {
    pub wallet: Address,
    /// Authorization secret presented to the signing service
    pub credential: String,
    pub public_key: Option<String>,
}

impl fmt::Debug for DelegationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegationContext")
            .field("wallet", &self.wallet)
            .field("credential", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

impl DelegationContext {
    /// Checks the fields required to submit transactions.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.wallet.is_zero() {
            return Err(EngineError::Policy(
                "delegated wallet address is missing".to_string(),
            ));
        }
        if self.credential.trim().is_empty() {
            return Err(EngineError::Policy(
                "delegation credential is missing".to_string(),
            ));
        }
        Ok(())
    }
}
