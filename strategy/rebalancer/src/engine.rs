//! Registry-driven rebalancing engine
//!
//! Ties together discovery, metrics, position matching and sequential execution for one
//! registry on one network. Each call to [`RebalanceEngine::status`] or
//! [`RebalanceEngine::execute`] is one full evaluation cycle over fresh chain state.

use alloy::primitives::{Address, U256};
use clients_uniswapv3::PositionInfo;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chain::{ChainError, ChainReader};
use crate::config::{DelegationContext, RebalanceConfig};
use crate::discovery::discover_projects;
use crate::error::{EngineError, FailureReport};
use crate::executor::{CallDispatcher, SequentialDispatcher};
use crate::matching::match_positions;
use crate::metrics::evaluate_projects;
use crate::network::{resolve_network, NetworkRegistry, ResolvedNetwork};
use crate::plan::{self, TokenFunds};
use crate::positions::{backfill_position_ids, fetch_owned_positions};
use crate::types::{
    Direction, ExecutionReport, ProjectExecution, ProjectMetrics, ProjectSummary,
    SkippedProject, StatusReport,
};

/// Outcome of the read phase of a cycle
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Projects found in registry history
    pub discovered: usize,
    /// Metrics with matched positions, in registry order
    pub projects: Vec<ProjectMetrics>,
    pub skipped: Vec<SkippedProject>,
    /// Positions held by the delegated wallet, matched or not
    pub owned_positions: usize,
    pub unmatched: Vec<PositionInfo>,
}

pub struct RebalanceEngine {
    reader: Arc<dyn ChainReader>,
    registry: Address,
    network: ResolvedNetwork,
    config: RebalanceConfig,
    delegation: Option<DelegationContext>,
}

/// Parses a registry address, rejecting anything that is not 20 hex-encoded bytes.
pub fn parse_registry(registry: &str) -> Result<Address, EngineError> {
    Address::from_str(registry.trim()).map_err(|e| {
        EngineError::InvalidInput(format!("malformed registry address {:?}: {}", registry, e))
    })
}

impl RebalanceEngine {
    /// Creates an engine bound to the network behind `reader`
    ///
    /// # Arguments
    /// * `reader` - Chain access, already configured with its retry policy
    /// * `registry` - Registry contract address as supplied by the caller
    /// * `rpc_url` - Endpoint `reader` talks to; only used to infer the chain if its id cannot be read
    /// * `networks` - Deployments per chain id
    /// * `delegation` - `None` evaluates without positions and refuses to execute
    pub async fn connect(
        reader: Arc<dyn ChainReader>,
        registry: &str,
        rpc_url: &str,
        networks: &NetworkRegistry,
        config: RebalanceConfig,
        delegation: Option<DelegationContext>,
    ) -> Result<Self, EngineError> {
        let registry = parse_registry(registry)?;
        let network = resolve_network(&*reader, networks, rpc_url).await?;
        Ok(Self {
            reader,
            registry,
            network,
            config,
            delegation,
        })
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    pub fn network(&self) -> &ResolvedNetwork {
        &self.network
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    /// Reads everything a cycle needs: projects, their metrics and the wallet's positions.
    pub async fn evaluate(&self) -> Result<Evaluation, EngineError> {
        let reader = &*self.reader;
        let projects = discover_projects(
            reader,
            self.registry,
            self.config.scan_window,
            self.config.discovery_start_block,
        )
        .await?;

        let (metrics, positions) = tokio::try_join!(
            evaluate_projects(
                reader,
                &self.network.deployment,
                self.config.fee_tier,
                &projects,
                self.config.metrics_failure,
            ),
            self.owned_positions()
        )?;
        let (mut metrics, skipped) = metrics;

        let owned_positions = positions.len();
        let unmatched = match_positions(&mut metrics, positions);
        Ok(Evaluation {
            discovered: projects.len(),
            projects: metrics,
            skipped,
            owned_positions,
            unmatched,
        })
    }

    async fn owned_positions(&self) -> Result<Vec<PositionInfo>, EngineError> {
        match &self.delegation {
            Some(delegation) => {
                fetch_owned_positions(
                    &*self.reader,
                    self.network.deployment.position_manager,
                    delegation.wallet,
                )
                .await
            }
            None => Ok(Vec::new()),
        }
    }

    /// Read-only evaluation of every project
    pub async fn status(&self) -> Result<StatusReport, EngineError> {
        let evaluation = self.evaluate().await?;

        let backfilled_count = match &self.delegation {
            Some(delegation) if self.config.backfill.enabled => {
                let latest = self
                    .reader
                    .block_number()
                    .await
                    .map_err(EngineError::provider)?;
                let ids = backfill_position_ids(
                    &*self.reader,
                    self.network.deployment.position_manager,
                    delegation.wallet,
                    latest,
                    &self.config.backfill,
                )
                .await?;
                Some(ids.len())
            }
            _ => None,
        };

        Ok(StatusReport {
            registry: self.registry,
            chain_id: self.network.chain_id,
            project_count: evaluation.discovered,
            position_count: evaluation.owned_positions,
            backfilled_count,
            projects: evaluation.projects.iter().map(ProjectSummary::from).collect(),
            skipped: evaluation.skipped,
        })
    }

    /// Evaluates, then rebalances every eligible project in registry order.
    ///
    /// Metrics and positions for every project are read before the first call is dispatched.
    /// Balances, allowances and decrease quotes are read right before each position's calls,
    /// after accrual. A failure past the first call is reported with the actions that already
    /// landed; nothing is rolled back.
    pub async fn execute(
        &self,
        dispatcher: &dyn CallDispatcher,
    ) -> Result<ExecutionReport, EngineError> {
        let delegation = self.delegation.as_ref().ok_or_else(|| {
            EngineError::Policy("execution requires a delegation context".to_string())
        })?;
        delegation.validate()?;

        let evaluation = self.evaluate().await?;
        let mut sequential = SequentialDispatcher::new(dispatcher, delegation);
        let mut projects = Vec::with_capacity(evaluation.projects.len());

        for metrics in &evaluation.projects {
            let start = sequential.records().len();
            if self.is_eligible(metrics) {
                self.rebalance_project(metrics, delegation, &mut sequential)
                    .await?;
            } else {
                tracing::debug!(
                    target: "rebalance",
                    project = %metrics.project.project,
                    deviation_bps = metrics.deviation_bps,
                    direction = %metrics.direction,
                    "within threshold"
                );
            }
            projects.push(ProjectExecution {
                summary: ProjectSummary::from(metrics),
                actions: sequential.records()[start..].to_vec(),
            });
        }

        let total_actions = sequential.records().len();
        tracing::info!(
            target: "rebalance",
            registry = %self.registry,
            projects = projects.len(),
            total_actions,
            "cycle complete"
        );
        Ok(ExecutionReport {
            registry: self.registry,
            chain_id: self.network.chain_id,
            projects,
            total_actions,
            skipped: evaluation.skipped,
        })
    }

    /// [`Self::status`] with failures converted into a [`FailureReport`].
    pub async fn status_report(&self) -> Result<StatusReport, FailureReport> {
        self.status().await.map_err(FailureReport::from)
    }

    /// [`Self::execute`] with failures converted into a [`FailureReport`].
    pub async fn execute_report(
        &self,
        dispatcher: &dyn CallDispatcher,
    ) -> Result<ExecutionReport, FailureReport> {
        self.execute(dispatcher).await.map_err(FailureReport::from)
    }

    fn is_eligible(&self, metrics: &ProjectMetrics) -> bool {
        metrics.direction != Direction::None && metrics.deviation_bps >= self.config.threshold_bps
    }

    async fn rebalance_project(
        &self,
        metrics: &ProjectMetrics,
        delegation: &DelegationContext,
        sequential: &mut SequentialDispatcher<'_>,
    ) -> Result<(), EngineError> {
        let project = metrics.project.project;
        tracing::info!(
            target: "rebalance",
            %project,
            target = utils::u256_to_f64(metrics.target_price, 18),
            current = utils::u256_to_f64(metrics.current_price, 18),
            deviation_bps = metrics.deviation_bps,
            direction = %metrics.direction,
            positions = metrics.positions.len(),
            "rebalancing project"
        );

        // Interest must be current before anything is sized off the pool.
        sequential
            .run(project, vec![plan::plan_accrue(project)])
            .await?;

        let npm = self.network.deployment.position_manager;
        for position in metrics.positions.iter().filter(|p| p.liquidity > 0) {
            let deadline = plan::deadline(now_secs(), self.config.deadline_secs);
            let actions = match metrics.direction {
                Direction::Decrease => {
                    let liquidity =
                        plan::liquidity_to_remove(position.liquidity, self.config.rebalance_bps);
                    let amount_mins = match self.config.slippage_bps {
                        Some(_) => {
                            let (amount0, amount1) = self
                                .reader
                                .quote_decrease(
                                    npm,
                                    delegation.wallet,
                                    position.token_id,
                                    liquidity,
                                    deadline,
                                )
                                .await
                                .map_err(|e| read_failed(project, "quoteDecrease", e, &*sequential))?;
                            (
                                plan::min_amount(amount0, self.config.slippage_bps),
                                plan::min_amount(amount1, self.config.slippage_bps),
                            )
                        }
                        None => (U256::ZERO, U256::ZERO),
                    };
                    plan::plan_decrease(
                        npm,
                        delegation.wallet,
                        position.token_id,
                        liquidity,
                        amount_mins,
                        deadline,
                    )
                }
                Direction::Increase => {
                    let funds = self
                        .wallet_funds(position, delegation.wallet)
                        .await
                        .map_err(|e| read_failed(project, "readBalances", e, &*sequential))?;
                    let actions = plan::plan_increase(npm, position, funds, deadline);
                    if actions.is_empty() {
                        tracing::debug!(
                            target: "rebalance",
                            %project,
                            token_id = %position.token_id,
                            "no balances to add"
                        );
                    }
                    actions
                }
                Direction::None => Vec::new(),
            };
            sequential.run(project, actions).await?;
        }
        Ok(())
    }

    async fn wallet_funds(
        &self,
        position: &PositionInfo,
        wallet: Address,
    ) -> Result<[TokenFunds; 2], ChainError> {
        let npm = self.network.deployment.position_manager;
        let reader = &*self.reader;
        let (balance0, balance1, allowance0, allowance1) = tokio::try_join!(
            reader.token_balance(position.token0, wallet),
            reader.token_balance(position.token1, wallet),
            reader.token_allowance(position.token0, wallet, npm),
            reader.token_allowance(position.token1, wallet, npm)
        )?;
        Ok([
            TokenFunds {
                token: position.token0,
                balance: balance0,
                allowance: allowance0,
            },
            TokenFunds {
                token: position.token1,
                balance: balance1,
                allowance: allowance1,
            },
        ])
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A read that failed after calls already landed still has to report them.
fn read_failed(
    project: Address,
    step: &str,
    err: ChainError,
    sequential: &SequentialDispatcher<'_>,
) -> EngineError {
    EngineError::Execution {
        project,
        action: step.to_string(),
        message: err.to_string(),
        applied: sequential.records().to_vec(),
    }
}
