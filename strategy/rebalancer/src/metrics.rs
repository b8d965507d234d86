//! Target/current price reads and deviation per project.

use alloy::primitives::{U256, U512};
use clients_uniswapv3::UniswapV3Deployment;
use futures::future::join_all;
use utils::WAD;

use crate::chain::ChainReader;
use crate::config::MetricsFailurePolicy;
use crate::error::{EngineError, FailureReport};
use crate::types::{Direction, ProjectInfo, ProjectMetrics, SkippedProject};

const BPS: u64 = 10_000;

/// Converts `sqrtPriceX96` into an 18-decimal price of token0 in units of token1.
///
/// `invert` returns token1 in units of token0 instead. Results beyond `U256::MAX` saturate.
pub fn sqrt_price_to_price(sqrt_price_x96: U256, invert: bool) -> U256 {
    if sqrt_price_x96.is_zero() {
        return U256::ZERO;
    }
    let sqrt = U512::from(sqrt_price_x96);
    let ratio_x192: U512 = sqrt * sqrt;
    let wad = U512::from(WAD);
    let price = if invert {
        (wad << 192) / ratio_x192
    } else {
        (ratio_x192 * wad) >> 192
    };
    narrow(price)
}

fn narrow(value: U512) -> U256 {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return U256::MAX;
    }
    U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]])
}

/// Signed distance between a current and a target price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deviation {
    pub bps: u64,
    pub direction: Direction,
}

impl Deviation {
    pub const NONE: Deviation = Deviation {
        bps: 0,
        direction: Direction::None,
    };

    /// `None` when `target` is zero: the deviation is undefined there.
    pub fn between(current: U256, target: U256) -> Option<Self> {
        if target.is_zero() {
            return None;
        }
        let (diff, direction) = if current > target {
            (current - target, Direction::Decrease)
        } else if current < target {
            (target - current, Direction::Increase)
        } else {
            return Some(Self::NONE);
        };
        let bps = U512::from(diff) * U512::from(BPS) / U512::from(target);
        Some(Self {
            bps: bps.saturating_to::<u64>(),
            direction,
        })
    }
}

/// Reads NAV, pool price and liquidity for one project.
pub async fn compute_metrics(
    reader: &dyn ChainReader,
    deployment: &UniswapV3Deployment,
    fee_tier: u32,
    project: ProjectInfo,
) -> Result<ProjectMetrics, EngineError> {
    let (nav, pool) = tokio::join!(
        reader.nav_per_share(project.project),
        reader.pool_address(
            deployment.pool_factory,
            project.project_token,
            project.stable_token,
            fee_tier
        )
    );
    let nav = nav.map_err(EngineError::provider)?;
    let pool = pool.map_err(EngineError::provider)?;
    if nav.is_zero() {
        return Err(EngineError::NavTargetZero {
            project: project.project,
        });
    }
    let target_price = nav;

    let Some(pool_address) = pool else {
        tracing::debug!(target: "metrics", project = %project.project, fee_tier, "no pool for pair");
        return Ok(ProjectMetrics {
            project,
            pool: None,
            nav_per_share: nav,
            target_price,
            current_price: U256::ZERO,
            pool_liquidity: 0,
            deviation_bps: 0,
            direction: Direction::None,
            positions: Vec::new(),
        });
    };

    let (sqrt_price_x96, pool_liquidity) = tokio::try_join!(
        reader.sqrt_price_x96(pool_address),
        reader.pool_liquidity(pool_address)
    )
    .map_err(EngineError::provider)?;

    // Pools order tokens by address; quote the project token in stable units either way.
    let project_is_token0 = project.project_token < project.stable_token;
    let current_price = sqrt_price_to_price(sqrt_price_x96, !project_is_token0);
    let deviation = Deviation::between(current_price, target_price).ok_or(
        EngineError::NavTargetZero {
            project: project.project,
        },
    )?;

    tracing::debug!(
        target: "metrics",
        project = %project.project,
        pool = %pool_address,
        target = %utils::format_wad(target_price),
        current = %utils::format_wad(current_price),
        deviation_bps = deviation.bps,
        direction = %deviation.direction,
        "computed metrics"
    );

    Ok(ProjectMetrics {
        project,
        pool: Some(pool_address),
        nav_per_share: nav,
        target_price,
        current_price,
        pool_liquidity,
        deviation_bps: deviation.bps,
        direction: deviation.direction,
        positions: Vec::new(),
    })
}

/// Computes metrics for every project concurrently, keeping registry order.
pub async fn evaluate_projects(
    reader: &dyn ChainReader,
    deployment: &UniswapV3Deployment,
    fee_tier: u32,
    projects: &[ProjectInfo],
    policy: MetricsFailurePolicy,
) -> Result<(Vec<ProjectMetrics>, Vec<SkippedProject>), EngineError> {
    let results = join_all(
        projects
            .iter()
            .map(|p| compute_metrics(reader, deployment, fee_tier, *p)),
    )
    .await;

    let mut metrics = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (project, result) in projects.iter().zip(results) {
        match result {
            Ok(m) => metrics.push(m),
            Err(e) => match policy {
                MetricsFailurePolicy::AbortRun => return Err(e),
                MetricsFailurePolicy::SkipProject => {
                    tracing::warn!(
                        target: "metrics",
                        project = %project.project,
                        error = %e,
                        "skipping project"
                    );
                    skipped.push(SkippedProject {
                        project: project.project,
                        failure: FailureReport::from(e),
                    });
                }
            },
        }
    }
    Ok((metrics, skipped))
}
