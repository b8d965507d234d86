//! Position enumeration for the delegated wallet, plus transfer-history backfill.

use alloy::primitives::{Address, U256};
use clients_uniswapv3::PositionInfo;
use futures::{stream, StreamExt, TryStreamExt};
use std::collections::BTreeSet;

use crate::chain::ChainReader;
use crate::config::BackfillConfig;
use crate::discovery::scan_windows;
use crate::error::EngineError;

/// Concurrent position reads in flight at once
const READ_CONCURRENCY: usize = 8;

/// Reads every position `owner` currently holds, in index order.
///
/// The position manager only exposes per-index reads, so this is `balanceOf` followed by
/// `tokenOfOwnerByIndex` and `positions` for each index.
pub async fn fetch_owned_positions(
    reader: &dyn ChainReader,
    position_manager: Address,
    owner: Address,
) -> Result<Vec<PositionInfo>, EngineError> {
    let count = reader
        .position_count(position_manager, owner)
        .await
        .map_err(EngineError::position_discovery)?;

    let token_ids: Vec<U256> = stream::iter(0..count)
        .map(|index| reader.position_token_id(position_manager, owner, index))
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await
        .map_err(EngineError::position_discovery)?;

    let positions: Vec<PositionInfo> = stream::iter(token_ids)
        .map(|token_id| reader.position(position_manager, token_id))
        .buffered(READ_CONCURRENCY)
        .try_collect()
        .await
        .map_err(EngineError::position_discovery)?;

    tracing::info!(target: "positions", %owner, count = positions.len(), "fetched owned positions");
    Ok(positions)
}

/// Every position id transferred to or from `owner` within the lookback window.
///
/// Audit only: the result never feeds the rebalancing decision.
pub async fn backfill_position_ids(
    reader: &dyn ChainReader,
    position_manager: Address,
    owner: Address,
    latest_block: u64,
    config: &BackfillConfig,
) -> Result<BTreeSet<U256>, EngineError> {
    if config.lookback_blocks == 0 {
        return Ok(BTreeSet::new());
    }
    // `lookback_blocks` counts the latest block itself.
    let floor = latest_block.saturating_sub(config.lookback_blocks.saturating_sub(1));
    let mut ids = BTreeSet::new();
    for (from, to) in scan_windows(latest_block, floor, config.window) {
        let transfers = reader
            .position_transfers(position_manager, owner, from, to)
            .await
            .map_err(EngineError::position_discovery)?;
        ids.extend(transfers.into_iter().map(|t| t.token_id));
    }
    tracing::debug!(
        target: "positions",
        %owner,
        from = floor,
        to = latest_block,
        ids = ids.len(),
        "backfilled transfer history"
    );
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{position, project, MockChain, WALLET};
    use clients_uniswapv3::PositionTransfer;

    #[tokio::test]
    async fn enumerates_by_index() {
        let p = project(1);
        let mut chain = MockChain::default();
        chain.add_owned_position(position(7, p.project_token, p.stable_token, 100));
        chain.add_owned_position(position(3, p.project_token, p.stable_token, 0));
        let npm = chain.deployment().position_manager;

        let positions = fetch_owned_positions(&chain, npm, WALLET).await.unwrap();
        let ids: Vec<_> = positions.iter().map(|p| p.token_id).collect();
        assert_eq!(ids, vec![U256::from(7u64), U256::from(3u64)]);
        assert_eq!(positions[0].liquidity, 100);
    }

    #[tokio::test]
    async fn empty_wallet_has_no_positions() {
        let chain = MockChain::default();
        let npm = chain.deployment().position_manager;
        assert!(fetch_owned_positions(&chain, npm, WALLET)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn read_failures_are_position_discovery_errors() {
        let p = project(1);
        let mut chain = MockChain::default();
        chain.add_owned_position(position(1, p.project_token, p.stable_token, 1));
        chain.failing.insert("position");
        let npm = chain.deployment().position_manager;

        let err = fetch_owned_positions(&chain, npm, WALLET).await.unwrap_err();
        assert!(matches!(err, EngineError::PositionDiscovery(_)));
    }

    #[tokio::test]
    async fn backfill_scans_only_the_lookback_window() {
        let mut chain = MockChain::default();
        for (block, id) in [(70u64, 1u64), (95, 2), (100, 2), (60, 4), (20, 3)] {
            chain.transfers.push(PositionTransfer {
                block_number: block,
                token_id: U256::from(id),
                from: Address::ZERO,
                to: WALLET,
            });
        }
        let config = BackfillConfig {
            enabled: true,
            lookback_blocks: 40,
            window: 10,
        };
        let npm = chain.deployment().position_manager;

        let ids = backfill_position_ids(&chain, npm, WALLET, 100, &config)
            .await
            .unwrap();
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec![U256::from(1u64), U256::from(2u64)]
        );
        assert_eq!(
            chain.transfer_queries(),
            vec![(91, 100), (81, 90), (71, 80), (61, 70)]
        );
        let scanned: u64 = chain
            .transfer_queries()
            .iter()
            .map(|(from, to)| to - from + 1)
            .sum();
        assert_eq!(scanned, config.lookback_blocks);
    }
}
