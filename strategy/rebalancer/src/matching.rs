//! Assigns wallet positions to the project whose token pair they hold.

use alloy::primitives::Address;
use clients_uniswapv3::PositionInfo;
use std::collections::HashMap;

use crate::types::ProjectMetrics;

/// Order-independent key for a token pair.
pub fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Appends each position to the metrics of the project sharing its pair, keeping position order.
///
/// When two projects share a pair the one earlier in registry order owns it. Returns the
/// positions that matched no project; they must never be acted upon.
pub fn match_positions(
    metrics: &mut [ProjectMetrics],
    positions: Vec<PositionInfo>,
) -> Vec<PositionInfo> {
    let mut by_pair: HashMap<(Address, Address), usize> = HashMap::with_capacity(metrics.len());
    for (index, m) in metrics.iter().enumerate() {
        by_pair
            .entry(pair_key(m.project.project_token, m.project.stable_token))
            .or_insert(index);
    }

    let mut unmatched = Vec::new();
    for position in positions {
        match by_pair.get(&pair_key(position.token0, position.token1)) {
            Some(&index) => metrics[index].positions.push(position),
            None => unmatched.push(position),
        }
    }

    if !unmatched.is_empty() {
        tracing::debug!(
            target: "positions",
            unmatched = unmatched.len(),
            "positions outside every tracked pair"
        );
    }
    unmatched
}
