//! Project discovery from registry event history.
//!
//! Providers cap the block range of a single `eth_getLogs`, so history is walked backwards from
//! the chain head in fixed-size windows until the registry's own project count is accounted for.

use alloy::primitives::Address;
use std::collections::HashSet;

use crate::chain::{ChainReader, ProjectCreated};
use crate::error::EngineError;
use crate::types::ProjectInfo;

/// Descending, non-overlapping `[from, to]` block ranges covering `[floor, latest]`.
#[derive(Debug, Clone)]
pub struct ScanWindows {
    next_to: Option<u64>,
    floor: u64,
    size: u64,
}

pub fn scan_windows(latest: u64, floor: u64, size: u64) -> ScanWindows {
    ScanWindows {
        next_to: (latest >= floor).then_some(latest),
        floor,
        size: size.max(1),
    }
}

impl Iterator for ScanWindows {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let to = self.next_to?;
        let from = to.saturating_sub(self.size - 1).max(self.floor);
        self.next_to = if from > self.floor {
            Some(from - 1)
        } else {
            None
        };
        Some((from, to))
    }
}

/// Returns every project the registry has recorded, de-duplicated, oldest first.
pub async fn discover_projects(
    reader: &dyn ChainReader,
    registry: Address,
    window: u64,
    start_block: u64,
) -> Result<Vec<ProjectInfo>, EngineError> {
    let (latest, expected) = tokio::try_join!(
        reader.block_number(),
        reader.project_count(registry)
    )
    .map_err(EngineError::discovery)?;

    if expected == 0 {
        tracing::info!(target: "discovery", %registry, "registry has no projects");
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let mut events: Vec<ProjectCreated> = Vec::new();
    let mut windows = 0usize;
    for (from, to) in scan_windows(latest, start_block, window) {
        let batch = reader
            .project_created(registry, from, to)
            .await
            .map_err(EngineError::discovery)?;
        windows += 1;
        if !batch.is_empty() {
            tracing::debug!(target: "discovery", from, to, found = batch.len(), "scanned window");
        }
        for event in batch {
            seen.insert(event.project.project);
            events.push(event);
        }
        if seen.len() as u64 >= expected {
            break;
        }
    }

    if (seen.len() as u64) < expected {
        tracing::warn!(
            target: "discovery",
            %registry,
            expected,
            found = seen.len(),
            "reached scan floor before accounting for every project"
        );
    }

    events.sort_by_key(|e| (e.block_number, e.log_index));
    let mut unique = HashSet::with_capacity(events.len());
    let projects: Vec<ProjectInfo> = events
        .into_iter()
        .filter(|e| unique.insert(e.project.project))
        .map(|e| e.project)
        .collect();

    tracing::info!(
        target: "discovery",
        %registry,
        projects = projects.len(),
        windows,
        "discovered projects"
    );
    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{project, MockChain};

    const REGISTRY: Address = Address::repeat_byte(0xee);

    #[test]
    fn windows_cover_range_without_gaps() {
        let windows: Vec<_> = scan_windows(25, 0, 10).collect();
        assert_eq!(windows, vec![(16, 25), (6, 15), (0, 5)]);

        let floored: Vec<_> = scan_windows(25, 12, 10).collect();
        assert_eq!(floored, vec![(16, 25), (12, 15)]);

        assert_eq!(scan_windows(5, 6, 10).count(), 0);
        assert_eq!(scan_windows(0, 0, 10).collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[tokio::test]
    async fn empty_registry_skips_scanning() {
        let chain = MockChain {
            latest_block: 1_000,
            ..MockChain::default()
        };
        let projects = discover_projects(&chain, REGISTRY, 10, 0).await.unwrap();
        assert!(projects.is_empty());
        assert!(chain.event_queries().is_empty());
    }

    #[tokio::test]
    async fn returns_projects_in_creation_order_regardless_of_windows() {
        let blocks = [3u64, 9, 10, 19, 20, 47, 47];
        for latest in [47u64, 50, 59, 60, 133] {
            let mut chain = MockChain {
                latest_block: latest,
                ..MockChain::default()
            };
            for (i, block) in blocks.iter().enumerate() {
                chain.add_project(*block, project(i as u8 + 1));
            }

            let projects = discover_projects(&chain, REGISTRY, 10, 0).await.unwrap();
            let ids: Vec<_> = projects.iter().map(|p| p.project).collect();
            let expected: Vec<_> = (1..=7u8).map(|i| project(i).project).collect();
            assert_eq!(ids, expected, "latest block {}", latest);
        }
    }

    #[tokio::test]
    async fn stops_once_count_is_reached() {
        let mut chain = MockChain {
            latest_block: 1_000,
            ..MockChain::default()
        };
        chain.add_project(995, project(1));
        chain.add_project(981, project(2));

        let projects = discover_projects(&chain, REGISTRY, 10, 0).await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0], project(2));
        // (991..=1000) then (981..=990)
        assert_eq!(chain.event_queries(), vec![(991, 1_000), (981, 990)]);
    }

    #[tokio::test]
    async fn duplicate_events_are_collapsed() {
        let mut chain = MockChain {
            latest_block: 30,
            ..MockChain::default()
        };
        chain.add_project(5, project(1));
        chain.add_project(25, project(1));
        chain.add_project(12, project(2));
        // Three events but two distinct projects: the count is never met, so the scan hits block 0.
        assert_eq!(chain.registry_count, 3);

        let projects = discover_projects(&chain, REGISTRY, 10, 0).await.unwrap();
        assert_eq!(projects, vec![project(1), project(2)]);
    }

    #[tokio::test]
    async fn respects_start_block() {
        let mut chain = MockChain {
            latest_block: 100,
            ..MockChain::default()
        };
        chain.add_project(95, project(1));
        chain.registry_count = 3;

        let projects = discover_projects(&chain, REGISTRY, 10, 80).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(chain.event_queries(), vec![(91, 100), (81, 90), (80, 80)]);
    }
}
