//! Per-chain deployment addresses and resolution of the connected network.

use alloy::primitives::address;
use clients_uniswapv3::UniswapV3Deployment;
use std::collections::HashMap;

use crate::chain::ChainReader;
use crate::error::EngineError;

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_ARBITRUM: u64 = 42161;
pub const CHAIN_BASE: u64 = 8453;
pub const CHAIN_BASE_SEPOLIA: u64 = 84532;

/// Immutable chain id → deployment map, injected into the engine.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: HashMap<u64, UniswapV3Deployment>,
    /// Host-label patterns, checked in insertion order
    hints: Vec<(Vec<String>, u64)>,
}

/// Labels that mark a test network; a host carrying one only matches a hint that names it.
const TESTNET_LABELS: &[&str] = &["sepolia", "goerli", "holesky", "testnet"];

fn labels(host: &str) -> Vec<String> {
    host.split(['.', '-'])
        .filter(|l| !l.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, chain_id: u64, deployment: UniswapV3Deployment) -> Self {
        self.networks.insert(chain_id, deployment);
        self
    }

    /// Maps hosts containing `pattern` as a run of whole labels to `chain_id`.
    ///
    /// Labels are split on `.` and `-`, so `base-sepolia` matches `base-sepolia.g.alchemy.com`
    /// but never `basesepolia.example` or `sepolia-base.example`.
    pub fn with_hint(mut self, pattern: &str, chain_id: u64) -> Self {
        let pattern = labels(pattern);
        if !pattern.is_empty() {
            self.hints.push((pattern, chain_id));
        }
        self
    }

    /// Canonical Uniswap V3 deployments on the supported networks.
    pub fn builtin() -> Self {
        let canonical = UniswapV3Deployment {
            pool_factory: address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
            position_manager: address!("C36442b4a4522E871399CD717aBDD847Ab11FE88"),
        };
        Self::new()
            .with_network(CHAIN_ETHEREUM, canonical)
            .with_network(CHAIN_ARBITRUM, canonical)
            .with_network(
                CHAIN_BASE,
                UniswapV3Deployment {
                    pool_factory: address!("33128a8fC17869897dcE68Ed026d694621f6FDfD"),
                    position_manager: address!("03a520b32C04BF3bEEf7BEb72E919cf822Ed34f1"),
                },
            )
            .with_network(
                CHAIN_BASE_SEPOLIA,
                UniswapV3Deployment {
                    pool_factory: address!("4752ba5DBc23f44D87826276BF6Fd6b1C372aD24"),
                    position_manager: address!("27F971cb582BF9E50F397e4d29a5C7A34f11faA2"),
                },
            )
            .with_hint("sepolia.base.org", CHAIN_BASE_SEPOLIA)
            .with_hint("base-sepolia", CHAIN_BASE_SEPOLIA)
            .with_hint("mainnet.base.org", CHAIN_BASE)
            .with_hint("base-mainnet", CHAIN_BASE)
            .with_hint("arb1.arbitrum.io", CHAIN_ARBITRUM)
            .with_hint("arb-mainnet", CHAIN_ARBITRUM)
            .with_hint("arbitrum-mainnet", CHAIN_ARBITRUM)
            .with_hint("eth-mainnet", CHAIN_ETHEREUM)
            .with_hint("mainnet.infura.io", CHAIN_ETHEREUM)
            .with_hint("eth.llamarpc.com", CHAIN_ETHEREUM)
    }

    pub fn get(&self, chain_id: u64) -> Option<UniswapV3Deployment> {
        self.networks.get(&chain_id).copied()
    }

    /// Guesses the chain from the RPC endpoint's host name.
    ///
    /// Hosts no hint recognizes yield `None`.
    pub fn infer_chain_id(&self, rpc_url: &str) -> Option<u64> {
        let host = url::Url::parse(rpc_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))?;
        let host = labels(&host);
        self.hints
            .iter()
            .find(|(pattern, _)| {
                let testnet_ok = host
                    .iter()
                    .filter(|l| TESTNET_LABELS.contains(&l.as_str()))
                    .all(|l| pattern.contains(l));
                testnet_ok && host.windows(pattern.len()).any(|w| w == pattern.as_slice())
            })
            .map(|(_, chain_id)| *chain_id)
    }
}

/// Network the engine is bound to for the duration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub chain_id: u64,
    pub deployment: UniswapV3Deployment,
}

/// Resolves the deployment for the connected chain.
///
/// Falls back to host-name inference only when the chain id itself cannot be read.
pub async fn resolve_network(
    reader: &dyn ChainReader,
    networks: &NetworkRegistry,
    rpc_url: &str,
) -> Result<ResolvedNetwork, EngineError> {
    let chain_id = match reader.chain_id().await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(
                target: "network",
                error = %e,
                rpc_url,
                "chain id lookup failed, inferring from endpoint"
            );
            networks.infer_chain_id(rpc_url).ok_or_else(|| {
                EngineError::Discovery(format!(
                    "could not determine chain id ({}) and endpoint {} matches no known network",
                    e, rpc_url
                ))
            })?
        }
    };

    let deployment = networks.get(chain_id).ok_or_else(|| {
        EngineError::Discovery(format!("unsupported chain id {}", chain_id))
    })?;
    tracing::info!(
        target: "network",
        chain_id,
        pool_factory = %deployment.pool_factory,
        position_manager = %deployment.position_manager,
        "resolved network"
    );
    Ok(ResolvedNetwork {
        chain_id,
        deployment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use alloy::primitives::Address;

    fn fixture() -> (NetworkRegistry, UniswapV3Deployment) {
        let deployment = UniswapV3Deployment {
            pool_factory: Address::repeat_byte(0xfa),
            position_manager: Address::repeat_byte(0xbb),
        };
        let registry = NetworkRegistry::new()
            .with_network(31337, deployment)
            .with_hint("localhost", 31337);
        (registry, deployment)
    }

    #[test]
    fn infers_from_host_names() {
        let builtin = NetworkRegistry::builtin();
        assert_eq!(
            builtin.infer_chain_id("https://mainnet.base.org"),
            Some(CHAIN_BASE)
        );
        assert_eq!(
            builtin.infer_chain_id("https://sepolia.base.org"),
            Some(CHAIN_BASE_SEPOLIA)
        );
        assert_eq!(
            builtin.infer_chain_id("https://base-sepolia.g.alchemy.com/v2/key"),
            Some(CHAIN_BASE_SEPOLIA)
        );
        assert_eq!(
            builtin.infer_chain_id("https://arb1.arbitrum.io/rpc"),
            Some(CHAIN_ARBITRUM)
        );
        assert_eq!(
            builtin.infer_chain_id("https://eth-mainnet.g.alchemy.com/v2/key"),
            Some(CHAIN_ETHEREUM)
        );
        assert_eq!(
            builtin.infer_chain_id("https://eth.llamarpc.com"),
            Some(CHAIN_ETHEREUM)
        );
        assert_eq!(builtin.infer_chain_id("http://10.0.0.1:8545"), None);
    }

    #[test]
    fn unknown_and_testnet_hosts_are_not_guessed() {
        let builtin = NetworkRegistry::builtin();
        for url in [
            "https://ethereum-sepolia-rpc.publicnode.com",
            "https://arbitrum-sepolia.infura.io/v3/k",
            "https://polygon-mainnet.g.alchemy.com/v2/k",
            "https://opt-mainnet.g.alchemy.com/v2/k",
            "https://database.example.com",
            "not a url",
        ] {
            assert_eq!(builtin.infer_chain_id(url), None, "{}", url);
        }
    }

    #[test]
    fn hints_match_whole_labels() {
        let registry = NetworkRegistry::new().with_hint("base", CHAIN_BASE);
        assert_eq!(
            registry.infer_chain_id("https://rpc.base.example"),
            Some(CHAIN_BASE)
        );
        assert_eq!(registry.infer_chain_id("https://database.example"), None);
        assert_eq!(registry.infer_chain_id("https://base-sepolia.example"), None);
    }

    #[tokio::test]
    async fn uses_reported_chain_id() {
        let (registry, deployment) = fixture();
        let chain = MockChain {
            chain_id: Some(31337),
            ..MockChain::default()
        };
        let resolved = resolve_network(&chain, &registry, "http://10.0.0.1:8545")
            .await
            .unwrap();
        assert_eq!(resolved.chain_id, 31337);
        assert_eq!(resolved.deployment, deployment);
    }

    #[tokio::test]
    async fn falls_back_to_endpoint_hint() {
        let (registry, _) = fixture();
        let chain = MockChain::default();
        let resolved = resolve_network(&chain, &registry, "http://localhost:8545")
            .await
            .unwrap();
        assert_eq!(resolved.chain_id, 31337);
    }

    #[tokio::test]
    async fn fails_when_neither_source_works() {
        let (registry, _) = fixture();
        let chain = MockChain::default();
        let err = resolve_network(&chain, &registry, "http://10.0.0.1:8545")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Discovery(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_chain() {
        let (registry, _) = fixture();
        let chain = MockChain {
            chain_id: Some(999),
            ..MockChain::default()
        };
        let err = resolve_network(&chain, &registry, "http://localhost:8545")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported chain id 999"));
    }
}
