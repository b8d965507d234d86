//! Rebalance example: evaluate every project in a registry once and, when asked, rebalance.
//!
//! Usage: rebalance <registry_address> [rpc_url]
//!
//! Environment:
//!   REBALANCE_CONFIG       TOML file with engine parameters (defaults otherwise)
//!   DELEGATED_WALLET       wallet whose positions are managed
//!   DELEGATION_CREDENTIAL  secret presented to the signing service
//!   DELEGATION_PUBLIC_KEY  optional public key registered with the signing service
//!   SIGNER_URL             signing service base URL (required with REBALANCE_EXECUTE=1)
//!   SIGNER_APP_ID          application id sent to the signing service
//!   REBALANCE_EXECUTE=1    submit transactions instead of only reporting
//!   LOG_LEVEL, LOG_JSON    logging filter and format

mod logging;

use alloy::network::Ethereum;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, RootProvider};
use anyhow::Context;
use async_trait::async_trait;
use clients_signer::{RemoteSigner, RemoteSignerConfig, SendCallRequest};
use rebalancer::{
    CallDispatcher, ContractCall, DelegationContext, FailureReport, NetworkRegistry,
    RebalanceConfig, RebalanceEngine, RpcChainReader, DEFAULT_RPC_URL,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

/// Sends engine calls through the remote signing service.
struct SignerDispatcher {
    signer: RemoteSigner,
    chain_id: u64,
}

#[async_trait]
impl CallDispatcher for SignerDispatcher {
    async fn dispatch(
        &self,
        delegation: &DelegationContext,
        call: &ContractCall,
    ) -> anyhow::Result<TxHash> {
        let request = SendCallRequest {
            caller: call.caller,
            chain_id: self.chain_id,
            to: call.target,
            data: call.calldata.clone(),
            function: call.function.to_string(),
            public_key: delegation.public_key.clone(),
        };
        self.signer
            .send_call(&request, &delegation.credential)
            .await
            .with_context(|| format!("{} on {}", call.function, call.target))
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn load_config() -> anyhow::Result<RebalanceConfig> {
    match std::env::var("REBALANCE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            Ok(RebalanceConfig::from_toml_str(&raw)?)
        }
        Err(_) => Ok(RebalanceConfig::default()),
    }
}

fn load_delegation() -> anyhow::Result<Option<DelegationContext>> {
    let Ok(wallet) = std::env::var("DELEGATED_WALLET") else {
        return Ok(None);
    };
    let wallet = Address::from_str(wallet.trim()).context("DELEGATED_WALLET")?;
    Ok(Some(DelegationContext {
        wallet,
        credential: std::env::var("DELEGATION_CREDENTIAL").unwrap_or_default(),
        public_key: std::env::var("DELEGATION_PUBLIC_KEY").ok(),
    }))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fail(report: &FailureReport) -> ! {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(_) => eprintln!("{}", report.message),
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    logging::setup_logging(&log_level, env_flag("LOG_JSON"));

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!(
            "Usage: {} <registry_address> [rpc_url]",
            args.first().map(|s| s.as_str()).unwrap_or("rebalance")
        );
        std::process::exit(1);
    }
    let registry = args[1].trim();
    let rpc_url = args.get(2).map(|s| s.trim()).unwrap_or(DEFAULT_RPC_URL);

    let config = load_config()?;
    let delegation = load_delegation()?;
    let execute = env_flag("REBALANCE_EXECUTE");

    let provider = Arc::new(RootProvider::<Ethereum>::new_http(rpc_url.parse()?).erased());
    let reader = Arc::new(RpcChainReader::new(provider, config.retry.clone()));

    let engine = match RebalanceEngine::connect(
        reader,
        registry,
        rpc_url,
        &NetworkRegistry::builtin(),
        config,
        delegation,
    )
    .await
    {
        Ok(engine) => engine,
        Err(e) => fail(&FailureReport::from(e)),
    };

    if !execute {
        match engine.status_report().await {
            Ok(report) => print_json(&report)?,
            Err(failure) => fail(&failure),
        }
        return Ok(());
    }

    let signer_url = std::env::var("SIGNER_URL").context("SIGNER_URL is required to execute")?;
    let app_id = std::env::var("SIGNER_APP_ID").unwrap_or_else(|_| "rebalancer".to_string());
    let client = reqwest::Client::builder().build()?;
    let dispatcher = SignerDispatcher {
        signer: RemoteSigner::new(
            client,
            RemoteSignerConfig {
                base_url: signer_url,
                app_id,
            },
        ),
        chain_id: engine.network().chain_id,
    };

    match engine.execute_report(&dispatcher).await {
        Ok(report) => print_json(&report)?,
        Err(failure) => fail(&failure),
    }
    Ok(())
}
