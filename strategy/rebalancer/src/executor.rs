//! Sequential dispatch of planned calls through the external signing service.

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;

use crate::config::DelegationContext;
use crate::error::EngineError;
use crate::plan::PlannedAction;
use crate::types::{ActionRecord, ContractKind};

/// A state-mutating call as handed to the signing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    /// Delegated wallet the call is sent from
    pub caller: Address,
    pub target: Address,
    pub contract: ContractKind,
    pub function: &'static str,
    pub calldata: Bytes,
}

/// Signs and broadcasts one call on behalf of the delegated wallet.
///
/// Returns once the transaction hash is known; the engine never inspects receipts.
#[async_trait]
pub trait CallDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        delegation: &DelegationContext,
        call: &ContractCall,
    ) -> anyhow::Result<TxHash>;
}

/// Runs plans strictly in order and keeps the record of everything that landed.
///
/// Calls share one signing identity and nonce sequence, so the next call is only issued after
/// the previous one returned its hash.
pub struct SequentialDispatcher<'a> {
    dispatcher: &'a dyn CallDispatcher,
    delegation: &'a DelegationContext,
    records: Vec<ActionRecord>,
}

impl<'a> SequentialDispatcher<'a> {
    pub fn new(dispatcher: &'a dyn CallDispatcher, delegation: &'a DelegationContext) -> Self {
        Self {
            dispatcher,
            delegation,
            records: Vec::new(),
        }
    }

    /// Dispatches `actions` for `project` in order.
    ///
    /// On failure the error carries every action applied so far in this run, across projects.
    pub async fn run(
        &mut self,
        project: Address,
        actions: Vec<PlannedAction>,
    ) -> Result<(), EngineError> {
        for action in actions {
            let call = ContractCall {
                caller: self.delegation.wallet,
                target: action.target,
                contract: action.kind.contract(),
                function: action.kind.function_name(),
                calldata: action.calldata,
            };
            let tx_hash = match self.dispatcher.dispatch(self.delegation, &call).await {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::warn!(
                        target: "rebalance",
                        %project,
                        action = call.function,
                        applied = self.records.len(),
                        error = %e,
                        "dispatch failed"
                    );
                    return Err(EngineError::Execution {
                        project,
                        action: call.function.to_string(),
                        message: format!("{:#}", e),
                        applied: self.records.clone(),
                    });
                }
            };
            tracing::info!(
                target: "rebalance",
                %project,
                action = call.function,
                token_id = ?action.token_id,
                %tx_hash,
                "action submitted"
            );
            self.records.push(ActionRecord {
                project,
                token_id: action.token_id,
                action: action.kind,
                tx_hash,
            });
        }
        Ok(())
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ActionRecord> {
        self.records
    }
}
