//! Engine failures and the serializable report handed back to callers.

use alloy::primitives::Address;
use serde::Serialize;
use thiserror::Error;

use crate::chain::ChainError;
use crate::types::ActionRecord;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Project discovery failed: {0}")]
    Discovery(String),

    #[error("Position discovery failed: {0}")]
    PositionDiscovery(String),

    #[error("NAV target price is zero for project {project}")]
    NavTargetZero { project: Address },

    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("Policy failure: {0}")]
    Policy(String),

    /// Raised after zero or more actions already landed; `applied` lists them.
    #[error("Execution failed for project {project} at {action}: {message}")]
    Execution {
        project: Address,
        action: String,
        message: String,
        applied: Vec<ActionRecord>,
    },
}

impl EngineError {
    pub(crate) fn discovery(err: ChainError) -> Self {
        EngineError::Discovery(err.to_string())
    }

    pub(crate) fn position_discovery(err: ChainError) -> Self {
        EngineError::PositionDiscovery(err.to_string())
    }

    pub(crate) fn provider(err: ChainError) -> Self {
        EngineError::Provider(err.to_string())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InvalidInput(_) => ErrorCategory::InvalidInput,
            EngineError::Discovery(_) => ErrorCategory::DiscoveryFailure,
            EngineError::PositionDiscovery(_) => ErrorCategory::PositionDiscoveryFailure,
            EngineError::NavTargetZero { .. } => ErrorCategory::NavTargetZero,
            EngineError::Provider(_) => ErrorCategory::ProviderFailure,
            EngineError::Policy(_) => ErrorCategory::PolicyFailure,
            EngineError::Execution { .. } => ErrorCategory::ExecutionFailure,
        }
    }
}

/// Machine-readable failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidInput,
    DiscoveryFailure,
    PositionDiscoveryFailure,
    NavTargetZero,
    ProviderFailure,
    PolicyFailure,
    ExecutionFailure,
}

/// Structured failure returned across the engine boundary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions_applied: Vec<ActionRecord>,
}

impl From<EngineError> for FailureReport {
    fn from(err: EngineError) -> Self {
        let category = err.category();
        let message = err.to_string();
        let actions_applied = match err {
            EngineError::Execution { applied, .. } => applied,
            _ => Vec::new(),
        };
        FailureReport {
            category,
            message,
            actions_applied,
        }
    }
}
