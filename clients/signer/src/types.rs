use alloy::primitives::{Address, Bytes, TxHash};
use serde::{Deserialize, Serialize};

/// Body of a send-call request to the signing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCallRequest {
    /// Delegated wallet the transaction is sent from
    pub caller: Address,
    pub chain_id: u64,
    /// Contract being called
    pub to: Address,
    /// ABI-encoded call
    pub data: Bytes,
    /// Human-readable function name, recorded by the service for audit
    pub function: String,
    /// Public key the service uses to verify the request signature, if registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCallResponse {
    pub hash: TxHash,
}
