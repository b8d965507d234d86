use serde::{Deserialize, Serialize};

/// Configuration for RemoteSigner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSignerConfig {
    /// Base URL of the signing service, e.g. "https://signer.internal"
    pub base_url: String,
    /// Application identifier sent with every request
    pub app_id: String,
}
