use alloy::primitives::TxHash;
use anyhow::{Context, Result};
use reqwest::Client;

use crate::config::RemoteSignerConfig;
use crate::types::{SendCallRequest, SendCallResponse};
use crate::utils;

/// Client for the remote signing service that signs and broadcasts calls on behalf of a delegated wallet.
pub struct RemoteSigner {
    client: Client,
    base_url: String,
    app_id: String,
}

impl RemoteSigner {
    pub fn new(client: Client, config: RemoteSignerConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id,
        }
    }

    /// Submits `request`, authorised by `credential`, and returns the broadcast transaction hash.
    pub async fn send_call(&self, request: &SendCallRequest, credential: &str) -> Result<TxHash> {
        let body = serde_json::to_string(request)?;
        let timestamp = utils::timestamp_ms();
        let signature = utils::sign_body(credential, &timestamp, &body)?;
        let url = format!("{}/v1/wallets/{}/calls", self.base_url, request.caller);

        tracing::debug!(
            target: "signer",
            to = %request.to,
            function = %request.function,
            "submitting call to signing service"
        );

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-app-id", &self.app_id)
            .header("x-request-timestamp", &timestamp)
            .header("x-authorization-signature", signature)
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json::<SendCallResponse>()
            .await
            .context("signing service returned an unexpected body")?;

        Ok(resp.hash)
    }
}
