use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn timestamp_ms() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}

/// HMAC-SHA256(credential, "{timestamp}.{body}") -> lowercase hex.
pub(crate) fn sign_body(credential: &str, timestamp: &str, body: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(credential.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid signing credential: {}", e))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
