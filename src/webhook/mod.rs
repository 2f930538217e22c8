mod events;

pub use events::*;

use anyhow::{Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Dayplan-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Dayplan-Timestamp";

/// Signatures older than this are rejected
const MAX_SKEW_SECS: i64 = 300;

/// Webhook delivery client
pub struct WebhookClient {
    http_client: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Deliver a webhook event to the specified URL
    pub async fn deliver(&self, url: &str, secret: &str, event: &WebhookEvent) -> Result<()> {
        let payload = serde_json::to_string(event).context("Failed to serialize webhook event")?;
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&payload, &timestamp, secret)?;

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, &timestamp)
            .body(payload)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .context("Failed to send webhook")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Webhook delivery failed: {} - {}", status, body);
        }

        tracing::info!(event = %event.event, "Delivered webhook");
        Ok(())
    }

    /// Verify an incoming webhook signature
    pub fn verify_signature(
        payload: &str,
        timestamp: &str,
        signature: &str,
        secret: &str,
    ) -> Result<bool> {
        let ts: i64 = timestamp.parse().context("Invalid timestamp")?;
        if (Utc::now().timestamp() - ts).abs() > MAX_SKEW_SECS {
            return Ok(false);
        }
        let expected = sign(payload, timestamp, secret)?;
        Ok(signature == expected)
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

/// HMAC-SHA256 of `"{timestamp}.{payload}"`, hex encoded
pub fn sign(payload: &str, timestamp: &str, secret: &str) -> Result<String> {
    let message = format!("{}.{}", timestamp, payload);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).context("Invalid HMAC key")?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_verification() {
        let payload = r#"{"event":"plan.generated"}"#;
        let timestamp = Utc::now().timestamp().to_string();
        let secret = "test_secret_123";

        let signature = sign(payload, &timestamp, secret).unwrap();

        assert!(WebhookClient::verify_signature(payload, &timestamp, &signature, secret).unwrap());

        // Wrong secret should fail
        assert!(
            !WebhookClient::verify_signature(payload, &timestamp, &signature, "wrong_secret")
                .unwrap()
        );
        // Tampered payload should fail
        assert!(
            !WebhookClient::verify_signature("{}", &timestamp, &signature, secret).unwrap()
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = "{}";
        let stale = (Utc::now().timestamp() - 3600).to_string();
        let signature = sign(payload, &stale, "secret").unwrap();
        assert!(!WebhookClient::verify_signature(payload, &stale, &signature, "secret").unwrap());
        assert!(WebhookClient::verify_signature(payload, "soon", &signature, "secret").is_err());
    }
}
