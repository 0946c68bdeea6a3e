//! Inbound webhook authentication
//!
//! Two independent checks: a shared secret passed as a query parameter and an
//! HMAC-SHA256 signature of the raw body. Each check is skipped when its key is
//! not configured, which leaves the endpoint open in development.

use crate::config::WebhookConfig;
use crate::error::{AppError, AppResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<String>,
    public_key: Option<String>,
}

impl WebhookVerifier {
    pub fn new(config: &WebhookConfig) -> Self {
        if config.public_key.is_none() {
            warn!("ABACATEPAY_PUBLIC_KEY not set, webhook signatures will not be checked");
        }

        Self {
            secret: config.secret.clone(),
            public_key: config.public_key.clone(),
        }
    }

    /// Compare the `webhookSecret` query parameter with the configured secret
    pub fn check_secret(&self, provided: Option<&str>) -> AppResult<()> {
        let Some(expected) = self.secret.as_deref() else {
            return Ok(());
        };

        if !constant_time_eq(expected.as_bytes(), provided.unwrap_or_default().as_bytes()) {
            error!("webhook rejected: invalid secret");
            return Err(AppError::unauthorized("Invalid webhook secret"));
        }

        Ok(())
    }

    /// Check `X-Webhook-Signature` against the HMAC of the exact request bytes
    pub fn verify_signature(&self, payload: &[u8], signature: Option<&str>) -> AppResult<()> {
        let Some(key) = self.public_key.as_deref() else {
            warn!("webhook signature check skipped, no public key configured");
            return Ok(());
        };

        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            error!("webhook rejected: missing signature");
            return Err(AppError::unauthorized("Invalid signature"));
        };

        let expected = compute_signature(key, payload)?;
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            error!("webhook rejected: invalid signature");
            return Err(AppError::unauthorized("Invalid signature"));
        }

        Ok(())
    }
}

/// Base64 HMAC-SHA256 of `payload` keyed with `key`
pub fn compute_signature(key: &str, payload: &[u8]) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| AppError::internal(format!("Invalid webhook key: {}", e)))?;
    mac.update(payload);
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

// Length is not secret; the digest length is fixed.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected.ct_eq(provided).into()
}
