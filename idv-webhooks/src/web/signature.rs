//! Webhook signature verification.
//!
//! The vendor signs each callback body with HMAC-SHA256 keyed by the shared
//! webhook token, and sends the base64 encoding of the raw digest in the
//! `X-AQID-Signature` header.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::{Config, ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-aqid-signature";

/// Verifies webhook requests against the shared secret.
#[derive(Clone)]
pub enum SignatureVerifier {
    /// Accept everything. Only built when test mode is on.
    Disabled,
    Hmac { secret: String },
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureVerifier::Disabled => f.write_str("Disabled"),
            SignatureVerifier::Hmac { .. } => f.write_str("Hmac { secret: <redacted> }"),
        }
    }
}

impl SignatureVerifier {
    pub fn hmac(secret: impl Into<String>) -> Self {
        SignatureVerifier::Hmac {
            secret: secret.into(),
        }
    }

    /// Build the verifier for a configuration.
    ///
    /// Fails when no secret is set and test mode is off.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.test_mode {
            return Ok(SignatureVerifier::Disabled);
        }
        match &config.webhook_security_token {
            Some(secret) => Ok(SignatureVerifier::hmac(secret.clone())),
            None => Err(ConfigError::MissingWebhookToken),
        }
    }

    /// Check a request's signature header against its body.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        let secret = match self {
            SignatureVerifier::Disabled => {
                debug!("webhook_signature_check_skipped_test_mode");
                return true;
            }
            SignatureVerifier::Hmac { secret } => secret,
        };

        let Some(signature) = headers.get(SIGNATURE_HEADER) else {
            warn!("webhook_signature_missing");
            return false;
        };
        let Ok(signature) = signature.to_str() else {
            warn!("webhook_signature_not_ascii");
            return false;
        };

        verify_signature(secret, body, signature)
    }
}

/// Base64 HMAC-SHA256 of `body` keyed by `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a base64 signature over `body`.
///
/// The digest comparison is constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let expected = match STANDARD.decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(signature_length = signature.len(), "webhook_signature_undecodable");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };
    mac.update(body);
    let valid = mac.verify_slice(&expected).is_ok();

    if !valid {
        warn!(body_length = body.len(), "webhook_signature_mismatch");
    }
    valid
}
