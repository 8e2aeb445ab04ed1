//! Webhook signature verification for Stripe deliveries.
//!
//! HMAC-SHA256 over `timestamp.payload` with constant-time comparison,
//! plus a timestamp window that bounds replay of captured deliveries.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::domain::membership::WebhookError;

use super::webhook_types::SignatureHeader;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Verifies webhook deliveries against the endpoint's signing secret.
pub struct WebhookVerifier {
    signing_secret: SecretString,
}

impl WebhookVerifier {
    pub fn new(signing_secret: SecretString) -> Self {
        Self { signing_secret }
    }

    /// Verifies the signature header against the raw request body.
    ///
    /// Verification happens on the raw bytes, before any JSON parsing.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;
        if age > MAX_TIMESTAMP_AGE_SECS {
            warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "Webhook delivery too old, possible replay"
            );
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_FUTURE_TOLERANCE_SECS {
            warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook timestamp in the future"
            );
            return Err(WebhookError::TimestampOutOfRange);
        }

        let mut mac = HmacSha256::new_from_slice(
            self.signing_secret.expose_secret().as_bytes(),
        )
        .map_err(|e| WebhookError::ParseError(format!("Invalid signing secret: {}", e)))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.as_slice().ct_eq(&header.v1_signature).unwrap_u8() != 1 {
            warn!("Webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        Ok(())
    }
}
