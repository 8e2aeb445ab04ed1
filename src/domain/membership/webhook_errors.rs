//! Webhook error types for provider event handling.
//!
//! Defines all error conditions that can occur while ingesting provider
//! events, with HTTP status code mapping and retryability semantics.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A payment arrived for a subscription this system has no record of.
    ///
    /// Real money with no local accounting. Never dropped silently.
    #[error("No local subscription for event: {0}")]
    NoLocalSubscription(String),

    /// Attempted state transition is not valid for the current status.
    #[error("Inconsistent state transition: {0}")]
    InconsistentTransition(String),

    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    ///
    /// Retryable errors indicate conditions a later delivery may resolve:
    /// storage faults, or an out-of-order event that becomes applicable
    /// once the events it depends on have arrived.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::Database(_)
                | WebhookError::NoLocalSubscription(_)
                | WebhookError::InconsistentTransition(_)
        )
    }

    /// Maps the error to the HTTP status code returned to the provider.
    ///
    /// Status codes determine the provider's retry behavior:
    /// - 4xx: client error, no retry
    /// - 5xx: server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::ParseError(_) | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::NoLocalSubscription(_)
            | WebhookError::InconsistentTransition(_)
            | WebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        use crate::domain::foundation::ErrorCode;
        match err.code {
            ErrorCode::InvalidStateTransition => {
                WebhookError::InconsistentTransition(err.message)
            }
            _ => WebhookError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_local_subscription_displays_reference() {
        let err = WebhookError::NoLocalSubscription("sub_ext_1".to_string());
        assert_eq!(
            format!("{}", err),
            "No local subscription for event: sub_ext_1"
        );
    }

    #[test]
    fn inconsistent_transition_displays_reason() {
        let err =
            WebhookError::InconsistentTransition("cannot go from pending to canceled".to_string());
        assert_eq!(
            format!("{}", err),
            "Inconsistent state transition: cannot go from pending to canceled"
        );
    }

    #[test]
    fn database_error_is_retryable() {
        assert!(WebhookError::Database("connection failed".to_string()).is_retryable());
    }

    #[test]
    fn no_local_subscription_is_retryable() {
        // The local row may appear once the checkout completion lands
        assert!(WebhookError::NoLocalSubscription("sub_ext_1".to_string()).is_retryable());
    }

    #[test]
    fn inconsistent_transition_is_retryable() {
        // Out-of-order delivery may apply cleanly on a later attempt
        assert!(WebhookError::InconsistentTransition("bad order".to_string()).is_retryable());
    }

    #[test]
    fn invalid_signature_is_not_retryable() {
        assert!(!WebhookError::InvalidSignature.is_retryable());
    }

    #[test]
    fn parse_error_is_not_retryable() {
        assert!(!WebhookError::ParseError("bad json".to_string()).is_retryable());
    }

    #[test]
    fn invalid_signature_returns_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn timestamp_out_of_range_returns_unauthorized() {
        assert_eq!(
            WebhookError::TimestampOutOfRange.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn parse_error_returns_bad_request() {
        assert_eq!(
            WebhookError::ParseError("syntax error".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn every_error_blocks_or_retries() {
        // No error variant acknowledges the delivery; acknowledgement is a
        // success-path outcome, not an error
        let errors = [
            WebhookError::InvalidSignature,
            WebhookError::TimestampOutOfRange,
            WebhookError::ParseError("bad json".to_string()),
            WebhookError::MissingField("id"),
            WebhookError::NoLocalSubscription("sub_ext_1".to_string()),
            WebhookError::InconsistentTransition("bad order".to_string()),
            WebhookError::Database("connection lost".to_string()),
        ];
        for err in errors {
            assert!(!err.status_code().is_success(), "{}", err);
        }
    }

    #[test]
    fn no_local_subscription_returns_internal_error() {
        assert_eq!(
            WebhookError::NoLocalSubscription("sub_ext_1".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_error_returns_internal_error() {
        assert_eq!(
            WebhookError::Database("connection lost".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_transition_domain_error_converts_to_inconsistent_transition() {
        use crate::domain::foundation::ErrorCode;
        let err: WebhookError =
            DomainError::new(ErrorCode::InvalidStateTransition, "refused").into();
        assert!(matches!(err, WebhookError::InconsistentTransition(_)));
    }
}
