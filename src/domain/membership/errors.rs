//! Membership-specific error types.
//!
//! Errors surfaced by the enrollment, query, and reconciliation paths.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFoundForUser | 404 |
//! | AlreadyEnrolled | 409 |
//! | AmbiguousExternalCustomer | 502 |
//! | PaymentFailed | 402 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{DomainError, ErrorCode, UserId};

/// Membership-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// No subscription exists for this user.
    NotFoundForUser(UserId),

    /// User already has a current (pending or active) subscription.
    ///
    /// An expected outcome of the enrollment guard, not a fault.
    AlreadyEnrolled(UserId),

    /// The provider returned more than one billing customer for an email.
    ///
    /// Surfaced to an operator rather than guessed; picking the wrong
    /// customer would misattribute billing.
    AmbiguousExternalCustomer { email: String, matches: usize },

    /// An outbound provider call failed.
    PaymentFailed { reason: String },

    /// Invalid state for the requested operation.
    InvalidState { current: String, attempted: String },

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Infrastructure error.
    Infrastructure(String),
}

impl MembershipError {
    pub fn not_found_for_user(user_id: UserId) -> Self {
        MembershipError::NotFoundForUser(user_id)
    }

    pub fn already_enrolled(user_id: UserId) -> Self {
        MembershipError::AlreadyEnrolled(user_id)
    }

    pub fn ambiguous_customer(email: impl Into<String>, matches: usize) -> Self {
        MembershipError::AmbiguousExternalCustomer {
            email: email.into(),
            matches,
        }
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        MembershipError::PaymentFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(current: impl Into<String>, attempted: impl Into<String>) -> Self {
        MembershipError::InvalidState {
            current: current.into(),
            attempted: attempted.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        MembershipError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        MembershipError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            MembershipError::NotFoundForUser(_) => ErrorCode::SubscriptionNotFound,
            MembershipError::AlreadyEnrolled(_) => ErrorCode::SubscriptionExists,
            MembershipError::AmbiguousExternalCustomer { .. } => ErrorCode::AmbiguousCustomer,
            MembershipError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            MembershipError::InvalidState { .. } => ErrorCode::InvalidStateTransition,
            MembershipError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            MembershipError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            MembershipError::NotFoundForUser(user_id) => {
                format!("No subscription found for user: {}", user_id)
            }
            MembershipError::AlreadyEnrolled(user_id) => {
                format!("User {} already has a current subscription", user_id)
            }
            MembershipError::AmbiguousExternalCustomer { email, matches } => {
                format!(
                    "Provider returned {} billing customers for email {}",
                    matches, email
                )
            }
            MembershipError::PaymentFailed { reason } => format!("Payment failed: {}", reason),
            MembershipError::InvalidState { current, attempted } => {
                format!("Cannot {} subscription in {} state", attempted, current)
            }
            MembershipError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            MembershipError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MembershipError::Infrastructure(_) | MembershipError::PaymentFailed { .. }
        )
    }
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MembershipError {}

impl From<DomainError> for MembershipError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::SubscriptionNotFound => MembershipError::Infrastructure(err.to_string()),
            ErrorCode::PaymentFailed => MembershipError::PaymentFailed {
                reason: err.to_string(),
            },
            ErrorCode::InvalidStateTransition => MembershipError::InvalidState {
                current: "unknown".to_string(),
                attempted: err.to_string(),
            },
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                MembershipError::ValidationFailed {
                    field: "unknown".to_string(),
                    message: err.to_string(),
                }
            }
            _ => MembershipError::Infrastructure(err.to_string()),
        }
    }
}

impl From<MembershipError> for DomainError {
    fn from(err: MembershipError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}
