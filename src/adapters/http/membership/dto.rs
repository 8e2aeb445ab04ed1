//! HTTP DTOs for the membership endpoints.
//!
//! These types define the JSON request/response structure for the
//! membership API. They are the boundary between HTTP and the application
//! layer.

use serde::{Deserialize, Serialize};

use crate::domain::membership::Subscription;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a paid enrollment.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    /// Email used to create or resolve the billing customer.
    pub email: String,
}

/// Request to open the provider-hosted billing portal.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalRequest {
    /// URL the portal redirects back to when the member is done.
    pub return_url: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response wrapper for subscription lookups.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    /// The subscription details, or null if the user has none.
    pub subscription: Option<SubscriptionViewResponse>,
}

/// Subscription details for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionViewResponse {
    /// Subscription ID.
    pub id: String,
    /// User ID.
    pub user_id: String,
    /// Current lifecycle status.
    pub status: String,
    /// Recurring subscription id at the payment provider, once linked.
    pub external_subscription_id: Option<String>,
    /// Whether the subscription grants access right now.
    pub has_access: bool,
    /// When the subscription row was created (ISO 8601).
    pub created_at: String,
    /// When the subscription was last updated (ISO 8601).
    pub updated_at: String,
}

impl From<&Subscription> for SubscriptionViewResponse {
    fn from(subscription: &Subscription) -> Self {
        Self {
            id: subscription.id.to_string(),
            user_id: subscription.user_id.to_string(),
            status: subscription.status.to_string(),
            external_subscription_id: subscription.external_subscription_id.clone(),
            has_access: subscription.has_access(),
            created_at: subscription.created_at.as_datetime().to_rfc3339(),
            updated_at: subscription.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

/// Response for access checks.
#[derive(Debug, Clone, Serialize)]
pub struct AccessCheckResponse {
    /// Whether the user currently has access.
    pub has_access: bool,
}

/// Response for enrollment initiation.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentResponse {
    /// The provider's hosted checkout URL.
    pub checkout_url: String,
    /// The pending subscription created for this enrollment.
    pub subscription: SubscriptionViewResponse,
}

/// Response for the billing portal.
#[derive(Debug, Clone, Serialize)]
pub struct PortalResponse {
    /// The provider's hosted portal URL.
    pub portal_url: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
