//! HTTP handlers for membership endpoints.
//!
//! These handlers connect Axum routes to application layer command/query
//! handlers. Webhook deliveries are verified against the raw body before
//! any JSON parsing happens.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, info};

use crate::adapters::stripe::{StripeWebhookEvent, WebhookVerifier};
use crate::application::handlers::membership::{
    BillingPortalHandler, CheckActiveHandler, CustomerIdentityMapper, GetSubscriptionHandler,
    ProcessWebhookEventHandler, RunReconciliationHandler, StartEnrollmentCommand,
    StartEnrollmentHandler, WebhookOutcome,
};
use crate::domain::foundation::UserId;
use crate::domain::membership::{MembershipError, WebhookError};
use crate::ports::{CustomerStore, PaymentLedger, PaymentProvider, SubscriptionRepository};

use super::dto::{
    AccessCheckResponse, EnrollmentResponse, ErrorResponse, PortalRequest, PortalResponse,
    SubscribeRequest, SubscriptionResponse, SubscriptionViewResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; all dependencies are Arc-wrapped.
#[derive(Clone)]
pub struct MembershipAppState {
    pub subscription_repository: Arc<dyn SubscriptionRepository>,
    pub payment_ledger: Arc<dyn PaymentLedger>,
    pub customer_store: Arc<dyn CustomerStore>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub webhook_verifier: Arc<WebhookVerifier>,
    /// How long an enrollment may sit pending before the sweep writes it off.
    pub pending_ttl: chrono::Duration,
    /// Rows fetched per page during a sweep.
    pub sweep_page_size: u32,
}

impl MembershipAppState {
    /// Create handlers on demand from the shared state.
    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.subscription_repository.clone())
    }

    pub fn check_active_handler(&self) -> CheckActiveHandler {
        CheckActiveHandler::new(self.subscription_repository.clone())
    }

    pub fn start_enrollment_handler(&self) -> StartEnrollmentHandler {
        StartEnrollmentHandler::new(
            self.subscription_repository.clone(),
            self.payment_provider.clone(),
            Arc::new(CustomerIdentityMapper::new(
                self.customer_store.clone(),
                self.payment_provider.clone(),
            )),
        )
    }

    pub fn billing_portal_handler(&self) -> BillingPortalHandler {
        BillingPortalHandler::new(
            self.subscription_repository.clone(),
            self.payment_provider.clone(),
        )
    }

    pub fn process_webhook_event_handler(&self) -> ProcessWebhookEventHandler {
        ProcessWebhookEventHandler::new(
            self.subscription_repository.clone(),
            self.payment_ledger.clone(),
        )
    }

    pub fn run_reconciliation_handler(&self) -> RunReconciliationHandler {
        RunReconciliationHandler::new(
            self.subscription_repository.clone(),
            self.payment_ledger.clone(),
            self.pending_ttl,
            self.sweep_page_size,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context (would come from auth middleware in production)
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from the request.
///
/// In production this would come from JWT/session validation. For now it
/// uses a header-based extraction for development/testing.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // In production this would validate a bearer token; for
            // development we accept an X-User-Id header
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| UserId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/membership - Get the current user's subscription
pub async fn get_subscription(
    State(state): State<MembershipAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, MembershipApiError> {
    let handler = state.get_subscription_handler();
    let subscription = handler.current_subscription(&user.user_id).await?;

    let response = SubscriptionResponse {
        subscription: subscription.as_ref().map(SubscriptionViewResponse::from),
    };
    Ok(Json(response))
}

/// GET /api/membership/access - Check if the user has access right now
pub async fn check_access(
    State(state): State<MembershipAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, MembershipApiError> {
    let handler = state.check_active_handler();
    let has_access = handler.is_active(&user.user_id).await?;

    Ok(Json(AccessCheckResponse { has_access }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/membership/subscribe - Start a paid enrollment
pub async fn start_enrollment(
    State(state): State<MembershipAppState>,
    user: AuthenticatedUser,
    Json(request): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let handler = state.start_enrollment_handler();
    let cmd = StartEnrollmentCommand {
        user_id: user.user_id,
        email: request.email,
    };

    let result = handler.handle(cmd).await?;

    let response = EnrollmentResponse {
        checkout_url: result.checkout_session.url,
        subscription: SubscriptionViewResponse::from(&result.subscription),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/membership/portal - Open the provider's billing portal
pub async fn create_portal_session(
    State(state): State<MembershipAppState>,
    user: AuthenticatedUser,
    Json(request): Json<PortalRequest>,
) -> Result<impl IntoResponse, MembershipApiError> {
    let handler = state.billing_portal_handler();
    let session = handler
        .create_session(&user.user_id, &request.return_url)
        .await?;

    let response = PortalResponse {
        portal_url: session.url,
    };
    Ok(Json(response))
}

/// POST /api/admin/reconcile - Run one reconciliation sweep
///
/// Also runs on a timer; the endpoint exists so an operator can force a
/// sweep after an incident without waiting for the next tick.
pub async fn run_reconciliation(
    State(state): State<MembershipAppState>,
    _user: AuthenticatedUser, // Would check operator role in production
) -> Result<impl IntoResponse, MembershipApiError> {
    let handler = state.run_reconciliation_handler();
    let summary = handler.run().await?;

    info!(
        scanned = summary.scanned,
        transitions = summary.transitions(),
        failed = summary.failed,
        "Reconciliation sweep triggered via API"
    );
    Ok(Json(summary))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Ingest Stripe webhook events
///
/// No user authentication; deliveries are authenticated by signature over
/// the raw body. The returned status code drives Stripe's retry behavior.
pub async fn handle_stripe_webhook(
    State(state): State<MembershipAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, WebhookApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingField("Stripe-Signature"))?;

    state.webhook_verifier.verify(&body, signature)?;

    let event: StripeWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::ParseError(format!("Invalid event payload: {}", e)))?;

    let Some(provider_event) = event.to_provider_event()? else {
        debug!(event_id = %event.id, event_type = %event.event_type, "Webhook event type not handled");
        return Ok(StatusCode::OK);
    };

    let handler = state.process_webhook_event_handler();
    let outcome = handler.handle(provider_event).await?;

    match outcome {
        WebhookOutcome::Applied => {
            info!(event_id = %event.id, event_type = %event.event_type, "Webhook event applied");
        }
        WebhookOutcome::AlreadyApplied => {
            info!(event_id = %event.id, event_type = %event.event_type, "Webhook event replayed, no change");
        }
        WebhookOutcome::Ignored => {
            debug!(event_id = %event.id, event_type = %event.event_type, "Webhook event ignored");
        }
    }

    Ok(StatusCode::OK)
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts membership errors to HTTP responses.
pub struct MembershipApiError(MembershipError);

impl From<MembershipError> for MembershipApiError {
    fn from(err: MembershipError) -> Self {
        Self(err)
    }
}

impl From<crate::domain::foundation::DomainError> for MembershipApiError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        Self(MembershipError::from(err))
    }
}

impl IntoResponse for MembershipApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code) = match &self.0 {
            MembershipError::NotFoundForUser(_) => {
                (StatusCode::NOT_FOUND, "SUBSCRIPTION_NOT_FOUND")
            }
            MembershipError::AlreadyEnrolled(_) => (StatusCode::CONFLICT, "ALREADY_ENROLLED"),
            MembershipError::AmbiguousExternalCustomer { .. } => {
                (StatusCode::BAD_GATEWAY, "AMBIGUOUS_BILLING_CUSTOMER")
            }
            MembershipError::PaymentFailed { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "PAYMENT_FAILED")
            }
            MembershipError::InvalidState { .. } => {
                (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION")
            }
            MembershipError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            MembershipError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse::new(error_code, self.0.message());
        (status, Json(body)).into_response()
    }
}

/// API error type for the webhook endpoint.
///
/// Unlike member-facing errors, the status code here is a signal to the
/// provider: 2xx acknowledges, 4xx drops, 5xx requests redelivery.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let error_code = match &self.0 {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            WebhookError::ParseError(_) => "PARSE_ERROR",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::NoLocalSubscription(_) => "NO_LOCAL_SUBSCRIPTION",
            WebhookError::InconsistentTransition(_) => "INCONSISTENT_TRANSITION",
            WebhookError::Database(_) => "INTERNAL_ERROR",
        };

        let body = ErrorResponse::new(error_code, self.0.to_string());
        (status, Json(body)).into_response()
    }
}
