//! Axum router configuration for membership endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    check_access, create_portal_session, get_subscription, handle_stripe_webhook,
    run_reconciliation, start_enrollment, MembershipAppState,
};

/// Create the membership API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `GET /` - Get current user's subscription
/// - `GET /access` - Check if user has access
/// - `POST /subscribe` - Start a paid enrollment
/// - `POST /portal` - Open the provider's billing portal
pub fn membership_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/", get(get_subscription))
        .route("/access", get(check_access))
        .route("/subscribe", post(start_enrollment))
        .route("/portal", post(create_portal_session))
}

/// Create the webhook router.
///
/// Separate from the membership routes because webhook deliveries carry no
/// user authentication; they are verified by signature.
///
/// # Routes
/// - `POST /stripe` - Ingest Stripe webhook events
pub fn webhook_routes() -> Router<MembershipAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the operator router.
///
/// # Routes
/// - `POST /reconcile` - Run one reconciliation sweep now
pub fn admin_routes() -> Router<MembershipAppState> {
    Router::new().route("/reconcile", post(run_reconciliation))
}

/// Create the complete membership module router.
///
/// Suitable for mounting at `/api`:
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", membership_router())
///     .with_state(app_state);
/// ```
pub fn membership_router() -> Router<MembershipAppState> {
    Router::new()
        .nest("/membership", membership_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/admin", admin_routes())
}
