//! Membership service binary.
//!
//! Wires the Postgres and Stripe adapters into the HTTP API, starts the
//! scheduled reconciliation sweep, and serves until shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use association_membership::adapters::http::{membership_router, MembershipAppState};
use association_membership::adapters::postgres::{
    PostgresCustomerStore, PostgresPaymentLedger, PostgresSubscriptionRepository,
};
use association_membership::adapters::stripe::{
    StripeConfig, StripePaymentAdapter, WebhookVerifier,
};
use association_membership::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    info!(
        environment = ?config.server.environment,
        test_mode = config.payment.is_test_mode(),
        "Starting membership service"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let stripe_config = StripeConfig::new(
        SecretString::new(config.payment.stripe_api_key.clone()),
        config.payment.stripe_price_id.clone(),
        config.payment.checkout_success_url.clone(),
        config.payment.checkout_cancel_url.clone(),
    );

    let state = MembershipAppState {
        subscription_repository: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        payment_ledger: Arc::new(PostgresPaymentLedger::new(pool.clone())),
        customer_store: Arc::new(PostgresCustomerStore::new(pool)),
        payment_provider: Arc::new(StripePaymentAdapter::new(stripe_config)),
        webhook_verifier: Arc::new(WebhookVerifier::new(SecretString::new(
            config.payment.stripe_webhook_secret.clone(),
        ))),
        pending_ttl: config.reconciliation.pending_ttl(),
        sweep_page_size: config.reconciliation.page_size,
    };

    spawn_reconciliation_loop(state.clone(), config.reconciliation.interval());

    let app = Router::new()
        .nest("/api", membership_router())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .with_state(state);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs the reconciliation sweep on a fixed interval.
///
/// A failed sweep is logged and retried at the next tick; the sweep is
/// idempotent so overlapping effects are not a concern.
fn spawn_reconciliation_loop(state: MembershipAppState, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick heals anything that drifted while down
        loop {
            ticker.tick().await;
            let handler = state.run_reconciliation_handler();
            match handler.run().await {
                Ok(summary) => {
                    info!(
                        scanned = summary.scanned,
                        activated = summary.activated,
                        lapsed = summary.lapsed,
                        first_payment_expired = summary.first_payment_expired,
                        failed = summary.failed,
                        "Reconciliation sweep finished"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation sweep failed");
                }
            }
        }
    });
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
