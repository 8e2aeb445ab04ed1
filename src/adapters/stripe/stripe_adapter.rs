//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API.
//! Requests are form-encoded POSTs authenticated with the secret API key;
//! the key never leaves `secrecy::SecretString` except at the auth header.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::UserId;
use crate::ports::{
    CheckoutSessionRef, PaymentError, PaymentErrorCode, PaymentProvider, PortalSession,
    ProviderCustomer,
};

use super::webhook_types::{StripeCheckoutSession, StripeCustomer, StripeCustomerList};

/// Checkout sessions expire after 24 hours unless Stripe says otherwise.
const DEFAULT_SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Price id of the membership plan (price_...).
    price_id: String,

    /// Where checkout redirects on success.
    success_url: String,

    /// Where checkout redirects when abandoned.
    cancel_url: String,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(
        api_key: SecretString,
        price_id: impl Into<String>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            price_id: price_id.into(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe implementation of the PaymentProvider port.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn check_response(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(%status, error = %error_text, "Stripe {} failed", operation);

        let code = match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                PaymentErrorCode::AuthenticationError
            }
            reqwest::StatusCode::NOT_FOUND => PaymentErrorCode::NotFound,
            reqwest::StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimitExceeded,
            _ => PaymentErrorCode::ProviderError,
        };
        Err(PaymentError::new(
            code,
            format!("Stripe API error: {}", error_text),
        )
        .with_provider_code(status.as_str().to_string()))
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<ProviderCustomer, PaymentError> {
        let url = format!("{}/v1/customers", self.config.api_base_url);

        let params = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let response = self.check_response(response, "create_customer").await?;

        let customer: StripeCustomer = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(ProviderCustomer {
            id: customer.id,
            email: customer.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn find_customers_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<ProviderCustomer>, PaymentError> {
        let url = format!("{}/v1/customers", self.config.api_base_url);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(&[("email", email), ("limit", "10")])
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let response = self
            .check_response(response, "find_customers_by_email")
            .await?;

        let list: StripeCustomerList = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(list
            .data
            .into_iter()
            .filter(|c| !c.deleted)
            .map(|c| ProviderCustomer {
                id: c.id,
                email: c.email.unwrap_or_else(|| email.to_string()),
            })
            .collect())
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
    ) -> Result<CheckoutSessionRef, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let params = [
            ("mode", "subscription".to_string()),
            ("customer", customer_id.to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let response = self
            .check_response(response, "create_checkout_session")
            .await?;

        let session: StripeCheckoutSession = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        let expires_at = session
            .expires_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp() + DEFAULT_SESSION_TTL_SECS);
        let hosted_url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session has no hosted URL"))?;

        Ok(CheckoutSessionRef {
            id: session.id,
            url: hosted_url,
            expires_at,
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let url = format!("{}/v1/billing_portal/sessions", self.config.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&[("customer", customer_id), ("return_url", return_url)])
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;
        let response = self
            .check_response(response, "create_portal_session")
            .await?;

        #[derive(Deserialize)]
        struct PortalSessionResponse {
            id: String,
            url: String,
        }

        let portal: PortalSessionResponse = response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(PortalSession {
            id: portal.id,
            url: portal.url,
        })
    }
}
