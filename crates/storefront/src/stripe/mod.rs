//! Stripe Checkout API client.
//!
//! Only the two calls the storefront needs: create a hosted checkout
//! session and read it back on the success redirect.
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_storefront::stripe::{CheckoutRequest, StripeClient};
//!
//! let client = StripeClient::new(&config.stripe);
//! let session = client.create_checkout_session(&request).await?;
//! // redirect the browser to session.url
//! ```

mod types;

pub use types::{CheckoutLineItem, CheckoutRequest, CheckoutSession, PaymentStatus};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Stripe answered with an error object.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A price could not be expressed in minor currency units.
    #[error("invalid amount for {0}")]
    InvalidAmount(String),

    /// The checkout session has no hosted payment URL.
    #[error("checkout session {0} has no payment URL")]
    MissingUrl(String),
}

#[derive(serde::Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(serde::Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Client for the Stripe REST API.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    /// Create a hosted checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails or Stripe rejects it.
    #[instrument(skip(self, request), fields(items = request.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&request.to_form_params())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a checkout session by ID.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the request fails or the session is unknown.
    #[instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.inner.api_base,
            urlencoding::encode(session_id)
        );
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn parse_response(response: reqwest::Response) -> Result<CheckoutSession, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Stripe API returned non-success status");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
