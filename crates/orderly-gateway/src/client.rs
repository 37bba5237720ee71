//! # Payment Gateway HTTP Client
//!
//! A thin typed client over the gateway's REST API. Two calls only:
//! checkout creation and server-side verification.
//!
//! ## Error Mapping
//! ```text
//! timeout / connect failure      → GatewayError::Unreachable
//! non-2xx response               → GatewayError::Rejected { status, body }
//! 2xx with unparseable body      → GatewayError::InvalidResponse
//! 2xx without a checkout URL     → GatewayError::InvalidResponse
//! ```
//!
//! The client holds no database state; persistence of the returned
//! session belongs to [`crate::service`].

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

// =============================================================================
// Wire Types
// =============================================================================

/// Checkout creation request body.
#[derive(Debug, Serialize)]
struct CheckoutRequest<'a> {
    fullname: &'a str,
    email: &'a str,
    /// Decimal major-unit amount as a string ("270.00"); the gateway's API
    /// takes decimals, our ledger stays in integer cents.
    amount: String,
    currency: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    webhook_url: &'a str,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    /// Some gateway versions call this `checkout_url`.
    #[serde(alias = "checkout_url")]
    payment_url: Option<String>,
    transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    transaction_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: String,
    #[serde(flatten)]
    rest: serde_json::Value,
}

// =============================================================================
// Public Results
// =============================================================================

/// A created checkout session: where to send the buyer, and the gateway's
/// ID for everything that follows.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub transaction_id: String,
}

/// The gateway's authoritative answer about a transaction.
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    /// Raw gateway status string ("COMPLETED", "FAILED", ...).
    pub status: String,
    /// Everything else the gateway returned, kept for the audit trail.
    pub details: serde_json::Value,
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentGatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl PaymentGatewayClient {
    /// Creates a client from configuration. Building the underlying
    /// reqwest client only fails on broken TLS backends.
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        Ok(PaymentGatewayClient { http, config })
    }

    /// Creates a hosted checkout session for an order.
    ///
    /// `metadata` travels to the gateway and comes back on webhooks; the
    /// service puts the order number in it for reconciliation.
    #[instrument(skip(self, metadata, fullname, email))]
    pub async fn create_checkout(
        &self,
        fullname: &str,
        email: &str,
        amount_cents: i64,
        metadata: serde_json::Value,
    ) -> GatewayResult<CheckoutSession> {
        let body = CheckoutRequest {
            fullname,
            email,
            amount: format_amount(amount_cents),
            currency: &self.config.currency,
            success_url: &self.config.success_url,
            cancel_url: &self.config.cancel_url,
            webhook_url: &self.config.webhook_url,
            metadata,
        };

        let url = format!("{}/checkout", self.config.base_url);
        debug!(%url, "Creating checkout session");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response).await?;
        let parsed: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let checkout_url = parsed
            .payment_url
            .ok_or_else(|| GatewayError::InvalidResponse("no checkout URL in response".into()))?;
        let transaction_id = parsed
            .transaction_id
            .ok_or_else(|| GatewayError::InvalidResponse("no transaction_id in response".into()))?;

        debug!(%transaction_id, "Checkout session created");

        Ok(CheckoutSession {
            checkout_url,
            transaction_id,
        })
    }

    /// Asks the gateway for the authoritative state of a transaction.
    ///
    /// This is the only trusted source of payment truth: redirects and
    /// even signed webhooks only *trigger* a verification.
    #[instrument(skip(self))]
    pub async fn verify(&self, transaction_id: &str) -> GatewayResult<VerifyOutcome> {
        let url = format!("{}/verify", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&VerifyRequest { transaction_id })
            .send()
            .await
            .map_err(map_transport_error)?;

        let response = check_status(response).await?;
        let parsed: VerifyResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        debug!(status = %parsed.status, "Verification result received");

        Ok(VerifyOutcome {
            status: parsed.status,
            details: parsed.rest,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Unreachable(err.to_string())
}

async fn check_status(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Formats integer cents as a decimal major-unit string ("27000" → "270.00").
fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

// =============================================================================
// Unit Tests
// =============================================================================
