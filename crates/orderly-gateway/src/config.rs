//! # Gateway Configuration
//!
//! Endpoint, credentials and callback URLs for the payment gateway.
//!
//! Configuration comes from environment variables in deployments and from
//! the builder in tests (pointing `base_url` at a wiremock server).

use std::env;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Hard ceiling on the request timeout so a misconfigured environment
/// can't leave checkout requests hanging for minutes.
const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// Payment gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL, no trailing slash.
    pub base_url: String,

    /// API key sent on every request.
    pub api_key: String,

    /// ISO currency code used for checkout amounts. Default: "USD"
    pub currency: String,

    /// Where the gateway redirects the buyer after a successful payment.
    pub success_url: String,

    /// Where the gateway redirects the buyer after cancelling.
    pub cancel_url: String,

    /// Where the gateway POSTs payment notifications.
    pub webhook_url: String,

    /// Shared secret for webhook HMAC verification. None disables
    /// verification (local development against gateways that don't sign).
    pub webhook_secret: Option<String>,

    /// Per-request timeout. Default: 10 seconds, capped at 60.
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Creates a configuration with required fields and sane defaults.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
        webhook_url: impl Into<String>,
    ) -> Self {
        GatewayConfig {
            base_url: trim_trailing_slash(base_url.into()),
            api_key: api_key.into(),
            currency: "USD".to_string(),
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
            webhook_url: webhook_url.into(),
            webhook_secret: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Loads configuration from `ORDERLY_GATEWAY_*` environment variables.
    ///
    /// Required: `ORDERLY_GATEWAY_URL`, `ORDERLY_GATEWAY_API_KEY`,
    /// `ORDERLY_GATEWAY_SUCCESS_URL`, `ORDERLY_GATEWAY_CANCEL_URL`,
    /// `ORDERLY_GATEWAY_WEBHOOK_URL`.
    /// Optional: `ORDERLY_GATEWAY_WEBHOOK_SECRET`, `ORDERLY_GATEWAY_CURRENCY`,
    /// `ORDERLY_GATEWAY_TIMEOUT_SECS`.
    pub fn from_env() -> GatewayResult<Self> {
        let mut config = GatewayConfig::new(
            required_var("ORDERLY_GATEWAY_URL")?,
            required_var("ORDERLY_GATEWAY_API_KEY")?,
            required_var("ORDERLY_GATEWAY_SUCCESS_URL")?,
            required_var("ORDERLY_GATEWAY_CANCEL_URL")?,
            required_var("ORDERLY_GATEWAY_WEBHOOK_URL")?,
        );

        if let Ok(secret) = env::var("ORDERLY_GATEWAY_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                config.webhook_secret = Some(secret);
            }
        }
        if let Ok(currency) = env::var("ORDERLY_GATEWAY_CURRENCY") {
            if !currency.is_empty() {
                config.currency = currency;
            }
        }
        if let Ok(secs) = env::var("ORDERLY_GATEWAY_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                config = config.timeout(Duration::from_secs(secs));
            }
        }

        Ok(config)
    }

    /// Sets the webhook shared secret.
    pub fn webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Sets the currency code.
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Sets the request timeout, clamped to the ceiling.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.min(MAX_TIMEOUT);
        self
    }
}

fn required_var(name: &str) -> GatewayResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::InvalidResponse(format!("missing environment variable {name}")))
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

// =============================================================================
// Unit Tests
// =============================================================================
