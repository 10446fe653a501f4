//! Messaging gateway client.
//!
//! [`TextGatewayClient`] posts one text message per call to
//! `{base}/message/sendText/{instance}` with an `apikey` header. A non-2xx
//! response is a [`DispatchError`]. On success the provider acknowledgment is
//! parsed for the conversation and message ids; a body that cannot be parsed
//! is logged and the dispatch still counts as delivered.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default HTTP timeout for a single dispatch. Kept well under the
/// inter-message delay.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of an error response body kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for gateway dispatch failures.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status code.
    #[error("Gateway returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The client could not be built from its configuration.
    #[error("Invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

/// Identifiers returned by the provider for an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub remote_jid: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendTextResponse {
    key: MessageKey,
}

#[derive(Deserialize)]
struct MessageKey {
    #[serde(rename = "remoteJid")]
    remote_jid: Option<String>,
    id: Option<String>,
}

// ---------------------------------------------------------------------------
// MessageGateway
// ---------------------------------------------------------------------------

/// Sends one text message through a channel instance.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<DispatchReceipt, DispatchError>;
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Connection settings for the messaging gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `MESSAGING_GATEWAY_URL` is not set.
    ///
    /// | Variable                          | Required | Default |
    /// |-----------------------------------|----------|---------|
    /// | `MESSAGING_GATEWAY_URL`           | yes      |         |
    /// | `MESSAGING_GATEWAY_API_KEY`       | no       | empty   |
    /// | `MESSAGING_GATEWAY_TIMEOUT_SECS`  | no       | `30`    |
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("MESSAGING_GATEWAY_URL").ok()?;
        Some(Self {
            base_url,
            api_key: std::env::var("MESSAGING_GATEWAY_API_KEY").unwrap_or_default(),
            timeout: std::env::var("MESSAGING_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// Keep the request timeout under the minimum gap between dispatches.
    ///
    /// A timeout at or above `fixed_delay` is cut to half of it. A zero
    /// delay leaves the timeout as configured.
    pub fn bounded_by(mut self, fixed_delay: Duration) -> Self {
        if !fixed_delay.is_zero() && self.timeout >= fixed_delay {
            let bounded = fixed_delay / 2;
            tracing::warn!(
                timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                bounded_ms = u64::try_from(bounded.as_millis()).unwrap_or(u64::MAX),
                "Gateway timeout is not under the dispatch delay, lowering it"
            );
            self.timeout = bounded;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// TextGatewayClient
// ---------------------------------------------------------------------------

/// HTTP implementation of [`MessageGateway`].
#[derive(Debug)]
pub struct TextGatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl TextGatewayClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: GatewayConfig) -> Result<Self, DispatchError> {
        if config.base_url.trim().is_empty() {
            return Err(DispatchError::InvalidConfig(
                "gateway base URL is empty".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn send_text_url(&self, instance: &str) -> String {
        format!(
            "{}/message/sendText/{}",
            self.config.base_url.trim_end_matches('/'),
            instance
        )
    }

    fn parse_receipt(instance: &str, body: &str) -> DispatchReceipt {
        match serde_json::from_str::<SendTextResponse>(body) {
            Ok(parsed) => DispatchReceipt {
                remote_jid: parsed.key.remote_jid,
                message_id: parsed.key.id,
            },
            Err(e) => {
                tracing::warn!(
                    instance,
                    error = %e,
                    "Could not parse gateway acknowledgment, keeping dispatch as sent"
                );
                DispatchReceipt::default()
            }
        }
    }
}

#[async_trait]
impl MessageGateway for TextGatewayClient {
    async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        let response = self
            .client
            .post(self.send_text_url(instance))
            .header("apikey", &self.config.api_key)
            .json(&SendTextRequest { number, text })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DispatchError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(Self::parse_receipt(instance, &body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
