//! Upstream transport to the orchestration service.
//!
//! The adapter in [`crate::adapter`] is pure. This module owns the one network
//! call: post the built request and hand back whatever JSON came back, leaving
//! interpretation to [`crate::adapter::reply::normalize`].

use crate::adapter::payload::OrchestrationRequest;
use crate::config::TransportConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Message used when a failed upstream call carries no error message of its own.
pub const UPSTREAM_FAILED_MESSAGE: &str = "Upstream proxy call failed.";

pub const CORRELATION_HEADER: &str = "X-Correlation-ID";
pub const RESOURCE_GROUP_HEADER: &str = "AI-Resource-Group";

/// Sends orchestration requests upstream.
#[async_trait]
pub trait OrchestrationTransport: Send + Sync {
    /// Post one request and return the parsed response body.
    ///
    /// An empty success body is returned as `Value::Null`.
    async fn send(
        &self,
        request: &OrchestrationRequest,
        correlation_id: &str,
    ) -> Result<Value, TransportError>;
}

/// reqwest-backed transport posting to `base_url + endpoint`.
pub struct HttpTransport {
    client: Client,
    base_url: Option<String>,
    endpoint: String,
    resource_group: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl HttpTransport {
    /// Create a transport from configuration.
    ///
    /// A missing base URL is accepted here and reported on the first `send`, so
    /// a local-fallback deployment can start without one.
    pub fn new(config: &TransportConfig, endpoint: &str) -> Result<Self, TransportError> {
        let timeout_secs = config.timeout_secs();
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .build()
            .map_err(|e| TransportError::Request {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        let api_key = config.api_key_env.as_deref().and_then(|var| {
            let key = std::env::var(var).ok().filter(|k| !k.is_empty());
            if key.is_none() {
                warn!(env = var, "API key variable is not set; sending without Authorization");
            }
            key
        });

        Ok(Self {
            client,
            base_url: config
                .base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            endpoint: endpoint.to_string(),
            resource_group: config.resource_group.clone(),
            api_key,
            timeout_secs,
        })
    }

    /// Full URL requests are posted to, if a base URL is configured.
    pub fn url(&self) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, self.endpoint))
    }

    /// Map a non-success status and its body to a `TransportError`.
    ///
    /// The upstream's own `error.message` is preferred when the body carries one.
    fn map_http_error(status: reqwest::StatusCode, body: &str) -> TransportError {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")?
                    .get("message")?
                    .as_str()
                    .map(|s| s.to_string())
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UPSTREAM_FAILED_MESSAGE.to_string());
        debug!(status = status.as_u16(), body = %body, "Upstream returned an error status");
        TransportError::Upstream {
            status: status.as_u16(),
            message,
        }
    }

    /// Parse a success body. Blank means no response.
    fn parse_body(body: &str) -> Result<Value, TransportError> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body).map_err(|e| TransportError::InvalidBody {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl OrchestrationTransport for HttpTransport {
    async fn send(
        &self,
        request: &OrchestrationRequest,
        correlation_id: &str,
    ) -> Result<Value, TransportError> {
        let url = self.url().ok_or_else(|| TransportError::Request {
            message: "transport.base_url is not configured".to_string(),
        })?;

        debug!(url = %url, correlation_id, "Posting orchestration request");

        let mut builder = self
            .client
            .post(&url)
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .header(RESOURCE_GROUP_HEADER, &self.resource_group)
            .header(CORRELATION_HEADER, correlation_id)
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                TransportError::Request {
                    message: format!("Request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TransportError::Request {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body));
        }
        Self::parse_body(&body)
    }
}

/// A transport that replays a fixed outcome and records what it was sent.
pub struct MockTransport {
    outcome: Mutex<MockOutcome>,
    sent: Mutex<Vec<(OrchestrationRequest, String)>>,
}

enum MockOutcome {
    Body(Value),
    Failure { status: u16, message: String },
}

impl MockTransport {
    /// Always answer with `body`.
    pub fn with_body(body: Value) -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Body(body)),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with an upstream status.
    pub fn with_failure(status: u16, message: &str) -> Self {
        Self {
            outcome: Mutex::new(MockOutcome::Failure {
                status,
                message: message.to_string(),
            }),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Replace the body answered from now on.
    pub fn set_body(&self, body: Value) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = MockOutcome::Body(body);
    }

    /// Requests received so far, with their correlation ids.
    pub fn sent(&self) -> Vec<(OrchestrationRequest, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl OrchestrationTransport for MockTransport {
    async fn send(
        &self,
        request: &OrchestrationRequest,
        correlation_id: &str,
    ) -> Result<Value, TransportError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((request.clone(), correlation_id.to_string()));
        match &*self.outcome.lock().unwrap_or_else(PoisonError::into_inner) {
            MockOutcome::Body(body) => Ok(body.clone()),
            MockOutcome::Failure { status, message } => Err(TransportError::Upstream {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}
