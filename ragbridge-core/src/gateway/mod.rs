//! # HTTP Gateway
//!
//! Exposes the chat service over HTTP: liveness endpoints, the
//! `POST /api/chat/ask` action, and a correlation-id middleware that tags
//! every request and echoes the id back to the caller.

mod server;

pub use server::{
    ApiError, AppState, CORRELATION_HEADER, CorrelationId, router as gateway_router,
    run as run_gateway, serve as serve_gateway,
};

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Name reported by the health endpoint.
    pub service_name: String,
    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            service_name: "ragbridge".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}
