//! Error types for the RagBridge core.
//!
//! Uses `thiserror` for public API error types. The orchestration adapter
//! itself never fails: malformed upstream data is encoded in the returned
//! `NormalizedReply`. These errors cover the layers around it.

use std::path::PathBuf;

/// Top-level error type for the RagBridge core library, returned by the
/// gateway entry points.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the call to the upstream orchestration service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Orchestration request failed: {message}")]
    Request { message: String },

    #[error("Upstream returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream body is not valid JSON: {message}")]
    InvalidBody { message: String },

    #[error("Orchestration request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl TransportError {
    /// HTTP status the request-handling layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            TransportError::Upstream { status, .. } if *status >= 400 => *status,
            TransportError::Timeout { .. } => 504,
            _ => 502,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<Box<figment::Error>> for ConfigError {
    fn from(err: Box<figment::Error>) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the chat service to the request-handling layer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid question: {reason}")]
    InvalidQuestion { reason: String },

    #[error("AI Core reported an error: {message}")]
    Upstream { message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ChatError {
    /// HTTP status for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::InvalidQuestion { .. } => 400,
            ChatError::Upstream { .. } => 502,
            ChatError::Transport(err) => err.status_code(),
        }
    }

    /// Stable machine-readable code for API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::InvalidQuestion { .. } => "INVALID_QUESTION",
            ChatError::Upstream { .. } => "AI_CORE_ERROR",
            ChatError::Transport(TransportError::Timeout { .. }) => "UPSTREAM_TIMEOUT",
            ChatError::Transport(_) => "UPSTREAM_FAILED",
        }
    }
}

/// A type alias for results using the top-level `BridgeError`.
pub type Result<T> = std::result::Result<T, BridgeError>;
