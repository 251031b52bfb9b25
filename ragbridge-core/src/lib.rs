//! # RagBridge Core
//!
//! Core library for RagBridge, a backend that answers questions through a
//! grounded orchestration service. Provides the orchestration adapter (history
//! window, payload builder, response probes, citation extraction, reply
//! normalization), configuration, the upstream transport, the chat service
//! and the HTTP gateway.

pub mod adapter;
pub mod chat;
pub mod config;
pub mod error;
pub mod gateway;
pub mod transport;
pub mod types;

// Re-export commonly used types at the crate root.
pub use adapter::{
    AnswerFormat, Citation, NormalizedReply, OrchestrationRequest, build_payload,
    extract_citations, normalize, normalize_body, probe_finish_reason, probe_text,
    window_history,
};
pub use chat::{AskQuestion, ChatAnswer, ChatService, TechnicalCode};
pub use config::{BridgeConfig, OrchestrationSettings, load_config, load_config_file};
pub use error::{BridgeError, ChatError, ConfigError, Result, TransportError};
pub use gateway::GatewayConfig;
pub use transport::{HttpTransport, MockTransport, OrchestrationTransport};
pub use types::{ChatTurn, Role};
