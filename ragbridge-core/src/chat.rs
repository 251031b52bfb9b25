//! Chat service: one grounded question in, one answer out.
//!
//! Wires the pure adapter to a transport. Everything that can go wrong with the
//! response content is already encoded by [`crate::adapter::reply::normalize`];
//! the service only fails on an invalid question, a transport failure, or an
//! error the upstream reported in its body.

use crate::adapter::citations::Citation;
use crate::adapter::payload;
use crate::adapter::reply::{self, AnswerFormat, NormalizedReply};
use crate::config::{BridgeConfig, OrchestrationSettings};
use crate::error::{ChatError, TransportError};
use crate::transport::{HttpTransport, OrchestrationTransport};
use crate::types::ChatTurn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub const LOCAL_FALLBACK_MODEL: &str = "local-fallback";

/// Machine-readable outcome of a successful ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TechnicalCode {
    /// Reply text was extracted from the response.
    Ok,
    /// The call succeeded but no known shape matched; the answer is a fallback message.
    Partial,
    /// Answered locally without calling the upstream.
    LocalFallback,
}

/// One question as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AskQuestion {
    pub question: String,
    pub repository_id: Option<String>,
    pub conversation_id: Option<String>,
    pub history: Vec<ChatTurn>,
    /// Caller-supplied correlation id; generated when absent.
    #[serde(skip)]
    pub correlation_id: Option<String>,
}

impl AskQuestion {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerBody {
    pub format: AnswerFormat,
    pub markdown: Option<String>,
    pub plain_text: String,
    pub finish_reason: Option<String>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub latency_ms: u64,
}

/// The answer returned to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub conversation_id: Option<String>,
    /// Reserved for persisted messages; always null.
    pub message_id: Option<String>,
    pub answer: AnswerBody,
    pub citations: Vec<Citation>,
    pub model: ModelInfo,
    pub technical_code: TechnicalCode,
    pub correlation_id: String,
}

impl ChatAnswer {
    fn from_reply(
        reply: NormalizedReply,
        model_name: &str,
        latency_ms: u64,
        conversation_id: Option<String>,
        correlation_id: String,
    ) -> Self {
        let technical_code = if reply.parsed {
            TechnicalCode::Ok
        } else {
            TechnicalCode::Partial
        };
        let markdown = (reply.format == AnswerFormat::Markdown).then(|| reply.reply.clone());
        Self {
            conversation_id,
            message_id: None,
            answer: AnswerBody {
                format: reply.format,
                markdown,
                plain_text: reply.reply,
                finish_reason: reply.finish_reason,
                truncated: reply.truncated,
            },
            citations: reply.citations,
            model: ModelInfo {
                name: model_name.to_string(),
                latency_ms,
            },
            technical_code,
            correlation_id,
        }
    }

    fn local_fallback(
        question: &str,
        conversation_id: Option<String>,
        correlation_id: String,
    ) -> Self {
        Self {
            conversation_id,
            message_id: None,
            answer: AnswerBody {
                format: AnswerFormat::Plain,
                markdown: None,
                plain_text: format!("[local-fallback] {}", question),
                finish_reason: None,
                truncated: false,
            },
            citations: Vec::new(),
            model: ModelInfo {
                name: LOCAL_FALLBACK_MODEL.to_string(),
                latency_ms: 0,
            },
            technical_code: TechnicalCode::LocalFallback,
            correlation_id,
        }
    }
}

/// Generate a correlation id: `corr-<base36 epoch millis>-<6 random base36 chars>`.
pub fn generate_correlation_id() -> String {
    let millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| base36_digit(rng.gen_range(0..36)))
        .collect();
    format!("corr-{}-{}", to_base36(millis), suffix)
}

fn base36_digit(n: u32) -> char {
    char::from_digit(n, 36).unwrap_or('0')
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(base36_digit(u32::try_from(n % 36).unwrap_or_default()));
        n /= 36;
    }
    digits.iter().rev().collect()
}

/// Answers questions against the orchestration service.
#[derive(Clone)]
pub struct ChatService {
    settings: OrchestrationSettings,
    force_local_fallback: bool,
    transport: Arc<dyn OrchestrationTransport>,
}

impl ChatService {
    pub fn new(
        settings: OrchestrationSettings,
        force_local_fallback: bool,
        transport: Arc<dyn OrchestrationTransport>,
    ) -> Self {
        Self {
            settings,
            force_local_fallback,
            transport,
        }
    }

    /// Build a service with the HTTP transport described by `config`.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(&config.transport, config.orchestration.endpoint())?;
        Ok(Self::new(
            config.orchestration.clone(),
            config.chat.force_local_fallback,
            Arc::new(transport),
        ))
    }

    pub fn settings(&self) -> &OrchestrationSettings {
        &self.settings
    }

    /// Answer one question.
    pub async fn ask(&self, ask: AskQuestion) -> Result<ChatAnswer, ChatError> {
        let question = ask.question.trim();
        if question.is_empty() {
            return Err(ChatError::InvalidQuestion {
                reason: "question is required".to_string(),
            });
        }

        let correlation_id = ask
            .correlation_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_correlation_id);
        let conversation_id = ask.conversation_id.filter(|id| !id.is_empty());

        if self.force_local_fallback {
            info!(correlation_id = %correlation_id, "Answering with local fallback");
            return Ok(ChatAnswer::local_fallback(
                question,
                conversation_id,
                correlation_id,
            ));
        }

        let request = payload::build(
            question,
            ask.repository_id.as_deref(),
            &ask.history,
            &self.settings,
        );

        let started = Instant::now();
        let raw = self.transport.send(&request, &correlation_id).await?;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let normalized = reply::normalize(&raw);
        if let Some(message) = &normalized.ai_core_error {
            warn!(correlation_id = %correlation_id, error = %message, "Upstream reported an error");
            return Err(ChatError::Upstream {
                message: message.clone(),
            });
        }

        info!(
            correlation_id = %correlation_id,
            latency_ms,
            parsed = normalized.parsed,
            citations = normalized.citations.len(),
            "Answered question"
        );

        Ok(ChatAnswer::from_reply(
            normalized,
            self.settings.model_name(),
            latency_ms,
            conversation_id,
            correlation_id,
        ))
    }
}
