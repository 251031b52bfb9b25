//! Canonical reply built from a raw orchestration response.

use crate::adapter::citations::{self, Citation};
use crate::adapter::fields::is_truthy;
use crate::adapter::probe;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const NO_RESPONSE_MESSAGE: &str = "No response received from AI Core.";
pub const UNPARSED_MESSAGE: &str = "Could not extract text from AI Core response.";
pub const GENERIC_ERROR_MESSAGE: &str = "AI Core returned an error response.";

/// Finish reason signalling the output hit the token limit.
pub const LENGTH_FINISH_REASON: &str = "length";

// Headings, emphasis, links, unordered/ordered lists, blockquotes, code fences.
static MARKDOWN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^#{1,6}\s|[*_]{1,2}\S|\[.+\]\(https?://|^[-*+]\s|^[0-9]+\.\s|^>\s|```)").ok()
});

/// How the reply text should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerFormat {
    Markdown,
    #[default]
    Plain,
}

impl std::fmt::Display for AnswerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerFormat::Markdown => write!(f, "markdown"),
            AnswerFormat::Plain => write!(f, "plain"),
        }
    }
}

/// The adapter's single result type. Every failure state is encoded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReply {
    /// Model output, or a fixed fallback message when `parsed` is false. Never empty.
    pub reply: String,
    pub parsed: bool,
    pub format: AnswerFormat,
    pub finish_reason: Option<String>,
    pub truncated: bool,
    /// Error message the upstream reported inside a response body.
    pub ai_core_error: Option<String>,
    pub citations: Vec<Citation>,
}

impl NormalizedReply {
    fn fallback(message: &str) -> Self {
        Self {
            reply: message.to_string(),
            parsed: false,
            format: AnswerFormat::Plain,
            finish_reason: None,
            truncated: false,
            ai_core_error: None,
            citations: Vec::new(),
        }
    }
}

/// Classify text as markdown when any line carries markdown syntax.
pub fn detect_format(text: &str) -> AnswerFormat {
    let is_markdown = MARKDOWN_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(text));
    if is_markdown {
        AnswerFormat::Markdown
    } else {
        AnswerFormat::Plain
    }
}

/// Error message reported in the body, when the body is an error and nothing else.
///
/// A body counts as an error when it has a truthy `error` field and neither an
/// `orchestration_result` nor a `choices` field. The message is `error.message`
/// (or `error` itself when that is absent) if it is non-empty text, else a
/// generic message.
fn upstream_error(raw: &Value) -> Option<String> {
    let error = raw.get("error").filter(|e| is_truthy(e))?;
    let has_result = raw
        .get("orchestration_result")
        .is_some_and(is_truthy)
        || raw.get("choices").is_some_and(is_truthy);
    if has_result {
        return None;
    }
    let message = error
        .get("message")
        .filter(|m| !m.is_null())
        .unwrap_or(error);
    Some(
        message
            .as_str()
            .filter(|m| !m.is_empty())
            .map_or_else(|| GENERIC_ERROR_MESSAGE.to_string(), str::to_string),
    )
}

/// Normalize a raw orchestration response. Never fails.
pub fn normalize(raw: &Value) -> NormalizedReply {
    if !is_truthy(raw) {
        return NormalizedReply::fallback(NO_RESPONSE_MESSAGE);
    }

    if let Some(message) = upstream_error(raw) {
        warn!(error = %message, "Orchestration response carries an error body");
        return NormalizedReply {
            ai_core_error: Some(message.clone()),
            ..NormalizedReply::fallback(&message)
        };
    }

    let finish_reason = probe::probe_finish_reason(raw);
    let citations = citations::extract(raw);

    match probe::probe_text(raw) {
        Some(text) => {
            let truncated = finish_reason.as_deref() == Some(LENGTH_FINISH_REASON);
            if truncated {
                debug!("Reply truncated at the output token limit");
            }
            NormalizedReply {
                format: detect_format(&text),
                reply: text,
                parsed: true,
                finish_reason,
                truncated,
                ai_core_error: None,
                citations,
            }
        }
        None => {
            debug!(
                citations = citations.len(),
                "No known response shape matched"
            );
            NormalizedReply {
                finish_reason,
                citations,
                ..NormalizedReply::fallback(UNPARSED_MESSAGE)
            }
        }
    }
}

/// Normalize a raw response body as received over the wire.
///
/// A blank body is treated as no response. A body that is not JSON is kept as
/// a string value, which no shape matches.
pub fn normalize_body(body: &str) -> NormalizedReply {
    if body.trim().is_empty() {
        return normalize(&Value::Null);
    }
    let raw = serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(error = %e, "Orchestration body is not JSON");
        Value::String(body.to_string())
    });
    normalize(&raw)
}
