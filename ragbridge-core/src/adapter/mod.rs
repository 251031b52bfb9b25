//! Orchestration adapter.
//!
//! Pure translation between the chat domain and the orchestration service:
//! - `history` trims the conversation to a window of complete exchanges.
//! - `payload` builds the request body.
//! - `probe` locates generated text and the finish reason in a response.
//! - `citations` normalizes grounding chunks into deduplicated citations.
//! - `reply` combines the above into one `NormalizedReply`.
//!
//! Nothing in here performs I/O or returns an error.

pub mod citations;
pub mod fields;
pub mod history;
pub mod payload;
pub mod probe;
pub mod reply;

pub use citations::{Citation, extract as extract_citations};
pub use history::window as window_history;
pub use payload::{OrchestrationRequest, build as build_payload};
pub use probe::{probe_finish_reason, probe_text};
pub use reply::{AnswerFormat, NormalizedReply, detect_format, normalize, normalize_body};
