//! Locating generated text and finish reason in orchestration responses.
//!
//! Providers and service releases disagree on where the completion lives. The
//! probes below are tried strictly in order and the first one yielding usable
//! text wins. The order is part of the contract: orchestration-native shapes
//! beat OpenAI-compatible ones, which beat the generic single-field shapes.

use crate::adapter::fields::is_truthy;
use serde_json::Value;
use tracing::debug;

/// A named JSON-pointer probe.
#[derive(Debug, Clone, Copy)]
pub struct ShapeProbe {
    pub label: &'static str,
    pub pointer: &'static str,
}

const fn probe(label: &'static str, pointer: &'static str) -> ShapeProbe {
    ShapeProbe { label, pointer }
}

/// Text locations, highest priority first.
pub const TEXT_PROBES: &[ShapeProbe] = &[
    probe(
        "orchestration_result.choices[0].message.content",
        "/orchestration_result/choices/0/message/content",
    ),
    probe(
        "orchestration_result.module_results.llm.choices[0].message.content",
        "/orchestration_result/module_results/llm/choices/0/message/content",
    ),
    probe("orchestration_result.response", "/orchestration_result/response"),
    probe("choices[0].message.content", "/choices/0/message/content"),
    probe("choices[0].text", "/choices/0/text"),
    probe("output_text", "/output_text"),
    probe("result.output_text", "/result/output_text"),
    probe("completion", "/completion"),
    probe("reply", "/reply"),
    probe("message", "/message"),
];

/// Finish-reason locations. Only the orchestration-shaped paths carry one.
pub const FINISH_REASON_PROBES: &[ShapeProbe] = &[
    probe(
        "orchestration_result.choices[0].finish_reason",
        "/orchestration_result/choices/0/finish_reason",
    ),
    probe(
        "orchestration_result.module_results.llm.choices[0].finish_reason",
        "/orchestration_result/module_results/llm/choices/0/finish_reason",
    ),
    probe("choices[0].finish_reason", "/choices/0/finish_reason"),
];

/// Text that a probe located, with the label of the probe that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedText {
    pub text: String,
    pub shape: &'static str,
}

/// Turn one candidate value into reply text.
///
/// Strings are trimmed. Arrays are content fragments: each contributes itself
/// if it is a string, else its `text` or `content` string field, else nothing;
/// fragments are joined with newlines and the result trimmed. Empty results and
/// every other value kind are rejected.
pub fn text_from_candidate(candidate: &Value) -> Option<String> {
    let text = match candidate {
        Value::String(s) => s.trim().to_string(),
        Value::Array(fragments) => fragments
            .iter()
            .map(fragment_text)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn fragment_text(fragment: &Value) -> &str {
    if let Some(s) = fragment.as_str() {
        return s;
    }
    ["text", "content"]
        .iter()
        .find_map(|key| fragment.get(*key).and_then(Value::as_str))
        .unwrap_or("")
}

/// Find the reply text and the shape it was found in.
pub fn probe_text_with_shape(raw: &Value) -> Option<ProbedText> {
    TEXT_PROBES.iter().find_map(|p| {
        let text = raw.pointer(p.pointer).and_then(text_from_candidate)?;
        debug!(shape = p.label, chars = text.len(), "Matched response shape");
        Some(ProbedText {
            text,
            shape: p.label,
        })
    })
}

/// Find the reply text. `None` means no known shape matched.
pub fn probe_text(raw: &Value) -> Option<String> {
    probe_text_with_shape(raw).map(|probed| probed.text)
}

/// Find the finish reason, e.g. `"stop"` or `"length"`.
///
/// The first truthy value at any probe decides. A scalar is rendered as text;
/// an object or array there yields `None` without trying later probes.
pub fn probe_finish_reason(raw: &Value) -> Option<String> {
    let value = FINISH_REASON_PROBES
        .iter()
        .filter_map(|p| raw.pointer(p.pointer))
        .find(|value| is_truthy(value))?;
    match value {
        Value::String(reason) => Some(reason.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_orchestration_choice_beats_top_level_choices() {
        let raw = json!({
            "orchestration_result": {"choices": [{"message": {"content": "A"}}]},
            "choices": [{"text": "B"}]
        });
        assert_eq!(probe_text(&raw), Some("A".to_string()));
    }

    #[test]
    fn test_module_result_path() {
        let raw = json!({
            "orchestration_result": {
                "module_results": {"llm": {"choices": [{"message": {"content": " nested "}}]}}
            }
        });
        let probed = probe_text_with_shape(&raw).unwrap();
        assert_eq!(probed.text, "nested");
        assert_eq!(
            probed.shape,
            "orchestration_result.module_results.llm.choices[0].message.content"
        );
    }

    #[test]
    fn test_blank_primary_falls_through() {
        let raw = json!({
            "orchestration_result": {
                "choices": [{"message": {"content": "   "}}],
                "response": "from response"
            }
        });
        assert_eq!(probe_text(&raw), Some("from response".to_string()));
    }

    #[test]
    fn test_generic_shapes_in_order() {
        assert_eq!(
            probe_text(&json!({"choices": [{"text": "completion text"}]})),
            Some("completion text".to_string())
        );
        assert_eq!(
            probe_text(&json!({"output_text": "o", "completion": "c"})),
            Some("o".to_string())
        );
        assert_eq!(
            probe_text(&json!({"result": {"output_text": "r"}, "reply": "x"})),
            Some("r".to_string())
        );
        assert_eq!(
            probe_text(&json!({"reply": "x", "message": "m"})),
            Some("x".to_string())
        );
        assert_eq!(probe_text(&json!({"message": "m"})), Some("m".to_string()));
    }

    #[test]
    fn test_content_fragments_joined() {
        let raw = json!({
            "choices": [{"message": {"content": [
                "first",
                {"type": "text", "text": "second"},
                {"content": "third"},
                {"image_url": "ignored"},
                42
            ]}}]
        });
        assert_eq!(
            probe_text(&raw),
            Some("first\nsecond\nthird".to_string())
        );
    }

    #[test]
    fn test_fragment_text_preferred_over_content() {
        let raw = json!({"reply": [{"text": "t", "content": "c"}]});
        assert_eq!(probe_text(&raw), Some("t".to_string()));
    }

    #[test]
    fn test_fragments_all_empty_rejected() {
        let raw = json!({"reply": [{"image": 1}, ""], "message": "fallback"});
        assert_eq!(probe_text(&raw), Some("fallback".to_string()));
    }

    #[test]
    fn test_other_value_kinds_rejected() {
        assert_eq!(text_from_candidate(&json!(12)), None);
        assert_eq!(text_from_candidate(&json!({"text": "obj"})), None);
        assert_eq!(text_from_candidate(&json!(true)), None);
        assert_eq!(probe_text(&json!({"message": {"text": "nope"}})), None);
    }

    #[test]
    fn test_no_shape_matches() {
        assert_eq!(probe_text(&json!({})), None);
        assert_eq!(probe_text(&json!(null)), None);
        assert_eq!(probe_text(&json!("bare string")), None);
    }

    #[test]
    fn test_finish_reason_priority() {
        let raw = json!({
            "orchestration_result": {
                "choices": [{"finish_reason": "length"}],
                "module_results": {"llm": {"choices": [{"finish_reason": "stop"}]}}
            },
            "choices": [{"finish_reason": "content_filter"}]
        });
        assert_eq!(probe_finish_reason(&raw), Some("length".to_string()));
    }

    #[test]
    fn test_finish_reason_falls_back_to_module_then_top_level() {
        let raw = json!({
            "orchestration_result": {
                "choices": [{"finish_reason": ""}],
                "module_results": {"llm": {"choices": [{"finish_reason": "stop"}]}}
            }
        });
        assert_eq!(probe_finish_reason(&raw), Some("stop".to_string()));
        assert_eq!(
            probe_finish_reason(&json!({"choices": [{"finish_reason": "length"}]})),
            Some("length".to_string())
        );
    }

    #[test]
    fn test_finish_reason_first_truthy_value_decides() {
        let raw = json!({
            "orchestration_result": {"choices": [{"finish_reason": 3}]},
            "choices": [{"finish_reason": "length"}]
        });
        assert_eq!(probe_finish_reason(&raw), Some("3".to_string()));

        let raw = json!({
            "orchestration_result": {"choices": [{"finish_reason": {"kind": "stop"}}]},
            "choices": [{"finish_reason": "length"}]
        });
        assert_eq!(probe_finish_reason(&raw), None);

        let raw = json!({
            "orchestration_result": {"choices": [{"finish_reason": 0}]},
            "choices": [{"finish_reason": "length"}]
        });
        assert_eq!(probe_finish_reason(&raw), Some("length".to_string()));
    }

    #[test]
    fn test_finish_reason_ignores_generic_shapes() {
        assert_eq!(probe_finish_reason(&json!({"finish_reason": "stop"})), None);
        assert_eq!(probe_finish_reason(&json!({})), None);
    }
}
