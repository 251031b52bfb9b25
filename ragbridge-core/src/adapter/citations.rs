//! Citation extraction from the grounding module result.
//!
//! Grounding chunks show up under different list fields depending on the
//! service release, and each chunk spreads its identifiers across its own
//! fields and a `metadata` object with camelCase or snake_case names. The
//! extractor normalizes all of that into `Citation` values and drops chunks
//! that point at a source already cited.

use crate::adapter::fields::Scope::{Metadata, Root};
use crate::adapter::fields::{Aliases, FieldSource, coerce_float, coerce_int, is_truthy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Source type reported when a chunk does not name one.
pub const DEFAULT_SOURCE_TYPE: &str = "object-store-document";

const GROUNDING_POINTER: &str = "/orchestration_result/module_results/grounding";

/// Chunk-list fields under the grounding result, highest priority first.
const CHUNK_LIST_FIELDS: &[&str] = &["grounding_chunks", "result", "chunks"];

const DOCUMENT_ID: Aliases = &[
    (Root, "documentId"),
    (Root, "document_id"),
    (Metadata, "documentId"),
    (Metadata, "document_id"),
];
const CHUNK_ID: Aliases = &[
    (Root, "chunkId"),
    (Root, "chunk_id"),
    (Metadata, "chunkId"),
    (Metadata, "chunk_id"),
];
const PAGE: Aliases = &[
    (Root, "page"),
    (Metadata, "page"),
    (Metadata, "page_number"),
    (Metadata, "pageNumber"),
];
const SCORE: Aliases = &[(Root, "score"), (Metadata, "score")];
const URI: Aliases = &[
    (Root, "url"),
    (Root, "uri"),
    (Metadata, "url"),
    (Metadata, "uri"),
];
const TITLE: Aliases = &[
    (Root, "title"),
    (Metadata, "title"),
    (Metadata, "file_name"),
    (Metadata, "fileName"),
    (Metadata, "name"),
];
const SOURCE_TYPE: Aliases = &[
    (Root, "sourceType"),
    (Root, "source_type"),
    (Metadata, "sourceType"),
    (Metadata, "source_type"),
];

/// A normalized reference to one retrieved source chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Sequential id (`cit-1`, `cit-2`, ...) valid within one reply.
    pub id: String,
    pub title: Option<String>,
    pub source_type: String,
    pub document_id: Option<String>,
    pub chunk_id: Option<String>,
    pub page: Option<i64>,
    pub uri: Option<String>,
    pub score: Option<f64>,
}

/// Locate the chunk list: the first non-empty array among the known fields,
/// or the grounding value itself when it is an array.
fn chunk_list(grounding: &Value) -> Option<&Vec<Value>> {
    CHUNK_LIST_FIELDS
        .iter()
        .filter_map(|field| grounding.get(*field))
        .chain(std::iter::once(grounding))
        .filter_map(Value::as_array)
        .find(|items| !items.is_empty())
}

/// Key identifying the source a chunk points at. The first available of:
/// chunk id, `documentId:page`, document id, uri, then the chunk's position.
fn dedup_key(
    chunk_id: Option<&str>,
    document_id: Option<&str>,
    page: Option<i64>,
    uri: Option<&str>,
    index: usize,
) -> String {
    if let Some(chunk_id) = chunk_id {
        return chunk_id.to_string();
    }
    match (document_id, page) {
        (Some(doc), Some(page)) => format!("{doc}:{page}"),
        (Some(doc), None) => doc.to_string(),
        (None, _) => uri.map_or_else(|| format!("idx_{index}"), str::to_string),
    }
}

/// Extract deduplicated citations from a raw orchestration response.
///
/// Never fails: missing or malformed grounding data yields an empty list,
/// malformed fields become `None`, and non-object chunks are skipped.
pub fn extract(raw: &Value) -> Vec<Citation> {
    let Some(grounding) = raw.pointer(GROUNDING_POINTER).filter(|g| is_truthy(g)) else {
        return Vec::new();
    };
    let Some(items) = chunk_list(grounding) else {
        debug!("Grounding result present but no chunk list found");
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let Some(chunk) = item.as_object() else {
            continue;
        };
        let fields = FieldSource::new(chunk);

        let document_id = fields.text(DOCUMENT_ID);
        let chunk_id = fields.text(CHUNK_ID);
        let page = fields.present(PAGE).and_then(coerce_int);
        let score = fields.present(SCORE).and_then(coerce_float);
        let uri = fields.text(URI);

        let key = dedup_key(
            chunk_id.as_deref(),
            document_id.as_deref(),
            page,
            uri.as_deref(),
            index,
        );
        if !seen.insert(key) {
            continue;
        }

        citations.push(Citation {
            id: format!("cit-{}", citations.len() + 1),
            title: fields.text(TITLE),
            source_type: fields
                .text(SOURCE_TYPE)
                .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string()),
            document_id,
            chunk_id,
            page,
            uri,
            score,
        });
    }

    debug!(
        chunks = items.len(),
        citations = citations.len(),
        "Extracted grounding citations"
    );
    citations
}
