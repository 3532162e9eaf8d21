//! Core data models used throughout the prep pipeline.
//!
//! These types represent extracted page text, stored chunks, retrieved
//! context, and the structured brief returned by the synthesizer.

use serde::{Deserialize, Serialize};

/// One page of text produced by an extractor, before storage.
/// Pages are 1-indexed; extractors never emit empty text.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub text: String,
    pub page: i64,
}

/// A context chunk returned from the store, ranked by cosine similarity.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub text: String,
    pub document_name: String,
    pub page: i64,
    pub score: f64,
}

/// A verifiable pointer from an insight back to original document text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceDetail {
    pub document_name: String,
    pub page: i64,
    pub extracted_quote: String,
}

/// A single agenda entry in a prep brief. `id` is unique within the brief.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AgendaItem {
    pub id: String,
    pub topic: String,
    pub insight: String,
    pub action_required: String,
    pub sources: Vec<SourceDetail>,
}

/// The structured meeting prep brief produced by the synthesizer.
///
/// Created fresh on every generation request; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PrepBrief {
    pub client_name: String,
    pub meeting_type: String,
    pub agenda: Vec<AgendaItem>,
}

/// Builds the deterministic chunk id for `(client_id, document_name, ordinal)`.
/// Re-ingesting the same document reproduces the same ids, so duplicate rows
/// can never be created.
pub fn chunk_id(client_id: &str, document_name: &str, ordinal: usize) -> String {
    format!("{}_{}_{}", client_id, document_name, ordinal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable() {
        assert_eq!(chunk_id("acme", "stmt.pdf", 0), "acme_stmt.pdf_0");
        assert_eq!(chunk_id("acme", "stmt.pdf", 2), "acme_stmt.pdf_2");
    }

    #[test]
    fn brief_rejects_unknown_fields() {
        let raw = r#"{"client_name":"a","meeting_type":"review","agenda":[],"extra":1}"#;
        assert!(serde_json::from_str::<PrepBrief>(raw).is_err());
    }
}
