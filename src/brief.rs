//! Brief synthesis.
//!
//! Assembles retrieved chunks into a grounding context, invokes a
//! schema-constrained generative call, and validates the payload into a
//! [`PrepBrief`]. The declared response schema is a request to the model;
//! conformance is enforced here, in process, before the payload is trusted.
//! A non-conforming payload is surfaced as a [`PrepError::Generation`] —
//! never repaired, never replaced with an empty brief.

use crate::genai::Generator;
use crate::models::{PrepBrief, RetrievedChunk};

/// Failure modes of the prep flow that callers must distinguish:
/// no material for the client vs. a failed or non-conforming generation.
#[derive(Debug)]
pub enum PrepError {
    /// Retrieval found zero chunks for the client.
    NoContext,
    /// The generative call failed or returned a payload that does not
    /// conform to the brief schema. Carries the underlying message.
    Generation(String),
}

impl std::fmt::Display for PrepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrepError::NoContext => write!(f, "no document context found for this client"),
            PrepError::Generation(msg) => write!(f, "brief generation failed: {}", msg),
        }
    }
}

impl std::error::Error for PrepError {}

/// JSON schema for the structured brief, in the OpenAPI subset the
/// generateContent API accepts as `responseSchema`.
pub fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "client_name": { "type": "string" },
            "meeting_type": { "type": "string" },
            "agenda": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "topic": { "type": "string" },
                        "insight": { "type": "string" },
                        "action_required": { "type": "string" },
                        "sources": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "document_name": { "type": "string" },
                                    "page": { "type": "integer" },
                                    "extracted_quote": { "type": "string" }
                                },
                                "required": ["document_name", "page", "extracted_quote"]
                            }
                        }
                    },
                    "required": ["id", "topic", "insight", "action_required", "sources"]
                }
            }
        },
        "required": ["client_name", "meeting_type", "agenda"]
    })
}

/// Concatenates chunks into the grounding context, each annotated with its
/// document name and page so quotes stay traceable.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    let mut out = String::new();
    for c in chunks {
        out.push_str(&format!(
            "\n--- Source: {} (Page {}) ---\n{}\n",
            c.document_name, c.page, c.text
        ));
    }
    out
}

fn build_prompt(client_id: &str, context: &str) -> String {
    format!(
        "You are an assistant for a financial advisor preparing for a client meeting.\n\
         Review the following retrieved documents for client '{}'.\n\
         Create a preparatory brief with a list of agenda items.\n\
         Focus on extracting key insights, identifying necessary actions \
         (e.g. 'human_approval_needed'), and tracing exactly where the information came from.\n\
         Include exact quotes in the sources detail, with the source document name and page. \
         Quote only from the retrieved context below. Keep agenda item IDs unique.\n\n\
         Retrieved Context:\n{}",
        client_id, context
    )
}

/// In-process schema-conformance check run after parsing.
fn validate(brief: &PrepBrief) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for item in &brief.agenda {
        if item.id.trim().is_empty() {
            return Err("agenda item with empty id".to_string());
        }
        if !seen.insert(item.id.as_str()) {
            return Err(format!("duplicate agenda item id: {}", item.id));
        }
    }
    Ok(())
}

/// Synthesizes a structured brief from retrieved context.
///
/// Empty context short-circuits to [`PrepError::NoContext`] without a
/// generative call. Any call failure, parse failure, or validation failure
/// surfaces as [`PrepError::Generation`] with the underlying message.
pub async fn synthesize(
    generator: &dyn Generator,
    client_id: &str,
    chunks: &[RetrievedChunk],
    temperature: f64,
) -> Result<PrepBrief, PrepError> {
    if chunks.is_empty() {
        return Err(PrepError::NoContext);
    }

    let context = build_context(chunks);
    let prompt = build_prompt(client_id, &context);
    let schema = response_schema();

    tracing::debug!(client_id, chunks = chunks.len(), "generating prep brief");

    let payload = generator
        .generate(&prompt, &schema, temperature)
        .await
        .map_err(|e| PrepError::Generation(e.to_string()))?;

    let brief: PrepBrief =
        serde_json::from_str(&payload).map_err(|e| PrepError::Generation(e.to_string()))?;

    validate(&brief).map_err(PrepError::Generation)?;
    Ok(brief)
}
