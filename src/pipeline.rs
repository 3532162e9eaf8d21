//! End-to-end prep flow: sweep-ingest a client's directory, retrieve
//! context, synthesize the brief.
//!
//! Ingestion is best-effort and invisible to the caller; retrieval and
//! generation failures are explicit and distinguishable ([`PrepError`]
//! travels inside the `anyhow` error and can be recovered with
//! `downcast_ref`).

use anyhow::Result;
use std::path::Path;

use crate::brief::{self, PrepError};
use crate::genai::{Generator, ImageDescriber};
use crate::models::PrepBrief;
use crate::retrieve;
use crate::store::ChunkStore;

/// Runs the full prep flow for one client.
///
/// `client_dir` is the client's document directory (swept for any files not
/// yet ingested). Zero retrieved chunks yields [`PrepError::NoContext`]
/// without invoking generation.
pub async fn generate_prep(
    store: &ChunkStore,
    generator: &dyn Generator,
    describer: &dyn ImageDescriber,
    client_id: &str,
    client_dir: &Path,
    top_k: i64,
    temperature: f64,
) -> Result<PrepBrief> {
    let report = crate::ingest::ingest_dir(store, describer, client_id, client_dir).await;
    if report.skipped > 0 {
        tracing::warn!(
            client_id,
            skipped = report.skipped,
            "some files were skipped during ingestion"
        );
    }

    let chunks = retrieve::retrieve_context(store, client_id, top_k).await?;
    tracing::debug!(client_id, retrieved = chunks.len(), "retrieved context");

    if chunks.is_empty() {
        return Err(PrepError::NoContext.into());
    }

    let brief = brief::synthesize(generator, client_id, &chunks, temperature).await?;
    Ok(brief)
}
