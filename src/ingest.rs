//! Document ingestion.
//!
//! Dispatches each file to the extractor set and writes the resulting page
//! chunks into the store. Failure isolation is per file: an unreadable or
//! corrupt document is logged and skipped, and ingestion of its siblings
//! proceeds unaffected.

use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

use crate::extract;
use crate::genai::ImageDescriber;
use crate::store::ChunkStore;

/// Outcome of a directory sweep.
#[derive(Debug, Default, PartialEq)]
pub struct IngestReport {
    pub files_seen: usize,
    pub documents_ingested: usize,
    pub chunks_added: usize,
    /// Documents already present in the store.
    pub already_ingested: usize,
    /// Files that failed extraction or storage and were skipped.
    pub skipped: usize,
}

/// Ingests a single file for a client, keyed by `(client_id, document_name)`.
///
/// A document already present in the store is a no-op returning 0. The
/// fast-path existence check may race under concurrent ingestion; the
/// store's unique-constraint write keeps the outcome duplicate-free either
/// way. Files that extract to nothing add no chunks.
pub async fn ingest_file(
    store: &ChunkStore,
    describer: &dyn ImageDescriber,
    client_id: &str,
    document_name: &str,
    path: &Path,
) -> Result<usize> {
    if store.exists(client_id, document_name).await? {
        tracing::debug!(client_id, document_name, "document already ingested");
        return Ok(0);
    }

    let pages = extract::extract_file(path, describer).await?;
    if pages.is_empty() {
        return Ok(0);
    }

    let added = store.add(client_id, document_name, &pages).await?;
    tracing::info!(client_id, document_name, chunks = added, "ingested document");
    Ok(added)
}

/// Sweeps every regular file directly under `dir` through [`ingest_file`],
/// skipping already-ingested documents. Per-file failures are logged and
/// counted, never propagated.
pub async fn ingest_dir(
    store: &ChunkStore,
    describer: &dyn ImageDescriber,
    client_id: &str,
    dir: &Path,
) -> IngestReport {
    let mut report = IngestReport::default();

    if !dir.is_dir() {
        return report;
    }

    // Deterministic file order.
    let mut entries: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    for entry in entries {
        let document_name = entry.file_name().to_string_lossy().to_string();
        report.files_seen += 1;

        match store.exists(client_id, &document_name).await {
            Ok(true) => {
                report.already_ingested += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(client_id, %document_name, error = %e, "existence check failed; skipping file");
                report.skipped += 1;
                continue;
            }
        }

        match ingest_file(store, describer, client_id, &document_name, entry.path()).await {
            Ok(added) if added > 0 => {
                report.documents_ingested += 1;
                report.chunks_added += added;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(client_id, %document_name, error = %e, "failed to ingest file; skipping");
                report.skipped += 1;
            }
        }
    }

    report
}
