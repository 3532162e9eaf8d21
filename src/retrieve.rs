//! Context retrieval.
//!
//! One fixed, broad topical query stands in for multi-query or
//! query-decomposition retrieval. The store's ranked order is returned
//! unchanged.

use anyhow::Result;

use crate::models::RetrievedChunk;
use crate::store::ChunkStore;

/// Canonical topic query covering the themes a prep brief draws on.
pub const CANONICAL_QUERY: &str =
    "financial reports, tax returns, meeting notes, action items, investments, \
     portfolio discussion";

/// Retrieves up to `top_k` ranked context chunks for a client. An empty
/// partition yields an empty vec; the caller decides what "no material"
/// means.
pub async fn retrieve_context(
    store: &ChunkStore,
    client_id: &str,
    top_k: i64,
) -> Result<Vec<RetrievedChunk>> {
    store.query(client_id, CANONICAL_QUERY, top_k).await
}
