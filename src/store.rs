//! Client-partitioned chunk store backed by SQLite.
//!
//! Owns chunk identity, storage, and duplicate-ingestion detection. Every
//! read and write is scoped to a `client_id`; a query for one client can
//! never see another client's chunks because the partition filter is part
//! of the SQL predicate, not a post-filter.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{self, EmbeddingProvider};
use crate::models::{chunk_id, PageText, RetrievedChunk};

pub struct ChunkStore {
    pool: SqlitePool,
    embedder: Box<dyn EmbeddingProvider>,
}

impl ChunkStore {
    pub fn new(pool: SqlitePool, embedder: Box<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Stores one chunk row per extracted page under deterministic ids.
    ///
    /// Ids follow `{client_id}_{document_name}_{ordinal}`, so re-ingestion
    /// hits the primary key and `ON CONFLICT DO NOTHING` makes the write
    /// idempotent even when two callers race past the existence check.
    /// Returns the number of rows actually inserted; no-op on empty input.
    pub async fn add(
        &self,
        client_id: &str,
        document_name: &str,
        pages: &[PageText],
    ) -> Result<usize> {
        if pages.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pages.iter().map(|p| p.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        // A short batch would silently drop trailing pages and leave a
        // partial document that the existence check then treats as complete.
        if vectors.len() != pages.len() {
            anyhow::bail!(
                "embedding batch returned {} vectors for {} texts",
                vectors.len(),
                pages.len()
            );
        }
        let now = chrono::Utc::now().timestamp();

        // One transaction per add call: each document is independently
        // durable, nothing spans documents.
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for (ordinal, (page, vector)) in pages.iter().zip(vectors.iter()).enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO chunks (id, client_id, document_name, page, text, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(chunk_id(client_id, document_name, ordinal))
            .bind(client_id)
            .bind(document_name)
            .bind(page.page)
            .bind(&page.text)
            .bind(embedding::vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Returns up to `k` chunks for `client_id`, ranked by cosine similarity
    /// between the query text and chunk text, best first.
    ///
    /// An empty or unknown partition yields an empty vec, not an error.
    pub async fn query(
        &self,
        client_id: &str,
        query_text: &str,
        k: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        let query_vec = embedding::embed_query(self.embedder.as_ref(), query_text).await?;

        let rows = sqlx::query(
            "SELECT text, document_name, page, embedding FROM chunks WHERE client_id = ?",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                RetrievedChunk {
                    text: row.get("text"),
                    document_name: row.get("document_name"),
                    page: row.get("page"),
                    score: embedding::cosine_similarity(&query_vec, &vec) as f64,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(k.max(0) as usize);

        Ok(candidates)
    }

    /// Existence check used by the ingestor for idempotence: true when at
    /// least one chunk with this `(client_id, document_name)` key exists.
    pub async fn exists(&self, client_id: &str, document_name: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM chunks WHERE client_id = ? AND document_name = ? LIMIT 1",
        )
        .bind(client_id)
        .bind(document_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Total chunks stored for a client.
    pub async fn chunk_count(&self, client_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE client_id = ?")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
