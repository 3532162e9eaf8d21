use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the chunk schema. Safe to run repeatedly.
///
/// The primary key is the deterministic chunk id, so a lost dedup race on
/// concurrent ingestion of the same document inserts no duplicate rows.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            client_id TEXT NOT NULL,
            document_name TEXT NOT NULL,
            page INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_client_id ON chunks(client_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_client_document ON chunks(client_id, document_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
