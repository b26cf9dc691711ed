use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema if it does not exist. Safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Indexed source files, one row per path
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            content_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunks with their embedding blobs; deleting a file row removes them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY,
            file_id INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            FOREIGN KEY (file_id) REFERENCES files(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Conversation turns, grouped by free-form context name
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_history (
            id INTEGER PRIMARY KEY,
            context_name TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_history_context ON chat_history(context_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
