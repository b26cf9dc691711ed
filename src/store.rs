//! Vector store: incremental indexing and brute-force cosine retrieval.
//!
//! Owns the `files` and `chunks` tables. Indexing is content-hash
//! incremental: unchanged files are skipped unless forced. Retrieval is a
//! deliberate O(n) full scan — every stored chunk vector is scored against
//! the query. No ANN structure is built; that bounds the corpus size this
//! design scales to, in exchange for zero index maintenance.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::chunk::split_chunks;
use crate::embedding::{self, EmbeddingProvider};
use crate::hash::content_digest;

pub struct VectorStore {
    pool: SqlitePool,
    provider: Box<dyn EmbeddingProvider>,
}

impl VectorStore {
    pub fn new(pool: SqlitePool, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self { pool, provider }
    }

    /// Index one file: hash check → chunk → embed → store.
    ///
    /// Returns `Ok(false)` when the file is unchanged (and `force` is off)
    /// or could not be read; `Ok(true)` once the new file row is committed,
    /// even if it produced zero chunks. The replace is a single
    /// transaction opened only after all embedding calls have finished, so
    /// a failure leaves the previous indexed state for the path intact.
    pub async fn index_file(&self, path: &Path, force: bool) -> Result<bool> {
        let content = match std::fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                return Ok(false);
            }
        };

        let path_str = path.to_string_lossy().into_owned();
        let digest = content_digest(&content);

        if !force {
            let stored: Option<String> =
                sqlx::query_scalar("SELECT content_hash FROM files WHERE path = ?")
                    .bind(&path_str)
                    .fetch_optional(&self.pool)
                    .await?;
            if stored.as_deref() == Some(digest.as_str()) {
                return Ok(false);
            }
        }

        let chunks = split_chunks(&content);

        // Embed everything before the write transaction opens; a blocking
        // external call must never sit inside an open transaction.
        let vectors = self.provider.embed_batch(&chunks).await;

        let mut expected_dims = self.provider.dims();
        let mut rows: Vec<(&String, Vec<u8>)> = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let Some(vector) = vector else {
                eprintln!(
                    "Warning: skipping unembeddable chunk in {}",
                    path.display()
                );
                continue;
            };
            // Guard against mixed dimensionality after a provider change
            match expected_dims {
                Some(dims) if vector.len() != dims => {
                    eprintln!(
                        "Warning: skipping chunk with {}-dim embedding (expected {}) in {}",
                        vector.len(),
                        dims,
                        path.display()
                    );
                    continue;
                }
                None => expected_dims = Some(vector.len()),
                _ => {}
            }
            rows.push((chunk, embedding::vec_to_blob(&vector)));
        }

        // Every chunk failing is a whole-file failure: report it and keep
        // the previously indexed state for this path untouched.
        if !chunks.is_empty() && rows.is_empty() {
            eprintln!(
                "Error indexing {}: no chunks could be embedded",
                path.display()
            );
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        // Delete-then-insert replace; the cascade clears old chunk rows
        sqlx::query("DELETE FROM files WHERE path = ?")
            .bind(&path_str)
            .execute(&mut *tx)
            .await?;

        let file_id = sqlx::query("INSERT INTO files (path, content_hash) VALUES (?, ?)")
            .bind(&path_str)
            .bind(&digest)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for (text, blob) in &rows {
            sqlx::query("INSERT INTO chunks (file_id, chunk_text, embedding) VALUES (?, ?, ?)")
                .bind(file_id)
                .bind(text.as_str())
                .bind(blob.as_slice())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Return the texts of the `top_k` chunks most similar to `question`,
    /// best first. Ties keep storage order (stable sort). An unembeddable
    /// or zero-magnitude question yields an empty result, as do stored
    /// vectors that are degenerate or of a foreign dimensionality.
    pub async fn find_relevant_chunks(&self, question: &str, top_k: usize) -> Result<Vec<String>> {
        let Some(query_vec) = self.provider.embed(question).await else {
            return Ok(Vec::new());
        };
        let Some(query_vec) = embedding::normalize(query_vec) else {
            return Ok(Vec::new());
        };

        let all_rows = sqlx::query("SELECT chunk_text, embedding FROM chunks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(f32, String)> = Vec::with_capacity(all_rows.len());
        let mut dim_mismatches = 0usize;

        for row in all_rows {
            let text: String = row.get("chunk_text");
            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);

            if vector.len() != query_vec.len() {
                dim_mismatches += 1;
                continue;
            }
            let Some(vector) = embedding::normalize(vector) else {
                continue;
            };
            scored.push((embedding::dot(&vector, &query_vec), text));
        }

        if dim_mismatches > 0 {
            eprintln!(
                "Warning: skipped {} stored chunks with stale dimensionality; \
                 run !reindex after switching embedding models",
                dim_mismatches
            );
        }

        // Stable sort so equal scores keep storage order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, text)| text).collect())
    }

    /// Delete all indexed files and chunks and reclaim disk space.
    /// All-or-nothing: a failure rolls the delete back and returns false.
    pub async fn purge(&self) -> bool {
        let result: Result<()> = async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
            sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
            tx.commit().await?;
            sqlx::query("VACUUM").execute(&self.pool).await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Error purging embedding tables: {}", e);
                false
            }
        }
    }

    pub async fn indexed_file_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
