//! Vector store integration tests against a temp SQLite database and a
//! canned-vector embedding provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use rag_console::db;
use rag_console::embedding::EmbeddingProvider;
use rag_console::migrate;
use rag_console::store::VectorStore;

/// Provider that returns pre-seeded vectors by exact text lookup.
/// Unknown texts fail to embed, like a chunk the real backend rejected.
struct FixtureProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixtureProvider {
    fn new(pairs: &[(&str, &[f32])]) -> Self {
        Self {
            vectors: pairs
                .iter()
                .map(|(text, vec)| (text.to_string(), vec.to_vec()))
                .collect(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureProvider {
    fn model_name(&self) -> &str {
        "fixture"
    }

    fn dims(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.vectors.get(text).cloned()
    }
}

async fn setup(provider: FixtureProvider) -> (TempDir, VectorStore, sqlx::SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("rag.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    let store = VectorStore::new(pool.clone(), Box::new(provider));
    (tmp, store, pool)
}

fn write_file(tmp: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = tmp.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

async fn chunk_texts(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT chunk_text FROM chunks ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_index_skips_unchanged_file() {
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0])]);
    let (tmp, store, pool) = setup(provider).await;
    let path = write_file(&tmp, "a.txt", "alpha");

    assert!(store.index_file(&path, false).await.unwrap());
    assert_eq!(chunk_texts(&pool).await, vec!["alpha"]);

    // Second pass with unchanged content does no work
    assert!(!store.index_file(&path, false).await.unwrap());
    assert_eq!(chunk_texts(&pool).await, vec!["alpha"]);
    assert_eq!(store.indexed_file_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_forced_reindex_replaces_chunks() {
    let provider = FixtureProvider::new(&[
        ("old one", &[1.0, 0.0]),
        ("old two", &[0.0, 1.0]),
        ("fresh", &[1.0, 1.0]),
    ]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "old one\n\nold two");
    assert!(store.index_file(&path, false).await.unwrap());
    assert_eq!(chunk_texts(&pool).await.len(), 2);

    fs::write(&path, "fresh").unwrap();
    assert!(store.index_file(&path, true).await.unwrap());

    // Exactly the chunk set of the latest content, nothing residual
    assert_eq!(chunk_texts(&pool).await, vec!["fresh"]);
    assert_eq!(store.indexed_file_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_replace_cascades_no_dangling_chunks() {
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0]), ("beta", &[0.0, 1.0])]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha");
    store.index_file(&path, false).await.unwrap();
    fs::write(&path, "beta").unwrap();
    store.index_file(&path, true).await.unwrap();

    // Every chunk row must reference a live file row
    let dangling: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chunks WHERE file_id NOT IN (SELECT id FROM files)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(dangling, 0);
    assert_eq!(chunk_texts(&pool).await, vec!["beta"]);
}

#[tokio::test]
async fn test_retrieval_ranked_by_cosine_similarity() {
    let provider = FixtureProvider::new(&[
        ("same direction", &[1.0, 0.0]),
        ("orthogonal", &[0.0, 1.0]),
        ("opposite", &[-1.0, 0.0]),
        ("the question", &[1.0, 0.0]),
    ]);
    let (tmp, store, _pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "same direction\n\northogonal\n\nopposite");
    store.index_file(&path, false).await.unwrap();

    let top = store.find_relevant_chunks("the question", 2).await.unwrap();
    assert_eq!(top, vec!["same direction", "orthogonal"]);

    // top_k larger than the corpus returns everything, still ordered
    let all = store.find_relevant_chunks("the question", 10).await.unwrap();
    assert_eq!(all, vec!["same direction", "orthogonal", "opposite"]);
}

#[tokio::test]
async fn test_zero_vectors_never_scored() {
    let provider = FixtureProvider::new(&[
        ("degenerate", &[0.0, 0.0]),
        ("healthy", &[1.0, 0.0]),
        ("the question", &[1.0, 0.0]),
        ("null question", &[0.0, 0.0]),
    ]);
    let (tmp, store, _pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "degenerate\n\nhealthy");
    store.index_file(&path, false).await.unwrap();

    // A zero-magnitude stored chunk is never returned
    let top = store.find_relevant_chunks("the question", 10).await.unwrap();
    assert_eq!(top, vec!["healthy"]);

    // A zero-magnitude query yields nothing regardless of stored data
    let none = store.find_relevant_chunks("null question", 10).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unembeddable_question_yields_empty() {
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0])]);
    let (tmp, store, _pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha");
    store.index_file(&path, false).await.unwrap();

    let results = store.find_relevant_chunks("unknown", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_failed_chunk_embedding_is_skipped() {
    // "mystery" has no fixture vector, so its embedding fails
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0])]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha\n\nmystery");
    assert!(store.index_file(&path, false).await.unwrap());
    assert_eq!(chunk_texts(&pool).await, vec!["alpha"]);
}

#[tokio::test]
async fn test_mixed_dimensionality_guarded() {
    let provider = FixtureProvider::new(&[
        ("planar", &[1.0, 0.0]),
        ("spatial", &[1.0, 0.0, 0.0]),
    ]);
    let (tmp, store, pool) = setup(provider).await;

    // The first successful vector fixes the expected width for the file
    let path = write_file(&tmp, "a.txt", "planar\n\nspatial");
    assert!(store.index_file(&path, false).await.unwrap());
    assert_eq!(chunk_texts(&pool).await, vec!["planar"]);
}

#[tokio::test]
async fn test_empty_file_indexes_with_zero_chunks() {
    let provider = FixtureProvider::new(&[]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "empty.txt", "");
    assert!(store.index_file(&path, false).await.unwrap());
    assert_eq!(store.indexed_file_count().await.unwrap(), 1);
    assert!(chunk_texts(&pool).await.is_empty());
}

#[tokio::test]
async fn test_purge_clears_everything() {
    let provider = FixtureProvider::new(&[
        ("alpha", &[1.0, 0.0]),
        ("the question", &[1.0, 0.0]),
    ]);
    let (tmp, store, _pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha");
    store.index_file(&path, false).await.unwrap();
    assert_eq!(store.indexed_file_count().await.unwrap(), 1);

    assert!(store.purge().await);
    assert_eq!(store.indexed_file_count().await.unwrap(), 0);
    let results = store.find_relevant_chunks("the question", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_whole_file_embedding_failure_keeps_previous_state() {
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0])]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha");
    store.index_file(&path, false).await.unwrap();

    // New content the provider cannot embed at all: the replace must not
    // happen, and the old chunks stay queryable
    fs::write(&path, "completely unknown").unwrap();
    assert!(!store.index_file(&path, true).await.unwrap());
    assert_eq!(chunk_texts(&pool).await, vec!["alpha"]);
}

#[tokio::test]
async fn test_unreadable_file_reports_false_and_keeps_state() {
    let provider = FixtureProvider::new(&[("alpha", &[1.0, 0.0])]);
    let (tmp, store, pool) = setup(provider).await;

    let path = write_file(&tmp, "a.txt", "alpha");
    store.index_file(&path, false).await.unwrap();

    // A vanished file fails the read; the indexed state stays intact
    let missing = tmp.path().join("gone.txt");
    assert!(!store.index_file(&missing, true).await.unwrap());
    assert_eq!(store.indexed_file_count().await.unwrap(), 1);
    assert_eq!(chunk_texts(&pool).await, vec!["alpha"]);
}
