//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and two concrete backends:
//! - **[`RemoteProvider`]** — calls an OpenAI-compatible `/embeddings`
//!   endpoint, one request per input unit.
//! - **`LocalProvider`** — runs a fastembed model in-process (behind the
//!   `local-embeddings` feature); supports true batching.
//!
//! A failed embedding is a `None`, never an error that escapes to the
//! caller: indexing skips the chunk, retrieval degrades to no context.
//!
//! Also provides the vector utilities shared with the store:
//! - [`vec_to_blob`] / [`blob_to_vec`] — little-endian f32 BLOB codec
//! - [`normalize`] — L2 normalization, `None` for zero-magnitude vectors
//! - [`dot`] — dot product (cosine similarity once both sides are normalized)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Polymorphic interface over embedding backends.
///
/// Selected once at startup via [`create_provider`]; there is no runtime
/// fallback between variants.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier sent to or loaded by the backend.
    fn model_name(&self) -> &str;

    /// Vector dimensionality, when the backend knows it up front.
    /// Remote endpoints report nothing until the first response.
    fn dims(&self) -> Option<usize>;

    /// Embed a single text. `None` on transport failure or malformed
    /// response; the caller decides whether to skip or abort.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Embed a batch, one result slot per input, in input order.
    /// Default degrades to one call per text (the remote case).
    async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await);
        }
        out
    }
}

/// Instantiate the provider named by the configuration.
///
/// Initialization failure (missing endpoint, missing model, local backend
/// compiled out) is fatal: the error carries remediation text and `main`
/// exits. It is never retried.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.mode.as_str() {
        "remote" => Ok(Box::new(RemoteProvider::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Box::new(local::LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!(
            "The 'local' embedding mode is not compiled in.\n\
             Rebuild with:\n\n    cargo build --features local-embeddings\n"
        ),
        other => bail!("Invalid embedding mode: '{}'. Choose 'local' or 'remote'.", other),
    }
}

// ============ Remote Provider ============

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
///
/// Each input unit is one `POST {endpoint}/embeddings` request; batches
/// degrade to sequential requests. A short connect timeout bounds dead
/// servers, a much longer request timeout covers slow inference.
pub struct RemoteProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl RemoteProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.endpoint required for 'remote' mode"))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", endpoint.trim_end_matches('/')),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "local-model".to_string()),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let body = serde_json::json!({
            "input": text,
            "model": self.model,
        });

        let response = match self.client.post(&self.url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Warning: embedding request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            eprintln!("Warning: embedding endpoint returned {}", response.status());
            return None;
        }

        let json: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: embedding response was not valid JSON: {}", e);
                return None;
            }
        };

        match parse_embedding_response(&json) {
            Some(vec) => Some(vec),
            None => {
                eprintln!("Warning: unexpected embedding response shape: {}", json);
                None
            }
        }
    }
}

/// Extract `data[0].embedding` from an OpenAI-compatible response.
/// Any non-numeric element makes the whole payload malformed: better no
/// embedding than a silently corrupted vector.
fn parse_embedding_response(json: &serde_json::Value) -> Option<Vec<f32>> {
    let values = json.get("data")?.as_array()?.first()?.get("embedding")?.as_array()?;
    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings")]
mod local {
    use super::EmbeddingProvider;
    use crate::config::EmbeddingConfig;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// In-process embedding via fastembed. The model is loaded once at
    /// construction; inference runs on the blocking thread pool.
    pub struct LocalProvider {
        model: Arc<Mutex<fastembed::TextEmbedding>>,
        name: String,
        dims: usize,
        batch_size: usize,
    }

    impl LocalProvider {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let name = config
                .model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required for 'local' mode"))?;

            let fastembed_model = model_from_name(&name)?;
            let dims = fastembed::TextEmbedding::get_model_info(&fastembed_model)?.dim;

            println!("Mode: 'local'. Loading embedding model '{}'...", name);
            let model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;
            println!("Model loaded.");

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                name,
                dims,
                batch_size: config.batch_size,
            })
        }

        async fn run_batch(&self, texts: Vec<String>) -> Option<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let batch_size = self.batch_size;

            let result = tokio::task::spawn_blocking(move || {
                let mut guard = model.lock().expect("embedding model lock poisoned");
                guard.embed(texts, Some(batch_size))
            })
            .await;

            match result {
                Ok(Ok(vectors)) => Some(vectors),
                Ok(Err(e)) => {
                    eprintln!("Warning: local embedding failed: {}", e);
                    None
                }
                Err(e) => {
                    eprintln!("Warning: embedding task panicked: {}", e);
                    None
                }
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LocalProvider {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dims(&self) -> Option<usize> {
            Some(self.dims)
        }

        async fn embed(&self, text: &str) -> Option<Vec<f32>> {
            self.run_batch(vec![text.to_string()])
                .await
                .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) })
        }

        async fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
            match self.run_batch(texts.to_vec()).await {
                Some(vectors) if vectors.len() == texts.len() => {
                    vectors.into_iter().map(Some).collect()
                }
                _ => vec![None; texts.len()],
            }
        }
    }

    fn model_from_name(name: &str) -> Result<fastembed::EmbeddingModel> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported: all-minilm-l6-v2, \
                 bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5",
                other
            ),
        }
    }
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// L2-normalize a vector. Returns `None` when the magnitude is zero
/// (a null-direction vector cannot be scored).
pub fn normalize(mut vec: Vec<f32>) -> Option<Vec<f32>> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for v in &mut vec {
        *v /= norm;
    }
    Some(vec)
}

/// Dot product. With both sides L2-normalized this is cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
