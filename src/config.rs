use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model: None,
            endpoint: None,
            batch_size: default_batch_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_mode() -> String {
    "remote".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}
fn default_prompt_template() -> String {
    "{context}\n\n{question}".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_history_enabled")]
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            enabled: default_history_enabled(),
        }
    }
}

fn default_max_turns() -> usize {
    20
}
fn default_history_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("codebase")
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate embedding
    match config.embedding.mode.as_str() {
        "remote" => {
            if config.embedding.endpoint.is_none() {
                anyhow::bail!("embedding.endpoint must be set when mode is 'remote'");
            }
        }
        "local" => {
            if config.embedding.model.is_none() {
                anyhow::bail!("embedding.model must be set when mode is 'local'");
            }
        }
        other => anyhow::bail!(
            "Invalid embedding.mode: '{}'. Choose 'local' or 'remote'.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate llm
    if config.llm.endpoint.trim().is_empty() {
        anyhow::bail!("llm.endpoint must not be empty");
    }
    if config.llm.prompt_template.trim().is_empty() {
        anyhow::bail!("llm.prompt_template must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rag.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_remote_config() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "rag.sqlite"

[embedding]
mode = "remote"
endpoint = "http://localhost:1234/v1"

[llm]
endpoint = "http://localhost:1234/v1"
chat_model = "local-model"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.embedding.mode, "remote");
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.llm.temperature - 0.7).abs() < 1e-9);
        assert!(config.history.enabled);
    }

    #[test]
    fn test_remote_requires_endpoint() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "rag.sqlite"

[embedding]
mode = "remote"

[llm]
endpoint = "http://localhost:1234/v1"
chat_model = "local-model"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("embedding.endpoint"));
    }

    #[test]
    fn test_local_requires_model() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "rag.sqlite"

[embedding]
mode = "local"

[llm]
endpoint = "http://localhost:1234/v1"
chat_model = "local-model"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let (_tmp, path) = write_config(
            r#"
[db]
path = "rag.sqlite"

[embedding]
mode = "api"

[llm]
endpoint = "http://localhost:1234/v1"
chat_model = "local-model"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
