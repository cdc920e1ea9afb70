//! Configuration handling for .ask/config.json

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    discover, AskError, Result, ASK_DIR, DEFAULT_EXCLUDE, DEFAULT_INCLUDE, DEFAULT_INDEX_FILE,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_MODEL, DEFAULT_TOP_K, DEFAULT_TOP_N,
};

/// Configuration stored in .ask/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (fastembed model ID)
    #[serde(default = "default_model")]
    pub model: String,

    /// Glob patterns of files to index, relative to the indexed root
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Glob patterns to skip
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Maximum file size to index (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Index file, relative to the repository root
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,

    /// Candidates kept by vector recall
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Results kept after reranking
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub llm: LlmConfig,
}

/// Chat completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on HTTP 429
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_include() -> Vec<String> {
    DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect()
}

fn default_exclude() -> Vec<String> {
    DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_index_file() -> PathBuf {
    Path::new(ASK_DIR).join(DEFAULT_INDEX_FILE)
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            include: default_include(),
            exclude: default_exclude(),
            max_file_size: default_max_file_size(),
            index_file: default_index_file(),
            top_n: default_top_n(),
            top_k: default_top_k(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    /// Load config from the .ask directory, then apply environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = discover::config_path(root);
        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)
                .map_err(|e| AskError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Save config to the .ask directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = discover::config_path(root);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `OPENAI_BASE_URL`, `OPENAI_MODEL`, `RETRIEVAL_TOP_N` and `RERANK_TOP_K`.
    ///
    /// A count that is not a positive integer falls back to the built-in default.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL").filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(value) = lookup("RETRIEVAL_TOP_N") {
            self.top_n = parse_count("RETRIEVAL_TOP_N", &value, DEFAULT_TOP_N);
        }
        if let Some(value) = lookup("RERANK_TOP_K") {
            self.top_k = parse_count("RERANK_TOP_K", &value, DEFAULT_TOP_K);
        }
        self
    }

    /// Absolute path of the index file for a repository root.
    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.index_file)
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            AskError::Config(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))
        })
    }
}

fn parse_count(key: &str, value: &str, default: usize) -> usize {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            tracing::warn!("{} must be a positive integer, got {:?}; using {}", key, value, default);
            default
        }
    }
}
