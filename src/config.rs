//! TOML configuration and process credentials.
//!
//! Non-secret settings come from the config file (`--config`, default
//! `./config/fchat.toml`). The four service credentials come from the process
//! environment only and are read by [`Credentials::from_env`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ChatError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Sessions untouched for this long are dropped from the store.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    /// How often the idle-session sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            session_idle_secs: default_session_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}
fn default_session_idle_secs() -> u64 {
    3600
}
fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("./mappings.json")
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
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            control_url: default_control_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_name() -> String {
    "earning-calls".to_string()
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            api_base: default_openai_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_openai_base")]
    pub api_base: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            temperature: 0.0,
            api_base: default_openai_base(),
            timeout_secs: default_completion_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    120
}
fn default_system_prompt() -> String {
    "You are a financial analyst assistant answering questions about an earnings call \
     transcript. Use only the provided context. If the answer is not in the context, \
     say that you don't know."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TracingConfig {
    #[serde(default = "default_tracing_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            api_url: default_tracing_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_tracing_url() -> String {
    "https://api.smith.langchain.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// A config with every section at its default.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig::default(),
            catalog: CatalogConfig::default(),
            retrieval: RetrievalConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            tracing: TracingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    if config.index.name.trim().is_empty() {
        anyhow::bail!("index.name must not be empty");
    }

    for (name, secs) in [
        ("index.timeout_secs", config.index.timeout_secs),
        ("embedding.timeout_secs", config.embedding.timeout_secs),
        ("completion.timeout_secs", config.completion.timeout_secs),
        ("tracing.timeout_secs", config.tracing.timeout_secs),
        ("server.session_idle_secs", config.server.session_idle_secs),
        ("server.sweep_interval_secs", config.server.sweep_interval_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} must be > 0", name);
        }
    }

    Ok(())
}

/// Secrets for the three external services plus the tracing project.
#[derive(Clone)]
pub struct Credentials {
    pub tracing_api_key: String,
    pub openai_api_key: String,
    pub pinecone_api_key: String,
    pub project: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

pub const TRACING_KEY_VAR: &str = "LANGCHAIN_API_KEY";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const PINECONE_KEY_VAR: &str = "PINECONE_API_KEY";
pub const PROJECT_VAR: &str = "LANGCHAIN_PROJECT";

impl Credentials {
    /// Read all credentials from the process environment.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through an arbitrary lookup. A variable that is
    /// unset or blank is reported by name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ChatError::Configuration(format!("{} is not set", name)))
        };

        Ok(Self {
            tracing_api_key: get(TRACING_KEY_VAR)?,
            openai_api_key: get(OPENAI_KEY_VAR)?,
            pinecone_api_key: get(PINECONE_KEY_VAR)?,
            project: get(PROJECT_VAR)?,
        })
    }
}
