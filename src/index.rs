//! The process-wide retrieval index handle and its Pinecone backend.
//!
//! [`IndexHandle`] is built once at startup and shared by every session
//! through an `Arc`. The first caller of [`IndexHandle::get`] triggers
//! construction through the configured [`IndexConnector`]. Concurrent first
//! callers wait on the same construction. The outcome, success or failure,
//! is cached for the lifetime of the process: a failed construction is a
//! configuration error that only a restart clears.
//!
//! [`PineconeConnector`] resolves the index host from the control plane and
//! returns a [`PineconeIndex`] that embeds queries with [`OpenAIEmbedder`] and
//! runs filtered top-k queries against the data plane.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::{Config, Credentials};
use crate::embedding::OpenAIEmbedder;
use crate::error::{ChatError, ChatResult};
use crate::models::{Passage, SelectionMetadata};
use crate::traits::{Embedder, IndexConnector, VectorIndex};

/// Lazily constructed, process-wide vector index.
pub struct IndexHandle {
    /// Invoked at most once, by the first [`get`](IndexHandle::get).
    connector: Box<dyn IndexConnector>,
    /// The construction outcome, success or failure.
    cell: OnceCell<ChatResult<Arc<dyn VectorIndex>>>,
}

impl IndexHandle {
    /// A handle that has not connected yet. Nothing touches the network
    /// until the first [`get`](IndexHandle::get).
    pub fn new(connector: impl IndexConnector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            cell: OnceCell::new(),
        }
    }

    /// Returns the shared index, constructing it on first use. Any
    /// construction failure surfaces as [`ChatError::Configuration`].
    pub async fn get(&self) -> ChatResult<Arc<dyn VectorIndex>> {
        self.cell
            .get_or_init(|| async {
                match self.connector.connect().await {
                    Ok(index) => {
                        info!(index = index.name(), "retrieval index ready");
                        Ok(index)
                    }
                    Err(e) => {
                        error!(error = %e, "could not load retrieval index");
                        Err(match e {
                            ChatError::Configuration(msg) => ChatError::Configuration(msg),
                            other => ChatError::Configuration(format!(
                                "could not load index: {}",
                                other
                            )),
                        })
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether construction has run (successfully or not).
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

// ============ Pinecone ============

/// Connects to a named Pinecone index, embedding queries with OpenAI.
pub struct PineconeConnector {
    /// Supplies the `[index]` and `[embedding]` sections.
    config: Arc<Config>,
    credentials: Credentials,
}

impl PineconeConnector {
    /// Stores what `connect` needs; no request is made here.
    pub fn new(config: Arc<Config>, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl IndexConnector for PineconeConnector {
    async fn connect(&self) -> ChatResult<Arc<dyn VectorIndex>> {
        let credentials = &self.credentials;
        let index_config = &self.config.index;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(index_config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Configuration(format!("index client: {}", e)))?;

        let describe_url = format!(
            "{}/indexes/{}",
            index_config.control_url.trim_end_matches('/'),
            index_config.name
        );

        let response = client
            .get(&describe_url)
            .header("Api-Key", &credentials.pinecone_api_key)
            .send()
            .await
            .map_err(|e| ChatError::Configuration(format!("describe index: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Configuration(format!(
                "describe index '{}' failed {}: {}",
                index_config.name, status, body_text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ChatError::Configuration(format!("describe index response: {}", e)))?;
        let host = json
            .get("host")
            .and_then(|h| h.as_str())
            .ok_or_else(|| {
                ChatError::Configuration(format!(
                    "index '{}' has no host in describe response",
                    index_config.name
                ))
            })?;

        let embedder = OpenAIEmbedder::new(&self.config.embedding, &credentials.openai_api_key)?;
        debug!(
            host,
            embedding_model = embedder.model_name(),
            "resolved index host"
        );

        Ok(Arc::new(PineconeIndex {
            client,
            name: index_config.name.clone(),
            query_url: format!("{}/query", host_url(host)),
            api_key: credentials.pinecone_api_key.clone(),
            embedder: Arc::new(embedder),
        }))
    }
}

/// A resolved Pinecone index: data-plane URL plus the query embedder.
pub struct PineconeIndex {
    /// Carries the `[index]` request timeout.
    client: reqwest::Client,
    name: String,
    /// `https://{host}/query`, resolved from the control plane.
    query_url: String,
    api_key: String,
    embedder: Arc<dyn Embedder>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        filter: &SelectionMetadata,
        top_k: usize,
    ) -> ChatResult<Vec<Passage>> {
        let vector = self.embedder.embed_query(query).await?;
        let body = query_body(&vector, filter, top_k);

        let response = self
            .client
            .post(&self.query_url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::invocation(format!("index query: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Invocation(format!(
                "Pinecone query error {}: {}",
                status, body_text
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ChatError::invocation(format!("index query response: {}", e)))?;
        parse_matches(&json)
    }
}

fn host_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Exact-match filter on every selection field.
fn metadata_filter(filter: &SelectionMetadata) -> Value {
    json!({
        "filename": { "$eq": filter.filename },
        "year": { "$eq": filter.year },
        "quarter": { "$eq": filter.quarter },
    })
}

fn query_body(vector: &[f32], filter: &SelectionMetadata, top_k: usize) -> Value {
    json!({
        "vector": vector,
        "topK": top_k,
        "filter": metadata_filter(filter),
        "includeMetadata": true,
    })
}

fn parse_matches(json: &Value) -> ChatResult<Vec<Passage>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| ChatError::invocation("Invalid Pinecone response: missing matches"))?;

    Ok(matches
        .iter()
        .filter_map(|m| {
            let text = m.get("metadata")?.get("text")?.as_str()?;
            Some(Passage {
                id: m
                    .get("id")
                    .and_then(|i| i.as_str())
                    .unwrap_or_default()
                    .to_string(),
                text: text.to_string(),
                score: m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32,
            })
        })
        .collect())
}
