//! Service seams for the retrieval, generation, tracing, and feedback calls.
//!
//! Every external collaborator sits behind one of these object-safe traits.
//! The production implementations live in [`crate::embedding`],
//! [`crate::index`], [`crate::completion`], [`crate::chain`], and
//! [`crate::langsmith`]; tests swap in in-memory fakes.
//!
//! ```text
//!   question ──▶ Chain ──▶ VectorIndex (Embedder, filter, k)
//!                  │                         │
//!                  └──────── ChatModel ◀─────┘ passages
//!
//!   RunTracer: start/finish per invocation (run id = correlation id)
//!   FeedbackService: feedback keyed by run id
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ChatResult;
use crate::models::{ChainOutput, Passage, SelectionMetadata};

/// Turns a query string into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed_query(&self, text: &str) -> ChatResult<Vec<f32>>;
}

/// A queryable vector store: embeds the query with its own [`Embedder`] and
/// searches the index. Read-only once constructed.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Nearest passages to `query` among documents exactly matching
    /// `filter`, at most `top_k` of them.
    async fn search(
        &self,
        query: &str,
        filter: &SelectionMetadata,
        top_k: usize,
    ) -> ChatResult<Vec<Passage>>;
}

/// Builds the process-wide [`VectorIndex`]. Called at most once per
/// [`IndexHandle`](crate::index::IndexHandle).
#[async_trait]
pub trait IndexConnector: Send + Sync {
    async fn connect(&self) -> ChatResult<Arc<dyn VectorIndex>>;
}

/// One chat-completion turn: system prompt plus user content in, text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> ChatResult<String>;
}

/// The composed retrieval + generation pipeline for one selection.
#[async_trait]
pub trait Chain: Send + Sync {
    /// The selection whose documents this chain retrieves from.
    fn metadata(&self) -> &SelectionMetadata;

    async fn invoke(&self, question: &str) -> ChatResult<ChainOutput>;
}

/// Records one run per chain invocation in the tracing service.
#[async_trait]
pub trait RunTracer: Send + Sync {
    async fn start_run(&self, run_id: Uuid, name: &str, inputs: Value) -> ChatResult<()>;

    /// Close a run with its outputs, or with the error text when it failed.
    async fn end_run(&self, run_id: Uuid, outcome: Result<Value, String>) -> ChatResult<()>;
}

/// Accepts feedback for a run and returns the stored record's id.
#[async_trait]
pub trait FeedbackService: Send + Sync {
    async fn create_feedback(
        &self,
        run_id: Uuid,
        key: &str,
        score: f64,
        comment: Option<&str>,
    ) -> ChatResult<String>;
}
