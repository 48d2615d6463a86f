//! Retriever and retrieval-augmented chain for one selection.
//!
//! A [`Retriever`] pins the shared index to one document (exact metadata
//! filter, top-k). A [`RetrievalChain`] feeds the retrieved passages and the
//! question to the chat model. [`ChainBuilder`] produces both from a
//! [`SelectionMetadata`] and is what sessions call whenever their selection
//! changes.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::ChatResult;
use crate::index::IndexHandle;
use crate::models::{ChainOutput, Passage, SelectionMetadata};
use crate::traits::{Chain, ChatModel, VectorIndex};

/// The shared index narrowed to one document.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    /// Exact-match filter; only passages from this document are returned.
    filter: SelectionMetadata,
    /// Passages fetched per question.
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, filter: SelectionMetadata, top_k: usize) -> Self {
        Self {
            index,
            filter,
            top_k,
        }
    }

    /// The selection this retriever is pinned to.
    pub fn filter(&self) -> &SelectionMetadata {
        &self.filter
    }

    /// The `top_k` passages nearest to `query` within the selected document.
    pub async fn retrieve(&self, query: &str) -> ChatResult<Vec<Passage>> {
        self.index.search(query, &self.filter, self.top_k).await
    }
}

/// Answers a question from the passages its retriever returns.
pub struct RetrievalChain {
    retriever: Retriever,
    model: Arc<dyn ChatModel>,
    /// Sent as the system message on every completion.
    system_prompt: String,
}

impl RetrievalChain {
    pub fn new(retriever: Retriever, model: Arc<dyn ChatModel>, system_prompt: String) -> Self {
        Self {
            retriever,
            model,
            system_prompt,
        }
    }
}

#[async_trait]
impl Chain for RetrievalChain {
    fn metadata(&self) -> &SelectionMetadata {
        self.retriever.filter()
    }

    async fn invoke(&self, question: &str) -> ChatResult<ChainOutput> {
        let context = self.retriever.retrieve(question).await?;
        debug!(
            passages = context.len(),
            filename = %self.retriever.filter().filename,
            "retrieved context"
        );

        let prompt = render_prompt(&context, question);
        let answer = self.model.complete(&self.system_prompt, &prompt).await?;

        Ok(ChainOutput { answer, context })
    }
}

/// `Context:` with numbered passages, then the question.
fn render_prompt(context: &[Passage], question: &str) -> String {
    let mut prompt = String::from("Context:\n");
    if context.is_empty() {
        prompt.push_str("(no matching passages)\n");
    }
    for (i, passage) in context.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, passage.text.trim()));
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question.trim());
    prompt
}

/// Builds a retriever/chain pair from a selection, using the shared index.
pub struct ChainBuilder {
    /// Shared by every chain this builder produces.
    index: Arc<IndexHandle>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
    system_prompt: String,
}

impl ChainBuilder {
    pub fn new(
        index: Arc<IndexHandle>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
        system_prompt: String,
    ) -> Self {
        Self {
            index,
            model,
            top_k,
            system_prompt,
        }
    }

    /// Fails with a configuration error if the shared index never loaded.
    pub async fn build(&self, metadata: &SelectionMetadata) -> ChatResult<Arc<dyn Chain>> {
        let index = self.index.get().await?;
        let retriever = Retriever::new(index, metadata.clone(), self.top_k);
        Ok(Arc::new(RetrievalChain::new(
            retriever,
            self.model.clone(),
            self.system_prompt.clone(),
        )))
    }
}
