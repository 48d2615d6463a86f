//! Process-wide collaborators shared by every session.
//!
//! [`ChatServices`] is assembled once at startup and passed by reference (or
//! `Arc`) into the session handlers. It owns the catalog, the shared
//! [`IndexHandle`] (through the [`ChainBuilder`]), the orchestrator, and the
//! feedback recorder.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{load_catalog, Catalog};
use crate::chain::ChainBuilder;
use crate::completion::OpenAIChat;
use crate::config::{Config, Credentials};
use crate::feedback::FeedbackRecorder;
use crate::index::{IndexHandle, PineconeConnector};
use crate::langsmith::LangSmithClient;
use crate::orchestrator::QueryOrchestrator;
use crate::session::ChatSession;
use crate::traits::{ChatModel, FeedbackService, IndexConnector, RunTracer};

pub struct ChatServices {
    pub catalog: Arc<Catalog>,
    pub index: Arc<IndexHandle>,
    pub chains: ChainBuilder,
    pub orchestrator: QueryOrchestrator,
    pub recorder: FeedbackRecorder,
}

impl ChatServices {
    /// Wire services from explicit parts.
    pub fn new(
        config: &Config,
        catalog: Catalog,
        connector: impl IndexConnector + 'static,
        model: Arc<dyn ChatModel>,
        tracer: Arc<dyn RunTracer>,
        feedback: Arc<dyn FeedbackService>,
    ) -> Self {
        let index = Arc::new(IndexHandle::new(connector));
        Self {
            catalog: Arc::new(catalog),
            chains: ChainBuilder::new(
                index.clone(),
                model,
                config.retrieval.top_k,
                config.completion.system_prompt.clone(),
            ),
            index,
            orchestrator: QueryOrchestrator::new(tracer),
            recorder: FeedbackRecorder::new(feedback),
        }
    }

    /// Production wiring: Pinecone index, OpenAI completions, LangSmith
    /// tracing and feedback. Fails if the catalog is unreadable or any
    /// credential is missing from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = load_catalog(&config.catalog.path)?;
        let credentials = Credentials::from_env()?;
        Self::with_credentials(config, catalog, credentials)
    }

    pub fn with_credentials(
        config: &Config,
        catalog: Catalog,
        credentials: Credentials,
    ) -> Result<Self> {
        let model = OpenAIChat::new(&config.completion, &credentials.openai_api_key)?;
        let langsmith = Arc::new(LangSmithClient::new(&config.tracing, &credentials)?);
        info!(
            project = %credentials.project,
            completion_model = model.model_name(),
            index = %config.index.name,
            documents = catalog.document_count(),
            "services configured"
        );

        let connector = PineconeConnector::new(Arc::new(config.clone()), credentials);
        Ok(Self::new(
            config,
            catalog,
            connector,
            Arc::new(model),
            langsmith.clone(),
            langsmith,
        ))
    }

    /// A fresh session with the catalog's default selection applied.
    ///
    /// An unavailable index does not prevent the session from existing; it
    /// simply has no chain, and its first question fails.
    pub async fn open_session(&self) -> ChatSession {
        let mut session = ChatSession::new();
        if let Some(default) = self.catalog.default_selection() {
            if let Err(e) = session.select(default, &self.chains).await {
                warn!(session = %session.id(), error = %e, "session opened without a chain");
            }
        }
        session
    }
}
