//! In-memory fakes for the service seams, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use filing_chat::catalog::Catalog;
use filing_chat::config::Config;
use filing_chat::error::{ChatError, ChatResult};
use filing_chat::models::{Passage, SelectionMetadata};
use filing_chat::services::ChatServices;
use filing_chat::traits::{ChatModel, FeedbackService, IndexConnector, RunTracer, VectorIndex};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const CATALOG_JSON: &str = r#"{
    "2023": { "Q1": ["doc1", "doc2"], "Q2": ["doc3"] },
    "2024": { "Q1": ["doc4"] }
}"#;

// ─── Index ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SearchCall {
    pub query: String,
    pub filter: SelectionMetadata,
    pub top_k: usize,
}

#[derive(Default)]
pub struct FakeIndex {
    pub calls: Mutex<Vec<SearchCall>>,
}

#[async_trait]
impl VectorIndex for FakeIndex {
    fn name(&self) -> &str {
        "fake-index"
    }

    async fn search(
        &self,
        query: &str,
        filter: &SelectionMetadata,
        top_k: usize,
    ) -> ChatResult<Vec<Passage>> {
        self.calls.lock().unwrap().push(SearchCall {
            query: query.to_string(),
            filter: filter.clone(),
            top_k,
        });
        Ok(vec![Passage {
            id: format!("{}#0", filter.filename),
            text: format!("Excerpt from {}", filter.filename),
            score: 0.9,
        }])
    }
}

pub struct FakeConnector {
    pub index: Arc<FakeIndex>,
    pub connects: Arc<AtomicUsize>,
    pub fail: bool,
}

#[async_trait]
impl IndexConnector for FakeConnector {
    async fn connect(&self) -> ChatResult<Arc<dyn VectorIndex>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ChatError::Configuration("index service unavailable".into()));
        }
        Ok(self.index.clone())
    }
}

// ─── Model ──────────────────────────────────────────────────────────

/// Answers with the last line of the prompt (the question) and the first
/// context line, so tests can see what reached the model.
#[derive(Default)]
pub struct EchoModel {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, _system: &str, user: &str) -> ChatResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::Invocation("completion timed out".into()));
        }
        let context = user.lines().nth(1).unwrap_or_default();
        let question = user.lines().last().unwrap_or_default();
        Ok(format!("{} | {}", question, context))
    }
}

// ─── Tracer ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTracer {
    pub started: Mutex<Vec<(Uuid, Value)>>,
    pub ended: Mutex<Vec<(Uuid, Result<Value, String>)>>,
}

#[async_trait]
impl RunTracer for RecordingTracer {
    async fn start_run(&self, run_id: Uuid, _name: &str, inputs: Value) -> ChatResult<()> {
        self.started.lock().unwrap().push((run_id, inputs));
        Ok(())
    }

    async fn end_run(&self, run_id: Uuid, outcome: Result<Value, String>) -> ChatResult<()> {
        self.ended.lock().unwrap().push((run_id, outcome));
        Ok(())
    }
}

// ─── Feedback ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedFeedback {
    pub run_id: Uuid,
    pub key: String,
    pub score: f64,
    pub comment: Option<String>,
}

#[derive(Default)]
pub struct RecordingFeedback {
    pub submitted: Mutex<Vec<SubmittedFeedback>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl FeedbackService for RecordingFeedback {
    async fn create_feedback(
        &self,
        run_id: Uuid,
        key: &str,
        score: f64,
        comment: Option<&str>,
    ) -> ChatResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChatError::FeedbackService("503 Service Unavailable".into()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(SubmittedFeedback {
            run_id,
            key: key.to_string(),
            score,
            comment: comment.map(str::to_string),
        });
        Ok(format!("fb-{}", submitted.len()))
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub services: Arc<ChatServices>,
    pub index: Arc<FakeIndex>,
    pub connects: Arc<AtomicUsize>,
    pub model: Arc<EchoModel>,
    pub tracer: Arc<RecordingTracer>,
    pub feedback: Arc<RecordingFeedback>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Services whose index can never be loaded.
    pub fn with_broken_index() -> Self {
        Self::build(true)
    }

    fn build(fail_index: bool) -> Self {
        let index = Arc::new(FakeIndex::default());
        let connects = Arc::new(AtomicUsize::new(0));
        let model = Arc::new(EchoModel::default());
        let tracer = Arc::new(RecordingTracer::default());
        let feedback = Arc::new(RecordingFeedback::default());

        let services = ChatServices::new(
            &Config::minimal(),
            Catalog::from_json(CATALOG_JSON).unwrap(),
            FakeConnector {
                index: index.clone(),
                connects: connects.clone(),
                fail: fail_index,
            },
            model.clone(),
            tracer.clone(),
            feedback.clone(),
        );

        Self {
            services: Arc::new(services),
            index,
            connects,
            model,
            tracer,
            feedback,
        }
    }

    pub fn selection(&self, year: &str, quarter: &str, file: &str) -> SelectionMetadata {
        self.services.catalog.resolve(year, quarter, file).unwrap()
    }

    pub fn search_calls(&self) -> Vec<SearchCall> {
        self.index.calls.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<SubmittedFeedback> {
        self.feedback.submitted.lock().unwrap().clone()
    }
}
