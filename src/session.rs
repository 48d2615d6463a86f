//! Per-user chat sessions and the store that owns them.
//!
//! A [`ChatSession`] is driven by four event handlers, each running to
//! completion before the next event for the same session is handled:
//!
//! | Handler | Precondition | Postcondition |
//! |---------|--------------|---------------|
//! | [`select`](ChatSession::select) | selection resolved against the catalog | stored metadata equals the selection; the chain is built for it, or absent if the index is unavailable |
//! | [`set_scale`](ChatSession::set_scale) | none | feedback widget uses the new scale |
//! | [`ask`](ChatSession::ask) | a chain exists | user then assistant message appended; `last_run_id` is the new run |
//! | [`give_feedback`](ChatSession::give_feedback) | an answer exists | on success the receipt is stored; on rejection nothing changes |
//!
//! [`SessionStore`] hands out sessions behind a `tokio::sync::Mutex`, so
//! holding the guard for the duration of a handler serializes a session's
//! events while different sessions proceed independently. A session ends
//! when the client deletes it or when it sits idle past the configured limit
//! (see [`SessionStore::evict_idle`]).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chain::ChainBuilder;
use crate::error::{ChatError, ChatResult};
use crate::feedback::{FeedbackOutcome, FeedbackRecorder, FeedbackScale};
use crate::models::{FeedbackReceipt, Message, QueryAnswer, Role, SelectionMetadata};
use crate::orchestrator::QueryOrchestrator;
use crate::traits::Chain;

/// One user's conversation: the selected document, its chain, the
/// transcript, and the feedback widget state.
pub struct ChatSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    /// Time of the last handled event; drives idle eviction.
    last_active: DateTime<Utc>,
    /// The selection the chain was last built for.
    metadata: Option<SelectionMetadata>,
    /// `None` until a build succeeds, and after any failed rebuild.
    chain: Option<Arc<dyn Chain>>,
    /// Append-only transcript, user and assistant messages in order.
    messages: Vec<Message>,
    /// Run id of the latest answer; the default feedback target.
    last_run_id: Option<Uuid>,
    /// Active feedback scale for the widget.
    scale: FeedbackScale,
    /// Receipt of feedback recorded for the latest answer.
    feedback: Option<FeedbackReceipt>,
}

impl ChatSession {
    /// A fresh session with no selection, chain, or transcript.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            metadata: None,
            chain: None,
            messages: Vec::new(),
            last_run_id: None,
            scale: FeedbackScale::default(),
            feedback: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Mark the session as in use now.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn metadata(&self) -> Option<&SelectionMetadata> {
        self.metadata.as_ref()
    }

    /// Whether questions can be asked.
    pub fn has_chain(&self) -> bool {
        self.chain.is_some()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_run_id(&self) -> Option<Uuid> {
        self.last_run_id
    }

    pub fn scale(&self) -> FeedbackScale {
        self.scale
    }

    pub fn feedback(&self) -> Option<&FeedbackReceipt> {
        self.feedback.as_ref()
    }

    /// Apply a selection. Returns `true` when the chain was rebuilt and
    /// `false` when the selection equals the stored one.
    ///
    /// On a changed selection the old chain is dropped before the new one is
    /// built, so a failed build leaves no chain rather than a stale one.
    pub async fn select(
        &mut self,
        metadata: SelectionMetadata,
        chains: &ChainBuilder,
    ) -> ChatResult<bool> {
        self.touch();
        if self.metadata.as_ref() == Some(&metadata) {
            return Ok(false);
        }

        debug!(
            session = %self.id,
            filename = %metadata.filename,
            year = %metadata.year,
            quarter = %metadata.quarter,
            "rebuilding chain"
        );
        self.chain = None;
        let built = chains.build(&metadata).await;
        self.metadata = Some(metadata);
        self.chain = Some(built?);
        Ok(true)
    }

    /// Switch the feedback widget between thumbs and faces.
    pub fn set_scale(&mut self, scale: FeedbackScale) {
        self.touch();
        self.scale = scale;
    }

    /// Ask a question against the current chain.
    ///
    /// Both messages are appended only after the chain succeeds; any failure
    /// leaves the transcript untouched.
    pub async fn ask(
        &mut self,
        question: &str,
        orchestrator: &QueryOrchestrator,
    ) -> ChatResult<QueryAnswer> {
        self.touch();
        if question.trim().is_empty() {
            return Err(ChatError::BadRequest("question must not be empty".into()));
        }

        let chain = self.chain.clone().ok_or_else(|| {
            ChatError::Invocation("no retrieval chain: the document index is unavailable".into())
        })?;

        let user_message = Message::user(question);
        let answer = orchestrator.ask(chain.as_ref(), question).await?;

        self.messages.push(user_message);
        self.messages
            .push(Message::assistant(answer.answer.clone(), answer.run_id));
        self.last_run_id = Some(answer.run_id);
        // A new answer gets a fresh feedback widget.
        self.feedback = None;

        info!(session = %self.id, run_id = %answer.run_id, "answered question");
        Ok(answer)
    }

    /// Submit feedback for `run_id`, or for the latest answer when none is
    /// given. A named run must be one of this session's answers.
    pub async fn give_feedback(
        &mut self,
        symbol: &str,
        comment: Option<&str>,
        run_id: Option<Uuid>,
        recorder: &FeedbackRecorder,
    ) -> ChatResult<FeedbackOutcome> {
        self.touch();
        let target = match run_id {
            Some(id) => {
                let known = self
                    .messages
                    .iter()
                    .any(|m| m.role == Role::Assistant && m.run_id == Some(id));
                if !known {
                    return Err(ChatError::BadRequest(format!(
                        "run {} does not belong to this session",
                        id
                    )));
                }
                id
            }
            None => self
                .last_run_id
                .ok_or_else(|| ChatError::BadRequest("there is no answer to rate yet".into()))?,
        };

        let outcome = recorder.record(target, self.scale, symbol, comment).await?;
        if let FeedbackOutcome::Recorded { receipt, .. } = &outcome {
            self.feedback = Some(receipt.clone());
        }
        Ok(outcome)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Live sessions keyed by id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<ChatSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its shared handle.
    pub async fn insert(&self, session: ChatSession) -> Arc<Mutex<ChatSession>> {
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    /// Fails with [`ChatError::SessionNotFound`] for unknown or evicted ids.
    pub async fn get(&self, id: Uuid) -> ChatResult<Arc<Mutex<ChatSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: Uuid) -> ChatResult<()> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
    }

    /// Drop every session idle for longer than `max_idle` and return how
    /// many were removed. A session whose lock is held is mid-event and is
    /// always kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(session) if session.last_active() < cutoff => {
                debug!(session = %id, "evicting idle session");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
