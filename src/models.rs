//! Core data models shared by the session, orchestrator, and HTTP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The document a session is chatting about.
///
/// Two selections are the same document iff all three fields are equal;
/// that equality is what decides whether a session rebuilds its chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionMetadata {
    pub filename: String,
    pub year: String,
    pub quarter: String,
}

impl SelectionMetadata {
    /// Builds the metadata for a catalog entry. Catalog identifiers are bare
    /// names; indexed documents carry the `.pdf` suffix.
    pub fn from_selection(year: &str, quarter: &str, document: &str) -> Self {
        Self {
            filename: format!("{}.pdf", document),
            year: year.to_string(),
            quarter: quarter.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Set on assistant messages: the run that produced this answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            run_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            run_id: Some(run_id),
        }
    }
}

/// A retrieved passage from the vector index.
#[derive(Debug, Clone, Serialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// What a chain invocation produces.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub answer: String,
    pub context: Vec<Passage>,
}

/// A completed turn: the answer and the run id captured at invocation.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub run_id: Uuid,
}

/// A feedback entry as sent to the feedback service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub run_id: Uuid,
    pub score: f64,
    /// `"<scale> <symbol>"`, e.g. `"faces 😐"`.
    pub category: String,
    pub comment: Option<String>,
}

/// What the session keeps after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackReceipt {
    pub feedback_id: String,
    pub score: f64,
}
