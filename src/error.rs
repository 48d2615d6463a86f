//! Error taxonomy shared by the library seams.
//!
//! The binary and config loading use `anyhow`; everything that crosses a
//! session handler or the HTTP surface is a [`ChatError`] so the server can
//! map each failure class to a stable error code.

use thiserror::Error;

/// Result alias for session, orchestrator, and recorder operations.
pub type ChatResult<T> = std::result::Result<T, ChatError>;

#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// Missing credential or a failed index construction. Fatal for the
    /// process: the cached index handle never recovers.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Retrieval or generation failed for this turn (including timeouts and
    /// a missing chain). No message is persisted.
    #[error("invocation failed: {0}")]
    Invocation(String),

    /// The feedback service rejected or failed the submission.
    #[error("feedback service error: {0}")]
    FeedbackService(String),

    /// Year, quarter, or document is not present in the catalog.
    #[error("unknown selection: {0}")]
    UnknownSelection(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl ChatError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Configuration(_) => "configuration",
            ChatError::Invocation(_) => "invocation",
            ChatError::FeedbackService(_) => "feedback_service",
            ChatError::UnknownSelection(_) | ChatError::BadRequest(_) => "bad_request",
            ChatError::SessionNotFound(_) => "not_found",
        }
    }

    pub(crate) fn invocation(err: impl std::fmt::Display) -> Self {
        ChatError::Invocation(err.to_string())
    }
}
