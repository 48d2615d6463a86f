//! # Filing Chat
//!
//! Retrieval-augmented chat over quarterly filings, with per-answer feedback.
//!
//! A user picks a document by year, quarter, and filename, then asks
//! questions about it. Each question runs through a retrieval chain pinned to
//! that document, is traced under a run id, and the answer can be rated with
//! thumbs or faces. Ratings are attached to the run id in the feedback service.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Catalog  │──▶│ ChatSession  │──▶│  ChainBuilder │──▶ IndexHandle (once)
//! │ (JSON)   │   │ select / ask │   └───────────────┘        │
//! └──────────┘   │ give_feedback│                            ▼
//!                └──────┬───────┘                     Pinecone + OpenAI
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   QueryOrchestrator         FeedbackRecorder
//!   (run id, tracer)          (score table)
//!          └──────────┬──────────────┘
//!                     ▼
//!                 LangSmith
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`catalog`] | Year → quarter → document catalog |
//! | [`models`] | Core data types |
//! | [`traits`] | Seams for external services |
//! | [`embedding`] | OpenAI query embeddings |
//! | [`index`] | Shared lazily-built index handle, Pinecone backend |
//! | [`completion`] | OpenAI chat completions |
//! | [`chain`] | Retriever and retrieval chain per selection |
//! | [`langsmith`] | Run tracing and feedback service |
//! | [`orchestrator`] | One traced chain invocation per question |
//! | [`feedback`] | Feedback scales and recorder |
//! | [`session`] | Session state and event handlers |
//! | [`services`] | Process-wide service wiring |
//! | [`server`] | HTTP API and chat page |
//! | [`commands`] | One-shot CLI commands |

pub mod catalog;
pub mod chain;
pub mod commands;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod index;
pub mod langsmith;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod services;
pub mod session;
pub mod traits;
