//! HTTP surface for the chat page.
//!
//! Every user interaction is one request, dispatched to the matching session
//! handler while that session's lock is held.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Single-page chat UI |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/catalog` | Year → quarter → documents list for the selectors, in file order |
//! | `POST` | `/sessions` | Open a session with the default selection |
//! | `GET`  | `/sessions/{id}` | Session view: selection, transcript, feedback widget |
//! | `DELETE` | `/sessions/{id}` | End a session |
//! | `PUT`  | `/sessions/{id}/selection` | Selection changed |
//! | `PUT`  | `/sessions/{id}/scale` | Feedback scale toggled |
//! | `POST` | `/sessions/{id}/messages` | Question submitted |
//! | `POST` | `/sessions/{id}/feedback` | Feedback submitted |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invocation", "message": "invocation failed: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `invocation` (502),
//! `feedback_service` (502), `configuration` (503).
//!
//! A feedback symbol outside the active scale is not an error: the response
//! is `200` with `"status": "rejected"` and a `warning`.
//!
//! Sessions idle for longer than `[server].session_idle_secs` are dropped by a
//! background sweep every `[server].sweep_interval_secs`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::{Config, ServerConfig};
use crate::error::ChatError;
use crate::feedback::{FeedbackOutcome, FeedbackScale};
use crate::models::{FeedbackReceipt, Message, SelectionMetadata};
use crate::services::ChatServices;
use crate::session::{ChatSession, SessionStore};

const INDEX_HTML: &str = include_str!("../static/index.html");
const COMMENT_LABEL: &str = "[Optional] Please provide an explanation";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    services: Arc<ChatServices>,
    sessions: Arc<SessionStore>,
}

/// Starts the server with production services built from `config`.
///
/// Missing credentials or an unreadable catalog abort startup. The index is
/// loaded eagerly; if it fails the server still starts and every session
/// reports the failure when asked a question.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Arc::new(ChatServices::from_config(config)?);

    if let Err(e) = services.index.get().await {
        warn!(error = %e, "serving without a retrieval index");
    }

    run_server_with_services(&config.server, services).await
}

/// Starts the server with caller-provided services, plus the idle-session
/// sweep configured in `server`.
pub async fn run_server_with_services(
    server: &ServerConfig,
    services: Arc<ChatServices>,
) -> anyhow::Result<()> {
    let sessions = Arc::new(SessionStore::new());
    let app = router(services, sessions.clone());

    let listener = tokio::net::TcpListener::bind(&server.bind).await?;
    println!("Chat server listening on http://{}", listener.local_addr()?);

    let sweeper = spawn_session_sweeper(
        sessions,
        Duration::from_secs(server.session_idle_secs),
        Duration::from_secs(server.sweep_interval_secs),
    );
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

/// Periodically evicts sessions idle for longer than `max_idle`.
fn spawn_session_sweeper(
    sessions: Arc<SessionStore>,
    max_idle: Duration,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                info!(
                    evicted,
                    remaining,
                    "evicted idle sessions"
                );
            }
        }
    })
}

/// The full route table over `services` and `sessions`.
pub fn router(services: Arc<ChatServices>, sessions: Arc<SessionStore>) -> Router {
    let state = AppState { services, sessions };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/catalog", get(handle_catalog))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/selection", put(handle_selection))
        .route("/sessions/{id}/scale", put(handle_scale))
        .route("/sessions/{id}/messages", post(handle_message))
        .route("/sessions/{id}/feedback", post(handle_feedback))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let status = match &err {
            ChatError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Invocation(_) | ChatError::FeedbackService(_) => StatusCode::BAD_GATEWAY,
            ChatError::UnknownSelection(_) | ChatError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ Views ============

/// The feedback widget bound to the latest answer.
#[derive(Serialize)]
struct FeedbackWidget {
    run_id: Uuid,
    scale: FeedbackScale,
    symbols: Vec<&'static str>,
    comment_label: &'static str,
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    created_at: DateTime<Utc>,
    metadata: Option<SelectionMetadata>,
    /// Whether a chain is built and questions can be asked.
    ready: bool,
    scale: FeedbackScale,
    messages: Vec<Message>,
    last_run_id: Option<Uuid>,
    feedback_widget: Option<FeedbackWidget>,
    feedback: Option<FeedbackReceipt>,
}

impl SessionView {
    fn of(session: &ChatSession) -> Self {
        Self {
            id: session.id(),
            created_at: session.created_at(),
            metadata: session.metadata().cloned(),
            ready: session.has_chain(),
            scale: session.scale(),
            messages: session.messages().to_vec(),
            last_run_id: session.last_run_id(),
            feedback_widget: session.last_run_id().map(|run_id| FeedbackWidget {
                run_id,
                scale: session.scale(),
                symbols: session.scale().symbols().collect(),
                comment_label: COMMENT_LABEL,
            }),
            feedback: session.feedback().cloned(),
        }
    }
}

// ============ GET / , /health, /catalog ============

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    sessions: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.len().await,
    })
}

/// One year of the catalog. Years are sent as a list because JSON object
/// keys that look like integers lose their order in browsers.
#[derive(Serialize)]
struct CatalogYear {
    year: String,
    quarters: Vec<CatalogQuarter>,
}

#[derive(Serialize)]
struct CatalogQuarter {
    quarter: String,
    documents: Vec<String>,
}

fn catalog_view(catalog: &Catalog) -> Vec<CatalogYear> {
    catalog
        .entries()
        .map(|(year, quarters)| CatalogYear {
            year: year.to_string(),
            quarters: quarters
                .iter()
                .map(|(quarter, documents)| CatalogQuarter {
                    quarter: quarter.clone(),
                    documents: documents.clone(),
                })
                .collect(),
        })
        .collect()
}

async fn handle_catalog(State(state): State<AppState>) -> Json<Vec<CatalogYear>> {
    Json(catalog_view(&state.services.catalog))
}

// ============ Sessions ============

async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionView>) {
    let session = state.services.open_session().await;
    let view = SessionView::of(&session);
    state.sessions.insert(session).await;
    info!(session = %view.id, "session opened");
    (StatusCode::CREATED, Json(view))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    session.touch();
    Ok(Json(SessionView::of(&session)))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(id).await?;
    info!(session = %id, "session closed");
    Ok(StatusCode::NO_CONTENT)
}

// ============ PUT /sessions/{id}/selection ============

#[derive(Deserialize)]
struct SelectionRequest {
    year: String,
    quarter: String,
    /// Catalog document identifier, without the `.pdf` suffix.
    file: String,
}

#[derive(Serialize)]
struct SelectionResponse {
    rebuilt: bool,
    session: SessionView,
}

async fn handle_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<SelectionResponse>, AppError> {
    let metadata = state
        .services
        .catalog
        .resolve(&req.year, &req.quarter, &req.file)?;

    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let rebuilt = session.select(metadata, &state.services.chains).await?;

    Ok(Json(SelectionResponse {
        rebuilt,
        session: SessionView::of(&session),
    }))
}

// ============ PUT /sessions/{id}/scale ============

#[derive(Deserialize)]
struct ScaleRequest {
    scale: FeedbackScale,
}

async fn handle_scale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScaleRequest>,
) -> Result<Json<SessionView>, AppError> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    session.set_scale(req.scale);
    Ok(Json(SessionView::of(&session)))
}

// ============ POST /sessions/{id}/messages ============

#[derive(Deserialize)]
struct MessageRequest {
    question: String,
}

#[derive(Serialize)]
struct MessageResponse {
    answer: String,
    run_id: Uuid,
}

async fn handle_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let answer = session
        .ask(&req.question, &state.services.orchestrator)
        .await?;

    Ok(Json(MessageResponse {
        answer: answer.answer,
        run_id: answer.run_id,
    }))
}

// ============ POST /sessions/{id}/feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    /// The clicked symbol, e.g. `"👍"`.
    #[serde(alias = "score")]
    symbol: String,
    #[serde(default, alias = "text")]
    comment: Option<String>,
    #[serde(default)]
    run_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum FeedbackResponse {
    Recorded {
        feedback_id: String,
        run_id: Uuid,
        feedback_type: String,
        score: f64,
    },
    Rejected {
        warning: String,
    },
}

async fn handle_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    let outcome = session
        .give_feedback(
            &req.symbol,
            req.comment.as_deref(),
            req.run_id,
            &state.services.recorder,
        )
        .await?;

    Ok(Json(match outcome {
        FeedbackOutcome::Recorded { record, receipt } => FeedbackResponse::Recorded {
            feedback_id: receipt.feedback_id,
            run_id: record.run_id,
            feedback_type: record.category,
            score: receipt.score,
        },
        FeedbackOutcome::Rejected { warning } => FeedbackResponse::Rejected { warning },
    }))
}
