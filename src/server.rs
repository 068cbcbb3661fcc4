//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/documents` | Multipart upload; the file is processed immediately |
//! | `GET`    | `/documents` | List documents, newest first |
//! | `GET`    | `/documents/{id}` | Document with its chunks |
//! | `DELETE` | `/documents/{id}` | Delete document, chunks and blob |
//! | `POST`   | `/documents/{id}/process` | Re-run extraction and chunking |
//! | `POST`   | `/context` | Context bundle for a query (no LLM call) |
//! | `POST`   | `/chat` | Answer a question; SSE stream unless `"stream": false` |
//! | `GET`    | `/conversations/{id}/messages` | Conversation transcript |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `unprocessable` (422),
//! `upstream` (502), `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use docqa_core::ContextBundle;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::App;
use crate::chat::{self, ChatError, ChatRequest};
use crate::documents;
use crate::ingest::{self, PipelineError, ProcessOutcome};
use crate::models::{DocumentDetail, DocumentRecord, Message};
use crate::retrieve;

/// Header carrying the conversation id of a streamed chat turn.
pub const CONVERSATION_HEADER: &str = "x-conversation-id";

/// Build the router over shared application state.
pub fn router(app: App) -> Router {
    let max_upload = app.config.server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/documents",
            post(handle_upload)
                .get(handle_list)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/documents/{id}/process", post(handle_process))
        .route("/context", post(handle_context))
        .route("/chat", post(handle_chat))
        .route("/conversations/{id}/messages", get(handle_messages))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app)
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(app: App) -> anyhow::Result<()> {
    let bind_addr = app.config.server.bind.clone();
    let router = router(app);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("docqa listening on http://{}", bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::UnsupportedFormat(_) => bad_request(message),
            PipelineError::NotFound(_) => not_found(message),
            PipelineError::Extraction(_) => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", message)
            }
            PipelineError::Internal(e) => e.into(),
            PipelineError::Download { .. } | PipelineError::Insert { .. } => internal(message),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage => bad_request("message must not be empty"),
            ChatError::Llm(e) => AppError::new(StatusCode::BAD_GATEWAY, "upstream", e.to_string()),
            ChatError::Internal(e) => e.into(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ /documents ============

#[derive(Serialize)]
struct UploadResponse {
    document: DocumentRecord,
    outcome: ProcessOutcome,
}

/// Handler for `POST /documents`.
///
/// Takes the first multipart field carrying a filename, stores it and
/// processes it before responding. When extraction fails the document stays
/// listed with status `error` and the response is `422`.
async fn handle_upload(
    State(app): State<App>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let filename = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let record = ingest::upload(&app, &filename, &bytes).await?;
        let outcome = ingest::process(&app, &record.id).await?;
        let document = documents::find_document(&app.pool, &record.id)
            .await?
            .ok_or_else(|| not_found(format!("document not found: {}", record.id)))?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse { document, outcome }),
        ));
    }

    Err(bad_request("multipart body contains no file"))
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<DocumentRecord>,
}

async fn handle_list(State(app): State<App>) -> Result<Json<ListResponse>, AppError> {
    let documents = documents::list_documents(&app.pool).await?;
    Ok(Json(ListResponse { documents }))
}

async fn handle_get_document(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>, AppError> {
    documents::get_document(&app.pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", id)))
}

async fn handle_delete_document(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if documents::delete_document(&app.pool, app.store.as_ref(), &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("document not found: {}", id)))
    }
}

async fn handle_process(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<Json<ProcessOutcome>, AppError> {
    Ok(Json(ingest::process(&app, &id).await?))
}

// ============ POST /context ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    document_ids: Vec<String>,
}

async fn handle_context(
    State(app): State<App>,
    Json(req): Json<ContextRequest>,
) -> Result<Json<ContextBundle>, AppError> {
    let bundle = retrieve::build_context(&app, &req.query, &req.document_ids).await?;
    Ok(Json(bundle))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatBody {
    #[serde(flatten)]
    request: ChatRequest,
    #[serde(default = "default_stream")]
    stream: bool,
}

fn default_stream() -> bool {
    true
}

/// Handler for `POST /chat`.
///
/// Streams `sources`, deltas and `[DONE]` as server-sent events; the
/// conversation id is returned in the `x-conversation-id` header. With
/// `"stream": false` the full answer is returned as JSON.
async fn handle_chat(
    State(app): State<App>,
    Json(body): Json<ChatBody>,
) -> Result<Response, AppError> {
    if !body.stream {
        let reply = chat::answer(&app, body.request).await?;
        return Ok(Json(reply).into_response());
    }

    let turn = chat::start_turn(&app, body.request).await?;
    let events =
        ReceiverStream::new(turn.frames).map(|frame| Ok::<_, Infallible>(frame.into_event()));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&turn.conversation_id) {
        response.headers_mut().insert(CONVERSATION_HEADER, value);
    }
    Ok(response)
}

// ============ GET /conversations/{id}/messages ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessagesResponse {
    conversation_id: String,
    messages: Vec<Message>,
}

async fn handle_messages(
    State(app): State<App>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = chat::list_messages(&app.pool, &id).await?;
    Ok(Json(MessagesResponse {
        conversation_id: id,
        messages,
    }))
}
