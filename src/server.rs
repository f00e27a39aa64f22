//! HTTP chat server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer the last user turn of a conversation |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | anything else | Static files from `[server].public_dir` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "last message must be from the user" }
//! ```
//!
//! Malformed requests get 400; remote failures get 500. Neither stops the
//! server.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the bundled chat page
//! can be served from a different origin during development.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::chat::{handle_chat, UNKNOWN_ERROR};
use crate::config::Config;
use crate::error::HrKbError;
use crate::models::ChatResponse;
use crate::traits::KnowledgeService;

/// Shared application state passed to route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    service: Arc<dyn KnowledgeService>,
}

/// Build the router without binding a socket.
///
/// Exposed separately from [`run_server`] so tests (and embedding
/// binaries) can serve it on a listener of their choosing.
pub fn router(config: Arc<Config>, service: Arc<dyn KnowledgeService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&config.server.public_dir);

    Router::new()
        .route("/api/chat", post(handle_chat_request))
        .route("/health", get(handle_health))
        .fallback_service(static_files)
        .layer(cors)
        .with_state(AppState { config, service })
}

/// Start the chat server on `0.0.0.0:<server.port>`.
///
/// Runs until the process receives Ctrl+C.
pub async fn run_server(config: &Config, service: Arc<dyn KnowledgeService>) -> anyhow::Result<()> {
    let knowledge_base_id = config.require_knowledge_base_id()?.to_string();
    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let app = router(Arc::new(config.clone()), service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
        url = %format!("http://localhost:{}", config.server.port),
        region = %config.aws.region,
        knowledge_base_id = %knowledge_base_id,
        "HR KB chat server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<HrKbError> for AppError {
    fn from(err: HrKbError) -> Self {
        if err.is_client_error() {
            return AppError {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            };
        }

        error!(error = %err, "Error in /api/chat");
        let message = err.to_string();
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: if message.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                message
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

/// Handler for `POST /api/chat`.
///
/// The body is parsed by hand rather than with the `Json` extractor so that
/// every rejection uses the `{ "error": ... }` shape. An empty body is
/// treated as `{}`.
async fn handle_chat_request(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let payload: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError {
            status: StatusCode::BAD_REQUEST,
            message: format!("request body must be valid JSON: {}", e),
        })?
    };

    let response = handle_chat(state.service.as_ref(), &state.config, &payload).await?;
    Ok(Json(response))
}
