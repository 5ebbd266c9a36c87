//! HTTP transport for the query-resolution pipeline.
//!
//! A thin wrapper: request validation and outcome mapping live here, all
//! decision logic stays in [`crate::pipeline`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Resolve a customer message into a reply |
//! | `GET`  | `/health` | Probe the retriever and report service health |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_message", "message": "too many special characters" } }
//! ```
//!
//! Error codes: `invalid_message` (400), `bad_request` (400), `internal`
//! (500). Internal failure detail is logged, never echoed to the client.
//!
//! # CORS
//!
//! Origins come from `[server].allowed_origins`; an empty list permits any
//! origin. Methods are limited to `GET` and `POST`.

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::message;
use crate::models::{ChatReply, PipelineOutcome};
use crate::pipeline::QueryResolutionPipeline;
use crate::retriever::KnowledgeRetriever;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<QueryResolutionPipeline>,
    /// Kept separately from the pipeline for the health probe.
    retriever: Arc<dyn KnowledgeRetriever>,
}

/// Start the HTTP server. Runs until the process is terminated.
pub async fn run_server(
    config: Arc<Config>,
    pipeline: Arc<QueryResolutionPipeline>,
    retriever: Arc<dyn KnowledgeRetriever>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let cors = build_cors(&config)?;

    let state = AppState {
        config,
        pipeline,
        retriever,
    };

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    info!("faqdesk listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_cors(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if config.server.allowed_origins.is_empty() {
        return Ok(cors.allow_origin(Any));
    }

    let origins = config
        .server
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|_| anyhow::anyhow!("Invalid allowed origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(cors.allow_origin(AllowOrigin::list(origins)))
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

/// Internal error type that converts into an HTTP response.
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

/// 400 for messages failing boundary validation.
fn invalid_message(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid_message".to_string(),
        message: message.into(),
    }
}

/// 400 for structurally bad requests (e.g. tripped honeypot).
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// 500 with a generic body; detail goes to the log only.
fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "Internal server error while processing chat request".to_string(),
    }
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Honeypot field, rendered invisibly in the web form. Bots fill it.
    #[serde(default, alias = "website")]
    honeypot: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let request_id = Uuid::new_v4();

    if !request.honeypot.is_empty() {
        warn!(%request_id, "honeypot tripped, rejecting request");
        return Err(bad_request("Invalid request"));
    }

    message::validate(&request.message, &state.config.limits)
        .map_err(|e| invalid_message(e.to_string()))?;

    let outcome = state.pipeline.resolve(&request.message).await;

    match outcome {
        PipelineOutcome::Answered(text)
        | PipelineOutcome::Fallback(text)
        | PipelineOutcome::GreetingReply(text)
        | PipelineOutcome::EmptyInputReply(text) => Ok(Json(ChatReply::assistant(text))),
        PipelineOutcome::Failed(e) => {
            error!(%request_id, "pipeline failed: {e}");
            Err(internal_error())
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    retriever: String,
    version: String,
}

/// Probes the retriever with a throwaway query; reports unhealthy (but
/// still 200, for probe tooling) when the search service is unreachable.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    match state.retriever.search("test", 1, None).await {
        Ok(_) => Json(HealthResponse {
            status: "healthy".to_string(),
            retriever: "connected".to_string(),
            version,
        }),
        Err(e) => {
            error!("health check failed: {e:#}");
            Json(HealthResponse {
                status: "unhealthy".to_string(),
                retriever: "disconnected".to_string(),
                version,
            })
        }
    }
}
