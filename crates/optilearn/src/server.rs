//! HTTP API server.
//!
//! Exposes the recommendation engine to the proposal front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/recommend` | Rank courses and/or certificates for a requirement text |
//! | `GET`  | `/health` | Health check (returns version and embedding model) |
//!
//! Request body for `POST /recommend`:
//!
//! ```json
//! { "requirements": "data engineering team", "tech_ratio": 70, "corpus": "all", "top_k": 5 }
//! ```
//!
//! Only `requirements` is required. Without `corpus`, every corpus set in
//! `[corpus]` is ranked. `top_k` overrides both per-corpus defaults from
//! `[engine]`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "provider_unavailable", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `corpus_unavailable` (500),
//! `provider_unavailable` (503), `timeout` (504), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for the browser front end.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use optilearn_core::embedding::Deadline;
use optilearn_core::error::{EmbeddingError, RecommendationError};
use optilearn_core::rank::MAX_TECH_RATIO;

use crate::config::{Config, EngineConfig};
use crate::recommend::{CorpusSelection, Recommendations, Recommender};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    recommender: Recommender,
    engine: EngineConfig,
    /// Used when a request names no corpus.
    default_selection: CorpusSelection,
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let recommender = Recommender::from_config(config)?;
    if !config.embedding.is_enabled() {
        tracing::warn!("embedding provider is disabled; /recommend will fail until one is configured");
    }

    let app = build_router(
        recommender,
        config.engine.clone(),
        CorpusSelection::configured(&config.corpus),
    );
    let bind_addr = &config.server.bind;

    println!("OptiLearn API listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Router with all routes and CORS, for embedding in tests or other servers.
pub fn build_router(
    recommender: Recommender,
    engine: EngineConfig,
    default_selection: CorpusSelection,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/recommend", post(handle_recommend))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            recommender,
            engine,
            default_selection,
        })
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

impl From<RecommendationError> for AppError {
    fn from(err: RecommendationError) -> Self {
        let (status, code) = match &err {
            RecommendationError::InvalidInput(_)
            | RecommendationError::Embedding(EmbeddingError::EmptyInput) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            RecommendationError::Embedding(EmbeddingError::DeadlineExceeded) => {
                (StatusCode::GATEWAY_TIMEOUT, "timeout")
            }
            RecommendationError::Embedding(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable")
            }
            RecommendationError::Corpus(_) | RecommendationError::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "corpus_unavailable")
            }
        };
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "recommendation failed");
        }
        AppError {
            status,
            code,
            message: format!("no recommendations available, reason: {} ({})", err.kind(), err),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.recommender.model_name().to_string(),
    })
}

// ============ POST /recommend ============

#[derive(Debug, Deserialize)]
struct RecommendRequest {
    requirements: String,
    #[serde(default)]
    tech_ratio: Option<i64>,
    #[serde(default)]
    corpus: Option<CorpusSelection>,
    #[serde(default)]
    top_k: Option<usize>,
}

async fn handle_recommend(
    State(state): State<AppState>,
    body: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<Recommendations>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;

    let tech_ratio = match req.tech_ratio {
        None => state.engine.default_tech_ratio,
        Some(r) => u8::try_from(r)
            .ok()
            .filter(|r| *r <= MAX_TECH_RATIO)
            .ok_or_else(|| {
                bad_request(format!("tech_ratio must be between 0 and {}", MAX_TECH_RATIO))
            })?,
    };
    if req.top_k == Some(0) {
        return Err(bad_request("top_k must be at least 1"));
    }

    let engine = &state.engine;
    let recommendations = state
        .recommender
        .recommend_selection(
            &req.requirements,
            tech_ratio,
            req.corpus.unwrap_or(state.default_selection),
            |kind| req.top_k.unwrap_or_else(|| engine.top_k_for(kind)),
            Deadline::after(engine.deadline()),
        )
        .await?;

    Ok(Json(recommendations))
}
