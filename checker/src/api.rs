//! # HTTP API
//!
//! Builds the axum router that exposes the checker over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description                                  |
//! |--------|-----------|----------------------------------------------|
//! | GET    | `/health` | Liveness probe                               |
//! | GET    | `/policy` | Active policy configuration                  |
//! | POST   | `/decode` | Decode a raw transaction                     |
//! | POST   | `/check`  | Evaluate a raw transaction, return a verdict |
//!
//! Request errors come back as `{ "error": "...", "kind": "..." }`: 400 when
//! the transaction or request body is bad, 422 when the transaction is fine
//! but the context cannot price it (an unknown prevout).

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use knots_filter::config::{PolicyConfig, PrevoutEntry};
use knots_filter::policy::{evaluate, PolicyContext, PolicyError, Verdict};
use knots_filter::script::Network;
use knots_filter::transaction::Transaction;

use crate::metrics::SharedMetrics;
use crate::report::TransactionView;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The checker's reported version string.
    pub version: String,
    /// Configuration the context was built from, served by `/policy`.
    pub config: Arc<PolicyConfig>,
    /// Base context for every `/check`. Request prevouts are layered on a
    /// clone of it.
    pub context: Arc<PolicyContext>,
    /// Network used to render addresses in `/decode`.
    pub network: Network,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        version: String,
        config: PolicyConfig,
        network: Network,
        metrics: SharedMetrics,
    ) -> Self {
        let context = PolicyContext::from_config(&config);
        Self {
            version,
            config: Arc::new(config),
            context: Arc::new(context),
            network,
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/policy", get(policy_handler))
        .route("/decode", post(decode_handler))
        .route("/check", post(check_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /decode`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecodeRequest {
    /// Raw transaction hex.
    pub tx: String,
    /// Overrides the server's address network.
    #[serde(default)]
    pub network: Option<Network>,
}

/// Body of `POST /check`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckRequest {
    /// Raw transaction hex.
    pub tx: String,
    /// Prevouts for this request only, on top of the server's context.
    #[serde(default)]
    pub prevouts: Vec<PrevoutEntry>,
}

/// Response payload for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable name, e.g. `missing_prevout`.
    pub kind: String,
}

/// An error on its way to becoming a response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn bad_request(kind: &str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: error.into(),
                kind: kind.to_string(),
            },
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        let status = if err.is_context_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::BAD_REQUEST
        };
        Self {
            status,
            body: ErrorResponse {
                error: err.to_string(),
                kind: err.kind().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the server is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        version: state.version.clone(),
    })
}

/// `GET /policy` — the configuration every `/check` runs against.
async fn policy_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.as_ref().clone())
}

/// `POST /decode` — decodes a transaction without evaluating it.
async fn decode_handler(
    State(state): State<AppState>,
    body: Result<Json<DecodeRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<TransactionView>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request("invalid_request", e.body_text()))?;
    let tx = Transaction::from_hex(&req.tx).map_err(PolicyError::from)?;
    let network = req.network.unwrap_or(state.network);
    Ok(Json(TransactionView::new(&tx, network)))
}

/// `POST /check` — decodes and evaluates a transaction.
///
/// A rejected transaction is still a 200: the verdict is the answer.
async fn check_handler(
    State(state): State<AppState>,
    body: Result<Json<CheckRequest>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<Verdict>, ApiError> {
    let Json(req) = match body {
        Ok(body) => body,
        Err(e) => {
            state.metrics.observe_error("invalid_request");
            return Err(ApiError::bad_request("invalid_request", e.body_text()));
        }
    };

    let started = Instant::now();
    let result = run_check(&state, &req);
    state
        .metrics
        .check_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(verdict) => {
            state.metrics.observe_verdict(&verdict);
            Ok(Json(verdict))
        }
        Err(err) => {
            tracing::debug!(kind = err.kind(), "check failed: {}", err);
            state.metrics.observe_error(err.kind());
            Err(err.into())
        }
    }
}

fn run_check(state: &AppState, req: &CheckRequest) -> Result<Verdict, PolicyError> {
    let tx = Transaction::from_hex(&req.tx)?;
    if req.prevouts.is_empty() {
        return evaluate(&tx, &state.context);
    }
    let mut ctx = state.context.as_ref().clone();
    for entry in &req.prevouts {
        ctx.prevouts.insert(entry.outpoint(), entry.txout());
    }
    evaluate(&tx, &ctx)
}
