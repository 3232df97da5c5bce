//! Axum router and HTTP request handlers for the authorizer.
//!
//! Routes:
//! - `POST /` (and any sub-path)  - gateway authorization endpoint
//! - `GET  /healthz`              - health check
//! - `GET  /metrics`              - Prometheus metrics
//!
//! The gateway forwards the original request path verbatim, so every POST
//! path resolves to the same decision endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::instrument;

use crate::engine::Verdict;
use crate::metrics::{VerdictKind, VerdictLabels};
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handle_authorize))
        .route("/{*path}", post(handle_authorize))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AllowBody {
    active: bool,
    context: AllowContext,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllowContext {
    subject_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DenyBody {
    active: bool,
    www_authenticate: &'static str,
}

/// Map a verdict onto the fixed response shapes the gateway expects. Every
/// deny looks the same regardless of the failing stage.
fn verdict_response(verdict: Verdict) -> Response {
    match verdict {
        Verdict::Allowed { subject_id } => (
            StatusCode::OK,
            Json(AllowBody {
                active: true,
                context: AllowContext { subject_id },
            }),
        )
            .into_response(),
        Verdict::Denied => (
            StatusCode::UNAUTHORIZED,
            Json(DenyBody {
                active: false,
                www_authenticate: "Signature",
            }),
        )
            .into_response(),
    }
}

fn verdict_kind(verdict: &Verdict) -> VerdictKind {
    match verdict {
        Verdict::Allowed { .. } => VerdictKind::Allow,
        Verdict::Denied => VerdictKind::Deny,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /{*path}`
///
/// Body is the gateway's forwarded-header payload. The response is one of
/// the two fixed verdict shapes; internal faults also map to the deny shape
/// so nothing propagates to the gateway as a 5xx.
#[instrument(skip(state, body))]
async fn handle_authorize(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();

    let verdict = state.engine.decide(&body).await;

    let metrics = &state.metrics.metrics;
    metrics
        .decision_duration_seconds
        .observe(started.elapsed().as_secs_f64());
    metrics
        .decisions_total
        .get_or_create(&VerdictLabels {
            verdict: verdict_kind(&verdict),
        })
        .inc();

    verdict_response(verdict)
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health_state = crate::health::HealthState {
        config: Arc::clone(&state.config),
        http_client: state.http_client.clone(),
    };
    crate::health::health_handler(axum::extract::State(health_state)).await
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the authorizer.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    let mut buf = String::new();
    match prometheus_client::encoding::text::encode(&mut buf, &state.metrics.registry) {
        Ok(()) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            buf,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
