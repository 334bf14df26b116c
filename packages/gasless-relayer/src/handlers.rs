//! HTTP request handlers.

use crate::ledger::now_ms;
use crate::maintenance::TriggerOutcome;
use crate::metrics::METRICS;
use crate::middleware::RequestId;
use crate::response::{FundManagerStatusResponse, HealthResponse, TriggerResponse};
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;
use tracing::info;

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = METRICS.render(state.scheduler.is_running());
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

/// Health check with wallet, RPC and scheduler status.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rpc_status = state.ledger.health_check().await.unwrap_or("unavailable");
    let running = state.scheduler.is_running();

    let status = if rpc_status == "unavailable" {
        "unavailable"
    } else if rpc_status == "degraded" || !running {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        wallet: state.wallet.pubkey().to_string(),
        rpc_status,
        fund_manager_running: running,
        dry_run: state.config.dry_run,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

pub async fn fund_manager_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(FundManagerStatusResponse {
        fund_manager: state.scheduler.status(),
        timestamp_ms: now_ms(),
    })
}

/// Start an out-of-band maintenance cycle. Does not wait for the result.
pub async fn fund_manager_trigger(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> impl IntoResponse {
    let outcome = state.scheduler.trigger();
    info!(request_id = %request_id.0, ?outcome, "Maintenance trigger requested");
    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            success: outcome == TriggerOutcome::Started,
            status: outcome,
        }),
    )
}
