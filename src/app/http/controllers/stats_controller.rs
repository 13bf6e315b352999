use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::app::queue::topology::{self, DEAD_LETTER_QUEUE, MESSAGE_QUEUE};
use crate::app::services::message_log_service::MessageLogService;
use crate::app::services::metrics::{DLQ_DEPTH, QUEUE_DEPTH};
use crate::AppState;

/// Operational snapshot: log totals, queue depths, circuit state, job
/// last-run times. Consumed by the external monitoring collaborator.
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let by_status: HashMap<String, i64> = MessageLogService::count_by_status(&state.pool)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count logs by status");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .into_iter()
        .collect();

    let by_kind: HashMap<String, i64> = MessageLogService::count_by_type(&state.pool)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to count logs by kind");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .into_iter()
        .collect();

    let queue_depth = topology::queue_depth(&state.ops_channel, MESSAGE_QUEUE)
        .await
        .ok();
    let dlq_depth = topology::queue_depth(&state.ops_channel, DEAD_LETTER_QUEUE)
        .await
        .ok();

    if let Some(depth) = queue_depth {
        metrics::gauge!(QUEUE_DEPTH).set(depth as f64);
    }
    if let Some(depth) = dlq_depth {
        metrics::gauge!(DLQ_DEPTH).set(depth as f64);
    }

    let last_runs: HashMap<&'static str, String> = state
        .last_runs
        .read()
        .await
        .iter()
        .map(|(name, at)| (*name, at.to_rfc3339()))
        .collect();

    Ok(Json(json!({
        "messages": {
            "by_status": by_status,
            "by_kind": by_kind,
        },
        "queue": {
            "depth": queue_depth,
            "dlq_depth": dlq_depth,
        },
        "circuit_breaker": state.breaker.state().await.to_string(),
        "jobs": { "last_runs": last_runs },
    })))
}
