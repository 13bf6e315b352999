use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::AppState;

/// Liveness: the process is up, the pool can hand out a connection, and the
/// broker channel is still connected.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = state.pool.get().is_ok();
    let broker_ok = state.ops_channel.status().connected();
    let healthy = database_ok && broker_ok;

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "database": if database_ok { "up" } else { "down" },
            "broker": if broker_ok { "up" } else { "down" },
        })),
    )
}
