use axum::{routing::get, Router};

use crate::app::http::controllers::{health_controller, metrics_controller, stats_controller};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_controller::health))
        .route("/api/stats", get(stats_controller::stats))
        .route("/metrics", get(metrics_controller::render))
}
