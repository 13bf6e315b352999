pub mod app;
pub mod config;
pub mod database;
pub mod routes;
pub mod schema;

use std::sync::Arc;

use axum::Router;
use lapin::Channel;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use app::jobs::scheduler::LastRuns;
use app::resilience::CircuitBreaker;
use database::DbPool;

/// Shared state for the health/metrics surface.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub prometheus: PrometheusHandle,
    pub breaker: Arc<CircuitBreaker>,
    pub last_runs: LastRuns,
    /// Channel reserved for passive declares and liveness checks.
    pub ops_channel: Channel,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::api::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
