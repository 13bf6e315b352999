use axum::extract::State;

use crate::AppState;

/// Prometheus exposition of every pipeline counter and gauge.
pub async fn render(State(state): State<AppState>) -> String {
    state.prometheus.render()
}
