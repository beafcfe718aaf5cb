use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::dto::HealthResponse;
use crate::services::AnalysisService;
use crate::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let health = AnalysisService::health(&state).await;
    let status =
        if health.store_reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(health))
}
