use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let files = ServeDir::new(&state.export_dir);

    Router::new()
        // Health
        .route("/health", get(handlers::health_check))

        // Analysis
        .route("/run-analysis", post(handlers::run_analysis))

        // Exported rasters
        .nest_service("/analysis_files", files)

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
