use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::dto::{RunAnalysisRequest, RunAnalysisResponse};
use crate::error::ApiError;
use crate::services::AnalysisService;
use crate::state::AppState;

pub async fn run_analysis(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunAnalysisRequest>, JsonRejection>,
) -> Result<Json<RunAnalysisResponse>, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        ApiError::bad_request("Invalid JSON body").with_details(rejection.body_text())
    })?;
    let request = body.into_domain()?;

    tracing::info!(field_id = %request.field_id, "Processing analysis request");

    let response = AnalysisService::run(&state, &request).await?;
    Ok(Json(response))
}
