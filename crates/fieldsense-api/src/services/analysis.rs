use fieldsense_core::models::AnalysisRequest;

use crate::dto::{HealthResponse, RunAnalysisResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Service for running analyses and reporting readiness
pub struct AnalysisService;

impl AnalysisService {
    /// Run the pipeline for one request
    pub async fn run(
        state: &AppState,
        request: &AnalysisRequest,
    ) -> Result<RunAnalysisResponse, ApiError> {
        let outcome = state.pipeline.run(request).await.map_err(|e| {
            tracing::error!(field_id = %request.field_id, error = %e, "Analysis request failed");
            ApiError::from(e)
        })?;

        Ok(RunAnalysisResponse::from(outcome))
    }

    /// Probe the metadata store
    pub async fn health(state: &AppState) -> HealthResponse {
        let reachable = match state.store.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(store = state.store.backend(), error = %e, "Health check failed");
                false
            }
        };

        HealthResponse {
            status: if reachable { "ok" } else { "degraded" },
            service: "fieldsense-api",
            store: state.store.backend().to_string(),
            store_reachable: reachable,
            engine: state.pipeline.engine_name().to_string(),
        }
    }
}
