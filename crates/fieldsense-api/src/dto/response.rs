use chrono::NaiveDate;
use fieldsense_analysis::AnalysisOutcome;
use fieldsense_core::models::OutputKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Successful run-analysis response
#[derive(Debug, Serialize)]
pub struct RunAnalysisResponse {
    pub status: &'static str,
    pub field_id: String,
    pub analysis_date: NaiveDate,
    /// Output kind to public URL
    pub outputs: BTreeMap<OutputKind, String>,
    /// Same map under the key older clients read
    pub files: BTreeMap<OutputKind, String>,
    pub cached: bool,
}

impl From<AnalysisOutcome> for RunAnalysisResponse {
    fn from(outcome: AnalysisOutcome) -> Self {
        Self {
            status: "success",
            field_id: outcome.result.field_id.to_string(),
            analysis_date: outcome.result.analysis_date,
            files: outcome.result.outputs.clone(),
            outputs: outcome.result.outputs,
            cached: outcome.cached,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub store: String,
    pub store_reachable: bool,
    pub engine: String,
}
