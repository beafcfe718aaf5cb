use async_trait::async_trait;
use chrono::NaiveDate;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AnalysisId, AnalysisRecord, AnalysisResult, FieldId, NewOutput, OutputKind, OutputRecord,
};

/// Port for analysis metadata storage
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Short identifier used in logs and health reports
    fn backend(&self) -> &str;

    /// Most recently created analysis record for a field and day
    async fn latest_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
    ) -> Result<Option<AnalysisRecord>>;

    /// Output records attached to an analysis
    async fn outputs_for(&self, analysis_id: AnalysisId) -> Result<Vec<OutputRecord>>;

    /// Record an analysis and its outputs as one unit.
    ///
    /// If a complete result for the same field and day already exists it is
    /// kept and returned unchanged. The returned result is the one visible to
    /// subsequent lookups.
    async fn record_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
        outputs: &[NewOutput],
    ) -> Result<AnalysisResult>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<()>;
}

/// Reject output sets that are not exactly one URL per kind
pub(crate) fn validate_outputs(outputs: &[NewOutput]) -> Result<()> {
    let complete = outputs.len() == OutputKind::ALL.len()
        && OutputKind::ALL.iter().all(|kind| outputs.iter().any(|o| o.kind == *kind));

    if complete {
        Ok(())
    } else {
        Err(FieldsenseError::InvalidRequest {
            reason: format!(
                "an analysis needs exactly one output per kind, got {:?}",
                outputs.iter().map(|o| o.kind).collect::<Vec<_>>()
            ),
        })
    }
}
