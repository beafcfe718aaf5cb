use chrono::NaiveDate;
use fieldsense_core::error::Result;
use fieldsense_core::models::{AnalysisResult, FieldId, NewOutput};
use fieldsense_store::MetadataStore;
use std::sync::Arc;

/// Same-day result cache over the metadata store
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn MetadataStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store_backend(&self) -> &str {
        self.store.backend()
    }

    /// Complete result recorded for the field on `date`, if any.
    ///
    /// A record missing any output kind reads as absent. Store failures are
    /// returned, never treated as a miss.
    pub async fn lookup(&self, field_id: &FieldId, date: NaiveDate) -> Result<Option<AnalysisResult>> {
        let Some(record) = self.store.latest_analysis(field_id, date).await? else {
            return Ok(None);
        };

        let outputs = self.store.outputs_for(record.id).await?;
        let result = AnalysisResult::from_records(&record, &outputs);
        if result.is_none() {
            tracing::warn!(
                field_id = %field_id,
                analysis_id = %record.id,
                outputs = outputs.len(),
                "Ignoring incomplete analysis"
            );
        }
        Ok(result)
    }

    /// Record a finished analysis and return the result now visible for the
    /// field and day
    pub async fn store(
        &self,
        field_id: &FieldId,
        date: NaiveDate,
        outputs: &[NewOutput],
    ) -> Result<AnalysisResult> {
        self.store.record_analysis(field_id, date, outputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsense_core::error::FieldsenseError;
    use fieldsense_core::models::OutputKind;
    use fieldsense_store::MemoryMetadataStore;

    fn field() -> FieldId {
        FieldId::new("farm-01").unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 8).unwrap()
    }

    fn outputs() -> Vec<NewOutput> {
        OutputKind::ALL
            .iter()
            .map(|kind| NewOutput { kind: *kind, url: format!("/analysis_files/farm-01_{}_2025-07-08.tif", kind) })
            .collect()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ResultCache::new(Arc::new(MemoryMetadataStore::new()));
        assert!(cache.lookup(&field(), day()).await.unwrap().is_none());

        let stored = cache.store(&field(), day(), &outputs()).await.unwrap();
        assert_eq!(cache.lookup(&field(), day()).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_two_of_three_outputs_reads_as_absent() {
        let store = MemoryMetadataStore::new();
        store.insert_raw(field(), day(), outputs()[..2].to_vec());

        let cache = ResultCache::new(Arc::new(store));
        assert!(cache.lookup(&field(), day()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_without_outputs_reads_as_absent() {
        let store = MemoryMetadataStore::new();
        store.insert_raw(field(), day(), Vec::new());

        let cache = ResultCache::new(Arc::new(store));
        assert!(cache.lookup(&field(), day()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_a_miss() {
        let store = MemoryMetadataStore::new();
        store.set_unavailable(true);

        let cache = ResultCache::new(Arc::new(store));
        let err = cache.lookup(&field(), day()).await.unwrap_err();
        assert!(matches!(err, FieldsenseError::StoreUnavailable { .. }));
    }
}
