//! In-memory storage implementation for development and testing.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state. For production workloads, use the PostgreSQL backend.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AnalysisId, AnalysisRecord, AnalysisResult, FieldId, NewOutput, OutputRecord,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::ports::{validate_outputs, MetadataStore};

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<AnalysisRecord>,
    outputs: HashMap<AnalysisId, Vec<OutputRecord>>,
}

impl MemoryState {
    fn latest(&self, field_id: &FieldId, analysis_date: NaiveDate) -> Option<&AnalysisRecord> {
        // later insertion wins ties on created_at
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| &r.field_id == field_id && r.analysis_date == analysis_date)
            .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)))
            .map(|(_, r)| r)
    }

    fn outputs_of(&self, id: AnalysisId) -> &[OutputRecord] {
        self.outputs.get(&id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// In-memory implementation of MetadataStore.
///
/// Records and outputs share one lock so a recorded analysis becomes visible
/// with all of its outputs at once.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryMetadataStore {
    /// Create a new in-memory metadata store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreUnavailable`, or recover
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert an analysis record with the given outputs and no validation.
    ///
    /// Used to reproduce the footprint an interrupted run leaves behind.
    pub fn insert_raw(
        &self,
        field_id: FieldId,
        analysis_date: NaiveDate,
        outputs: Vec<NewOutput>,
    ) -> AnalysisId {
        let record = AnalysisRecord {
            id: AnalysisId::new(),
            field_id,
            analysis_date,
            created_at: Utc::now(),
        };
        let id = record.id;

        let mut state = self.state.write().unwrap();
        state.outputs.insert(
            id,
            outputs
                .into_iter()
                .map(|o| OutputRecord { analysis_id: id, kind: o.kind, url: o.url })
                .collect(),
        );
        state.records.push(record);
        id
    }

    /// Number of analysis records held
    pub fn record_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(FieldsenseError::store("in-memory store marked unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn latest_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
    ) -> Result<Option<AnalysisRecord>> {
        self.ensure_available()?;
        let state = self.state.read().unwrap();
        Ok(state.latest(field_id, analysis_date).cloned())
    }

    async fn outputs_for(&self, analysis_id: AnalysisId) -> Result<Vec<OutputRecord>> {
        self.ensure_available()?;
        let state = self.state.read().unwrap();
        Ok(state.outputs_of(analysis_id).to_vec())
    }

    async fn record_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
        outputs: &[NewOutput],
    ) -> Result<AnalysisResult> {
        self.ensure_available()?;
        validate_outputs(outputs)?;

        let mut state = self.state.write().unwrap();

        let existing = state.latest(field_id, analysis_date).cloned();
        let record = match existing {
            Some(record) => {
                if let Some(result) = AnalysisResult::from_records(&record, state.outputs_of(record.id))
                {
                    tracing::debug!(field_id = %field_id, "Complete analysis already recorded");
                    return Ok(result);
                }
                record
            }
            None => {
                let record = AnalysisRecord {
                    id: AnalysisId::new(),
                    field_id: field_id.clone(),
                    analysis_date,
                    created_at: Utc::now(),
                };
                state.records.push(record.clone());
                record
            }
        };

        let rows: Vec<OutputRecord> = outputs
            .iter()
            .map(|o| OutputRecord { analysis_id: record.id, kind: o.kind, url: o.url.clone() })
            .collect();
        state.outputs.insert(record.id, rows.clone());

        AnalysisResult::from_records(&record, &rows)
            .ok_or_else(|| FieldsenseError::store("recorded analysis is incomplete"))
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_available()
    }
}
