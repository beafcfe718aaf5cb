//! Behaviour shared by every MetadataStore backend.
//!
//! The in-memory backend always runs. The PostgreSQL backend runs when
//! `DATABASE_URL` points at a disposable database.

use chrono::NaiveDate;
use fieldsense_core::models::{AnalysisResult, FieldId, NewOutput, OutputKind};
use fieldsense_store::{MemoryMetadataStore, MetadataStore, PostgresConfig, PostgresStore};
use std::sync::Arc;

fn outputs(field: &FieldId, tag: &str) -> Vec<NewOutput> {
    OutputKind::ALL
        .iter()
        .map(|kind| NewOutput {
            kind: *kind,
            url: format!("/analysis_files/{}_{}_{}.tif", field, kind, tag),
        })
        .collect()
}

async fn lookup(store: &dyn MetadataStore, field: &FieldId, day: NaiveDate) -> Option<AnalysisResult> {
    let record = store.latest_analysis(field, day).await.unwrap()?;
    let rows = store.outputs_for(record.id).await.unwrap();
    AnalysisResult::from_records(&record, &rows)
}

async fn concurrent_writers_converge(store: Arc<dyn MetadataStore>, field: FieldId) {
    let day = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();

    let writes = (0..8).map(|i| {
        let store = store.clone();
        let field = field.clone();
        tokio::spawn(async move {
            store.record_analysis(&field, day, &outputs(&field, &i.to_string())).await
        })
    });

    let results: Vec<AnalysisResult> = futures::future::join_all(writes)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let visible = lookup(store.as_ref(), &field, day).await.unwrap();
    assert!(results.iter().all(|r| *r == visible));
}

#[tokio::test]
async fn test_memory_concurrent_writers_converge() {
    let store = Arc::new(MemoryMetadataStore::new());
    concurrent_writers_converge(store.clone(), FieldId::new("farm-concurrent").unwrap()).await;
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn test_memory_partial_record_reads_as_absent() {
    let store = MemoryMetadataStore::new();
    let field = FieldId::new("farm-partial").unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();

    let mut partial = outputs(&field, "x");
    partial.truncate(2);
    store.insert_raw(field.clone(), day, partial);

    assert!(lookup(&store, &field, day).await.is_none());
}

async fn postgres_store() -> Option<PostgresStore> {
    let config = PostgresConfig::from_env().ok()?;
    Some(PostgresStore::with_migrations(config).await.unwrap())
}

#[tokio::test]
async fn test_postgres_concurrent_writers_converge() {
    let Some(store) = postgres_store().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let field = FieldId::new(format!("it-{}", uuid_suffix())).unwrap();
    concurrent_writers_converge(Arc::new(store), field).await;
}

#[tokio::test]
async fn test_postgres_health_and_migrations() {
    let Some(store) = postgres_store().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    store.health_check().await.unwrap();
    assert!(!store.has_pending_migrations().await.unwrap());
    assert!(store.current_version().await.unwrap().is_some());
}

fn uuid_suffix() -> String {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string()
}
