use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AnalysisId, AnalysisRecord, AnalysisResult, FieldId, NewOutput, OutputRecord,
};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::PostgresStore;
use crate::ports::{validate_outputs, MetadataStore};

fn analysis_from_row(row: &PgRow) -> Result<AnalysisRecord> {
    let id: Uuid = row.get("id");
    let field_id: String = row.get("field_id");
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(AnalysisRecord {
        id: AnalysisId(id),
        field_id: FieldId::new(field_id)
            .map_err(|e| FieldsenseError::Serialization(format!("Stored field_id: {}", e)))?,
        analysis_date: row.get("analysis_date"),
        created_at,
    })
}

fn output_from_row(row: &PgRow) -> Result<OutputRecord> {
    let analysis_id: Uuid = row.get("analysis_id");
    let kind: String = row.get("kind");

    Ok(OutputRecord {
        analysis_id: AnalysisId(analysis_id),
        kind: kind.parse()?,
        url: row.get("url"),
    })
}

fn query_error(action: &str, e: sqlx::Error) -> FieldsenseError {
    FieldsenseError::store(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl MetadataStore for PostgresStore {
    fn backend(&self) -> &str {
        "postgres"
    }

    async fn latest_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
    ) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, field_id, analysis_date, created_at
            FROM field_analysis
            WHERE field_id = $1 AND analysis_date = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(field_id.as_str())
        .bind(analysis_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("look up analysis", e))?;

        row.as_ref().map(analysis_from_row).transpose()
    }

    async fn outputs_for(&self, analysis_id: AnalysisId) -> Result<Vec<OutputRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT analysis_id, kind, url
            FROM analysis_files
            WHERE analysis_id = $1
            ORDER BY kind
            "#,
        )
        .bind(analysis_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("load analysis files", e))?;

        rows.iter().map(output_from_row).collect()
    }

    async fn record_analysis(
        &self,
        field_id: &FieldId,
        analysis_date: NaiveDate,
        outputs: &[NewOutput],
    ) -> Result<AnalysisResult> {
        validate_outputs(outputs)?;

        let mut tx = self.pool.begin().await.map_err(|e| query_error("begin transaction", e))?;

        // the unique (field_id, analysis_date) constraint serialises racing writers here
        sqlx::query(
            r#"
            INSERT INTO field_analysis (id, field_id, analysis_date)
            VALUES ($1, $2, $3)
            ON CONFLICT (field_id, analysis_date) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(field_id.as_str())
        .bind(analysis_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("insert analysis", e))?;

        let row = sqlx::query(
            r#"
            SELECT id, field_id, analysis_date, created_at
            FROM field_analysis
            WHERE field_id = $1 AND analysis_date = $2
            FOR UPDATE
            "#,
        )
        .bind(field_id.as_str())
        .bind(analysis_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| query_error("load analysis", e))?;
        let record = analysis_from_row(&row)?;

        let existing = sqlx::query(
            "SELECT analysis_id, kind, url FROM analysis_files WHERE analysis_id = $1",
        )
        .bind(record.id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| query_error("load analysis files", e))?
        .iter()
        .map(output_from_row)
        .collect::<Result<Vec<_>>>()?;

        if let Some(result) = AnalysisResult::from_records(&record, &existing) {
            tx.rollback().await.map_err(|e| query_error("roll back transaction", e))?;
            tracing::debug!(field_id = %field_id, "Complete analysis already recorded");
            return Ok(result);
        }

        if !existing.is_empty() {
            tracing::warn!(
                field_id = %field_id,
                analysis_id = %record.id,
                files = existing.len(),
                "Replacing files of incomplete analysis"
            );
            sqlx::query("DELETE FROM analysis_files WHERE analysis_id = $1")
                .bind(record.id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("clear analysis files", e))?;
        }

        let mut rows = Vec::with_capacity(outputs.len());
        for output in outputs {
            sqlx::query("INSERT INTO analysis_files (analysis_id, kind, url) VALUES ($1, $2, $3)")
                .bind(record.id.0)
                .bind(output.kind.as_str())
                .bind(&output.url)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("insert analysis file", e))?;

            rows.push(OutputRecord {
                analysis_id: record.id,
                kind: output.kind,
                url: output.url.clone(),
            });
        }

        tx.commit().await.map_err(|e| query_error("commit analysis", e))?;

        AnalysisResult::from_records(&record, &rows)
            .ok_or_else(|| FieldsenseError::store("recorded analysis is incomplete"))
    }

    async fn health_check(&self) -> Result<()> {
        self.health_check_inner().await
    }
}
