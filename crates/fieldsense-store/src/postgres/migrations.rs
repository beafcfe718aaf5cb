//! Schema versioning for the analysis tables.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::PgPool;
use thiserror::Error;

/// Migrations compiled into the binary from `crates/fieldsense-store/migrations`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Failed(#[from] MigrateError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One embedded migration and whether the database has applied it
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

pub struct MigrationManager {
    pool: PgPool,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply every pending migration in version order
    pub async fn run_migrations(&self) -> Result<(), MigrationError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    /// Status of every known migration
    pub async fn check_status(&self) -> Result<Vec<MigrationStatus>, MigrationError> {
        let applied = self.applied_versions().await?;

        Ok(MIGRATOR
            .iter()
            .map(|migration| MigrationStatus {
                version: migration.version,
                description: migration.description.to_string(),
                applied: applied.contains(&migration.version),
            })
            .collect())
    }

    pub async fn has_pending_migrations(&self) -> Result<bool, MigrationError> {
        let applied = self.applied_versions().await?;
        Ok(MIGRATOR.iter().any(|m| !applied.contains(&m.version)))
    }

    /// Highest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, MigrationError> {
        Ok(self.applied_versions().await?.into_iter().max())
    }

    async fn applied_versions(&self) -> Result<Vec<i64>, MigrationError> {
        // the tracking table only exists once a migration has run
        let exists: (bool,) = sqlx::query_as("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(&self.pool)
            .await?;
        if !exists.0 {
            return Ok(Vec::new());
        }

        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}
