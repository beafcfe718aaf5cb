//! PostgreSQL storage adapter implementation

mod analysis;
pub mod config;
pub mod migrations;

pub use config::PostgresConfig;
pub use migrations::{MigrationError, MigrationManager, MigrationStatus};

use fieldsense_core::error::{FieldsenseError, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

/// PostgreSQL storage adapter
pub struct PostgresStore {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresStore {
    /// Connect with the given configuration, running migrations when
    /// `config.auto_migrate` is set
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| FieldsenseError::store(format!("Failed to connect to database: {}", e)))?;

        let store = Self { pool, config };
        store.health_check_inner().await?;

        if store.config.auto_migrate {
            store.run_migrations().await?;
        }

        tracing::info!(
            max_connections = store.config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(store)
    }

    /// Connect and run migrations regardless of configuration
    pub async fn with_migrations(config: PostgresConfig) -> Result<Self> {
        let store = Self::new(config).await?;
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        self.migrations()
            .run_migrations()
            .await
            .map_err(|e| FieldsenseError::store(format!("Migration failed: {}", e)))
    }

    /// Check migration status
    pub async fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        self.migrations().check_status().await.map_err(|e| {
            FieldsenseError::store(format!("Failed to check migration status: {}", e))
        })
    }

    /// Check if there are pending migrations
    pub async fn has_pending_migrations(&self) -> Result<bool> {
        self.migrations().has_pending_migrations().await.map_err(|e| {
            FieldsenseError::store(format!("Failed to check pending migrations: {}", e))
        })
    }

    /// Get the current schema version
    pub async fn current_version(&self) -> Result<Option<i64>> {
        self.migrations()
            .current_version()
            .await
            .map_err(|e| FieldsenseError::store(format!("Failed to get current version: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }

    fn migrations(&self) -> MigrationManager {
        MigrationManager::new(self.pool.clone())
    }

    async fn health_check_inner(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| FieldsenseError::store(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
