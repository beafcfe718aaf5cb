use anyhow::Result;
use fieldsense_store::postgres::{PostgresConfig, PostgresStore};
use fieldsense_store::{MemoryMetadataStore, MetadataStore};
use std::sync::Arc;

use crate::cli::StorageBackend;
use crate::errors;

/// Open the selected metadata store
pub async fn open_store(backend: StorageBackend) -> Result<Arc<dyn MetadataStore>> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryMetadataStore::new())),
        StorageBackend::Postgres => Ok(Arc::new(open_postgres().await?)),
    }
}

/// Connect to PostgreSQL from `DATABASE_URL`
pub async fn open_postgres() -> Result<PostgresStore> {
    let config = PostgresConfig::from_env()
        .map_err(|e| errors::database_connection_failed(&e.to_string()))?;

    let store = PostgresStore::new(config)
        .await
        .map_err(|e| errors::database_connection_failed(&e.to_string()))?;

    Ok(store)
}
