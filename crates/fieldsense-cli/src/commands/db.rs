//! Database management commands

use anyhow::{Context, Result};
use fieldsense_store::postgres::PostgresStore;

use crate::cli::{DbArgs, DbCommand};
use crate::output::OutputWriter;
use crate::output_types::MigrationRow;
use crate::storage::open_postgres;

/// Execute database management commands
pub async fn execute(args: &DbArgs, output: &OutputWriter) -> Result<()> {
    let store = open_postgres().await?;

    match args.command {
        DbCommand::Migrate => execute_migrate(&store, output).await,
        DbCommand::Status => execute_status(&store, output).await,
    }
}

/// Apply pending migrations
async fn execute_migrate(store: &PostgresStore, output: &OutputWriter) -> Result<()> {
    if !store.has_pending_migrations().await? {
        output.success("Schema is up to date");
        return Ok(());
    }

    output.info("Applying migrations...");
    store.run_migrations().await.context("Failed to apply migrations")?;

    let version = store.current_version().await?;
    output.success(format!(
        "Migrated to version {}",
        version.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
    ));
    Ok(())
}

/// Show migration status
async fn execute_status(store: &PostgresStore, output: &OutputWriter) -> Result<()> {
    let rows: Vec<MigrationRow> = store
        .migration_status()
        .await?
        .into_iter()
        .map(|status| MigrationRow {
            version: status.version,
            description: status.description,
            applied: status.applied,
        })
        .collect();

    if output.is_json() {
        return output.result(rows);
    }

    let pending = rows.iter().filter(|row| !row.applied).count();
    output.section("Migrations");
    output.table(rows);
    if pending > 0 {
        output.warning(format!("{} migration(s) pending; run `fieldsense db migrate`", pending));
    }
    Ok(())
}
