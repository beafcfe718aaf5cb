//! Lookup command implementation

use anyhow::Result;
use chrono::Utc;
use fieldsense_analysis::ResultCache;
use fieldsense_core::models::FieldId;

use crate::cli::{Cli, LookupArgs, StorageBackend};
use crate::output::OutputWriter;
use crate::output_types::{FileRow, LookupOutput};
use crate::storage::open_store;

pub async fn execute(cli: &Cli, args: &LookupArgs, output: &OutputWriter) -> Result<()> {
    if cli.storage == StorageBackend::Memory {
        output.warning("The in-memory store starts empty; use --storage postgres to see recorded analyses");
    }

    let field_id = FieldId::new(args.field_id.as_str())?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let cache = ResultCache::new(open_store(cli.storage).await?);
    let result = cache.lookup(&field_id, date).await?;

    if output.is_json() {
        return output.result(LookupOutput {
            field_id: field_id.to_string(),
            analysis_date: date,
            found: result.is_some(),
            outputs: result.map(|r| r.outputs).unwrap_or_default(),
        });
    }

    match result {
        Some(result) => {
            output.section(format!("Analysis of {} on {}", field_id, date));
            output.table(FileRow::rows(&result.outputs));
        }
        None => output.info(format!("No complete analysis of {} on {}", field_id, date)),
    }
    Ok(())
}
