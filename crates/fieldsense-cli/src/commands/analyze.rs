//! Analyze command implementation

use anyhow::{Context, Result};
use chrono::Utc;
use fieldsense_analysis::{AnalysisOutcome, AnalysisPipeline, FixedClock};
use fieldsense_core::models::{AnalysisRequest, AreaOfInterest, FieldId};
use std::path::Path;
use std::sync::Arc;

use crate::cli::{AnalyzeArgs, Cli};
use crate::config::load_config;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{AnalyzeOutput, ComponentInfo, FileRow, WindowInfo};
use crate::storage::open_store;

pub async fn execute(cli: &Cli, args: &AnalyzeArgs, output: &OutputWriter) -> Result<()> {
    let config = load_config(cli)?;
    let settings = config.settings()?;

    let field_id = FieldId::new(args.field_id.as_str())?;
    let area = read_area(&args.aoi)?;
    let date = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let engine = fieldsense_raster::connect(config.engine_url.value.as_deref(), settings.engine_timeout)
        .context("Failed to set up the raster engine")?;
    let store = open_store(cli.storage).await?;

    tokio::fs::create_dir_all(&settings.export_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.export_dir.display()))?;

    let pipeline = AnalysisPipeline::new(engine, store, &settings)?
        .with_clock(Arc::new(FixedClock(date)));

    output.info(format!(
        "Analyzing {} for {} with the {} engine",
        field_id,
        date,
        pipeline.engine_name()
    ));

    let outcome = pipeline
        .run(&AnalysisRequest::new(field_id, area))
        .await
        .map_err(|e| errors::analysis_failed(&e))?;

    display(outcome, output)
}

fn read_area(path: &Path) -> Result<AreaOfInterest> {
    let unreadable = |e: &dyn std::fmt::Display| {
        errors::aoi_unreadable(&path.display().to_string(), &e.to_string())
    };

    let text = std::fs::read_to_string(path).map_err(|e| unreadable(&e))?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| unreadable(&e))?;
    let area = AreaOfInterest::from_geojson(&value).map_err(|e| unreadable(&e))?;
    Ok(area)
}

fn display(outcome: AnalysisOutcome, output: &OutputWriter) -> Result<()> {
    let AnalysisOutcome { result, cached, computed } = outcome;

    if output.is_json() {
        let (window, principal_component) = match computed {
            Some(summary) => (
                Some(WindowInfo {
                    start_date: summary.window.start_date(),
                    end_date: summary.window.end_date(),
                    days: summary.window.days(),
                }),
                Some(ComponentInfo {
                    eigenvalue: summary.component.eigenvalue,
                    loadings: summary.component.loadings,
                    explained_variance: summary.component.explained_variance,
                }),
            ),
            None => (None, None),
        };

        return output.result(AnalyzeOutput {
            field_id: result.field_id.to_string(),
            analysis_date: result.analysis_date,
            cached,
            outputs: result.outputs,
            window,
            principal_component,
        });
    }

    output.section("Analysis");
    output.kv("Field", &result.field_id);
    output.kv("Date", result.analysis_date);
    output.kv("Source", if cached { "cache" } else { "computed" });

    if let Some(summary) = computed {
        output.kv("Imagery window", summary.window);
        output.kv(
            "PC1",
            format!(
                "{:.1}% of variance, loadings NDVI {:.3} NDRE {:.3} CI {:.3}",
                summary.component.explained_variance * 100.0,
                summary.component.loadings[0],
                summary.component.loadings[1],
                summary.component.loadings[2],
            ),
        );
    }

    output.section("Outputs");
    output.table(FileRow::rows(&result.outputs));
    Ok(())
}
