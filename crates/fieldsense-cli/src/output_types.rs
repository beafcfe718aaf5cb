use chrono::NaiveDate;
use fieldsense_core::models::OutputKind;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// Output for analyze command
#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    pub field_id: String,
    pub analysis_date: NaiveDate,
    pub cached: bool,
    pub outputs: BTreeMap<OutputKind, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_component: Option<ComponentInfo>,
}

#[derive(Debug, Serialize)]
pub struct WindowInfo {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct ComponentInfo {
    pub eigenvalue: f64,
    pub loadings: [f64; 3],
    pub explained_variance: f64,
}

/// Output for lookup command
#[derive(Debug, Serialize)]
pub struct LookupOutput {
    pub field_id: String,
    pub analysis_date: NaiveDate,
    pub found: bool,
    pub outputs: BTreeMap<OutputKind, String>,
}

/// One exported layer
#[derive(Debug, Tabled)]
pub struct FileRow {
    #[tabled(rename = "Layer")]
    pub kind: String,
    #[tabled(rename = "URL")]
    pub url: String,
}

impl FileRow {
    pub fn rows(files: &BTreeMap<OutputKind, String>) -> Vec<Self> {
        files.iter().map(|(kind, url)| Self { kind: kind.to_string(), url: url.clone() }).collect()
    }
}

/// One configuration value with its origin
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

/// One schema migration
#[derive(Debug, Serialize, Tabled)]
pub struct MigrationRow {
    #[tabled(rename = "Version")]
    pub version: i64,
    #[tabled(rename = "Description")]
    pub description: String,
    #[tabled(rename = "Applied")]
    pub applied: bool,
}
