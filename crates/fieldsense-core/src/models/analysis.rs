use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::geometry::AreaOfInterest;
use crate::error::{FieldsenseError, Result};

/// Opaque identifier of a field (farm plot).
///
/// Field ids end up in export file names, so only ASCII letters, digits,
/// `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(FieldsenseError::InvalidRequest {
                reason: "field_id cannot be empty".to_string(),
            });
        }
        if trimmed.len() > 128 {
            return Err(FieldsenseError::InvalidRequest {
                reason: "field_id is longer than 128 characters".to_string(),
            });
        }
        if let Some(c) = trimmed.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_')) {
            return Err(FieldsenseError::InvalidRequest {
                reason: format!("field_id contains invalid character '{}'", c),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FieldId {
    type Error = FieldsenseError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.0
    }
}

/// Unique identifier for a persisted analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The three layers every complete analysis produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Radar-derived soil moisture index
    Moisture,
    /// PCA composite crop stress, 0..100
    Stress,
    /// Weighted soil organic carbon proxy
    Carbon,
}

impl OutputKind {
    pub const ALL: [OutputKind; 3] = [OutputKind::Moisture, OutputKind::Stress, OutputKind::Carbon];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Moisture => "moisture",
            OutputKind::Stress => "stress",
            OutputKind::Carbon => "carbon",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = FieldsenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "moisture" => Ok(OutputKind::Moisture),
            "stress" => Ok(OutputKind::Stress),
            "carbon" => Ok(OutputKind::Carbon),
            other => Err(FieldsenseError::Serialization(format!("unknown output kind '{}'", other))),
        }
    }
}

/// One inbound analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub field_id: FieldId,
    pub area_of_interest: AreaOfInterest,
}

impl AnalysisRequest {
    pub fn new(field_id: FieldId, area_of_interest: AreaOfInterest) -> Self {
        Self { field_id, area_of_interest }
    }
}

/// Analysis-run row as stored in the metadata store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub field_id: FieldId,
    pub analysis_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Output-file row as stored in the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub analysis_id: AnalysisId,
    pub kind: OutputKind,
    pub url: String,
}

/// An output about to be recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOutput {
    pub kind: OutputKind,
    pub url: String,
}

/// Complete result of one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub field_id: FieldId,
    pub analysis_date: NaiveDate,
    pub outputs: BTreeMap<OutputKind, String>,
}

impl AnalysisResult {
    /// Assemble a result from stored rows.
    ///
    /// Returns `None` unless the rows cover every `OutputKind` exactly once;
    /// anything else is the footprint of an interrupted run.
    pub fn from_records(record: &AnalysisRecord, outputs: &[OutputRecord]) -> Option<Self> {
        if outputs.len() != OutputKind::ALL.len() {
            return None;
        }

        let mut map = BTreeMap::new();
        for output in outputs {
            if output.analysis_id != record.id {
                return None;
            }
            if map.insert(output.kind, output.url.clone()).is_some() {
                return None;
            }
        }

        if !OutputKind::ALL.iter().all(|kind| map.contains_key(kind)) {
            return None;
        }

        Some(Self {
            field_id: record.field_id.clone(),
            analysis_date: record.analysis_date,
            outputs: map,
        })
    }

    pub fn url(&self, kind: OutputKind) -> Option<&str> {
        self.outputs.get(&kind).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.outputs.len() == OutputKind::ALL.len()
            && OutputKind::ALL.iter().all(|kind| self.outputs.contains_key(kind))
    }
}
