//! Export file naming and staging.
//!
//! Outputs are first written to hidden staging files. Publishing renames them
//! onto their deterministic names and sets aside any files they replace.
//! Those stay recoverable until the run commits: a run that fails or is
//! cancelled before then removes its own files and restores the earlier ones.

use chrono::NaiveDate;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{FieldId, NewOutput, OutputKind};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where outputs are written and the URLs they are served under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportLayout {
    dir: PathBuf,
    url_prefix: String,
}

impl ExportLayout {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self { dir: dir.into(), url_prefix: url_prefix.into().trim_end_matches('/').to_string() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the export directory if it is missing
    pub async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| FieldsenseError::ExportFailure {
            output: "export directory".to_string(),
            path: self.dir.clone(),
            reason: e.to_string(),
        })
    }

    /// `{field_id}_{kind}_{date}.tif`
    pub fn file_name(field_id: &FieldId, kind: OutputKind, date: NaiveDate) -> String {
        format!("{}_{}_{}.tif", field_id, kind, date.format("%Y-%m-%d"))
    }

    pub fn path(&self, field_id: &FieldId, kind: OutputKind, date: NaiveDate) -> PathBuf {
        self.dir.join(Self::file_name(field_id, kind, date))
    }

    pub fn url(&self, field_id: &FieldId, kind: OutputKind, date: NaiveDate) -> String {
        format!("{}/{}", self.url_prefix, Self::file_name(field_id, kind, date))
    }

    /// Start staging the outputs of one run
    pub fn stage(&self, field_id: &FieldId, date: NaiveDate) -> ExportGuard {
        ExportGuard {
            layout: self.clone(),
            field_id: field_id.clone(),
            date,
            run: Uuid::new_v4().simple().to_string(),
            staged: Vec::new(),
        }
    }
}

/// Staged outputs of one run.
///
/// Dropping the guard before `publish` removes every staged file.
#[derive(Debug)]
pub struct ExportGuard {
    layout: ExportLayout,
    field_id: FieldId,
    date: NaiveDate,
    run: String,
    staged: Vec<(OutputKind, PathBuf)>,
}

impl ExportGuard {
    /// Reserve the staging path for `kind`
    pub fn staging_path(&mut self, kind: OutputKind) -> PathBuf {
        let path = self.hidden_path(kind, "tif");
        self.staged.push((kind, path.clone()));
        path
    }

    /// `.{field_id}_{kind}_{date}.{run}.{extension}` next to the final file
    fn hidden_path(&self, kind: OutputKind, extension: &str) -> PathBuf {
        let name = ExportLayout::file_name(&self.field_id, kind, self.date);
        self.layout.dir.join(format!(
            ".{}.{}.{}",
            name.trim_end_matches(".tif"),
            self.run,
            extension
        ))
    }

    /// Move every staged file onto its final name.
    ///
    /// On error, files already moved are rolled back and the rest stay with
    /// the guard for cleanup.
    pub fn publish(mut self) -> Result<PublishedExports> {
        let staged = std::mem::take(&mut self.staged);
        let mut published = PublishedExports { entries: Vec::new(), outputs: Vec::new() };

        for (i, (kind, staging)) in staged.iter().enumerate() {
            let target = self.layout.path(&self.field_id, *kind, self.date);
            let backup = self.hidden_path(*kind, "prev.tif");

            let replaced = match std::fs::rename(&target, &backup) {
                Ok(()) => Some(backup),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    self.staged = staged[i..].to_vec();
                    return Err(export_failure(*kind, &target, e));
                }
            };

            if let Err(e) = std::fs::rename(staging, &target) {
                if let Some(backup) = &replaced {
                    restore(*kind, backup, &target);
                }
                self.staged = staged[i..].to_vec();
                return Err(export_failure(*kind, &target, e));
            }

            published.entries.push(Published { kind: *kind, target, replaced });
            published.outputs.push(NewOutput {
                kind: *kind,
                url: self.layout.url(&self.field_id, *kind, self.date),
            });
        }

        Ok(published)
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        for (kind, path) in self.staged.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(%kind, path = %path.display(), "Discarded staged export"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    %kind,
                    path = %path.display(),
                    error = %e,
                    "Failed to discard staged export"
                ),
            }
        }
    }
}

#[derive(Debug)]
struct Published {
    kind: OutputKind,
    target: PathBuf,
    /// Earlier file at `target`, set aside until commit
    replaced: Option<PathBuf>,
}

/// Outputs moved onto their final names but not yet recorded.
///
/// Dropping without `commit` removes them and puts back the files they
/// replaced.
#[derive(Debug)]
pub struct PublishedExports {
    entries: Vec<Published>,
    outputs: Vec<NewOutput>,
}

impl PublishedExports {
    pub fn outputs(&self) -> &[NewOutput] {
        &self.outputs
    }

    /// Keep the published files once their record is durable
    pub fn commit(mut self) {
        for entry in self.entries.drain(..) {
            if let Some(replaced) = entry.replaced {
                if let Err(e) = std::fs::remove_file(&replaced) {
                    tracing::warn!(
                        kind = %entry.kind,
                        path = %replaced.display(),
                        error = %e,
                        "Failed to remove replaced export"
                    );
                }
            }
        }
    }
}

impl Drop for PublishedExports {
    fn drop(&mut self) {
        for entry in self.entries.drain(..).rev() {
            match &entry.replaced {
                Some(replaced) => restore(entry.kind, replaced, &entry.target),
                None => {
                    if let Err(e) = std::fs::remove_file(&entry.target) {
                        tracing::warn!(
                            kind = %entry.kind,
                            path = %entry.target.display(),
                            error = %e,
                            "Failed to withdraw unrecorded export"
                        );
                    }
                }
            }
            tracing::debug!(kind = %entry.kind, path = %entry.target.display(), "Rolled back export");
        }
    }
}

fn restore(kind: OutputKind, replaced: &Path, target: &Path) {
    if let Err(e) = std::fs::rename(replaced, target) {
        tracing::warn!(
            %kind,
            path = %target.display(),
            error = %e,
            "Failed to restore replaced export"
        );
    }
}

fn export_failure(kind: OutputKind, path: &Path, error: std::io::Error) -> FieldsenseError {
    FieldsenseError::ExportFailure {
        output: kind.to_string(),
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
