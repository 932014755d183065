//! Run reports and the append-only run history.
//!
//! Each run appends one JSON line to `.sapdoc/history.jsonl`; `--json` prints
//! the same report on stdout.
use crate::documents::{DocumentKind, OutputFormat};
use crate::error::StageError;
use crate::paths::OutputPaths;
use crate::record::Record;
use crate::util::now_epoch_ms;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const RUN_REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Written,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub ts: u64,
    pub document: DocumentKind,
    pub status: RunStatus,
    pub format: OutputFormat,
    pub backend: String,
    pub self_review: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

/// Run settings echoed into the report.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub format: OutputFormat,
    pub backend: String,
    pub self_review: bool,
}

impl RunReport {
    pub fn from_record(record: &Record, settings: &RunSettings, duration_ms: u64) -> Self {
        let status = if record.failed() {
            RunStatus::Failed
        } else {
            RunStatus::Written
        };
        Self {
            schema_version: RUN_REPORT_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            document: record.kind,
            status,
            format: settings.format,
            backend: settings.backend.clone(),
            self_review: settings.self_review,
            duration_ms,
            artifact: record.artifact.clone(),
            error: record.error.clone(),
        }
    }
}

/// Append a report to the history as JSONL.
pub fn append_history(paths: &OutputPaths, report: &RunReport) -> Result<()> {
    let path = paths.history_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create state directory")?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;
    let line = serde_json::to_string(report).context("serialize run report")?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RunSettings {
        RunSettings {
            format: OutputFormat::Markdown,
            backend: "scripted".to_string(),
            self_review: true,
        }
    }

    #[test]
    fn failed_record_reports_stage_and_message() {
        let mut record = Record::new(DocumentKind::CodeDoc);
        record.error = Some(StageError::Validation("missing sections".to_string()));
        let report = RunReport::from_record(&record, &settings(), 12);
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"]["stage"], "validation");
        assert_eq!(value["error"]["message"], "missing sections");
        assert!(value.get("artifact").is_none());
    }

    #[test]
    fn history_appends_one_line_per_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(temp.path().to_path_buf());
        let mut record = Record::new(DocumentKind::Brd);
        record.artifact = Some(temp.path().join("BRD_x_1.md"));
        let report = RunReport::from_record(&record, &settings(), 5);

        append_history(&paths, &report).expect("first");
        append_history(&paths, &report).expect("second");
        let text = fs::read_to_string(paths.history_path()).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(value["status"], "written");
        assert_eq!(value["document"], "brd");
    }
}
