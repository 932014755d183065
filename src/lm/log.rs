//! Model call logging.
//!
//! Every call appends one line to `.sapdoc/lm_log.jsonl` in the output
//! directory:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"call":1,"document":"brd","kind":"generate","attempts":1,...}
//! {"schema_version":1,"ts":1707900004200,"call":2,"document":"brd","kind":"self_review","attempts":2,...}
//! ```
//!
//! With verbose capture enabled, full prompts and responses are stored in:
//! - `.sapdoc/lm_log/call_NNN_<kind>_prompt.txt`
//! - `.sapdoc/lm_log/call_NNN_<kind>_response.txt`
//!
//! Log writes never fail a run; problems are reported as warnings.
use super::PREVIEW_BYTES;
use crate::documents::DocumentKind;
use crate::paths::OutputPaths;
use crate::util::{now_epoch_ms, truncate_string};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Instant;

pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

/// Which pipeline step issued the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Generate,
    SelfReview,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::SelfReview => write!(f, "self_review"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was finished.
    pub ts: u64,

    /// Call number within the output directory (1-indexed, monotonically increasing).
    pub call: u32,

    pub document: DocumentKind,
    pub kind: CallKind,

    /// Attempts made, including retries.
    pub attempts: u32,

    pub duration_ms: u64,
    pub outcome: CallOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for log entries; measures duration from construction.
pub struct LmLogBuilder {
    start: Instant,
    call: u32,
    document: DocumentKind,
    kind: CallKind,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    pub fn new(call: u32, document: DocumentKind, kind: CallKind) -> Self {
        Self {
            start: Instant::now(),
            call,
            document,
            kind,
            prompt_preview: None,
        }
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        let mut preview = truncate_string(prompt, PREVIEW_BYTES);
        if preview.len() < prompt.len() {
            preview.push_str("...");
        }
        self.prompt_preview = Some(preview);
        self
    }

    pub fn success(self, attempts: u32) -> LmLogEntry {
        self.build(CallOutcome::Success, attempts, None)
    }

    pub fn failed(self, attempts: u32, error: impl Into<String>) -> LmLogEntry {
        self.build(CallOutcome::Failed, attempts, Some(error.into()))
    }

    fn build(self, outcome: CallOutcome, attempts: u32, error: Option<String>) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            call: self.call,
            document: self.document,
            kind: self.kind,
            attempts,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Call log bound to an output directory.
pub struct LmLog {
    paths: Option<OutputPaths>,
    store_content: bool,
    last_call: Cell<u32>,
}

impl LmLog {
    /// Log that only numbers calls and writes nothing.
    pub fn disabled() -> Self {
        Self {
            paths: None,
            store_content: false,
            last_call: Cell::new(0),
        }
    }

    /// Open the log under `paths`, continuing the call numbering already on disk.
    pub fn open(paths: OutputPaths, store_content: bool) -> Self {
        let last_call = match load_lm_log(&paths.lm_log_path()) {
            Ok(entries) => entries.iter().map(|entry| entry.call).max().unwrap_or(0),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "ignore unreadable lm_log");
                0
            }
        };
        Self {
            paths: Some(paths),
            store_content,
            last_call: Cell::new(last_call),
        }
    }

    pub fn next_call(&self) -> u32 {
        let call = self.last_call.get() + 1;
        self.last_call.set(call);
        call
    }

    pub fn record(&self, entry: &LmLogEntry) {
        let Some(paths) = &self.paths else {
            return;
        };
        if let Err(err) = append_lm_log(&paths.lm_log_path(), entry) {
            tracing::warn!(error = %format!("{err:#}"), "lm_log append failed");
        }
    }

    pub fn store_content(&self, call: u32, kind: CallKind, prompt: &str, response: &str) {
        let Some(paths) = &self.paths else {
            return;
        };
        if !self.store_content {
            return;
        }
        if let Err(err) = store_lm_content(&paths.lm_log_dir(), call, kind, prompt, response) {
            tracing::warn!(error = %format!("{err:#}"), "lm_log content capture failed");
        }
    }
}

/// Append an entry as one JSON line.
pub fn append_lm_log(log_path: &Path, entry: &LmLogEntry) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create state directory for lm_log")?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open lm_log for append: {}", log_path.display()))?;
    let line = serde_json::to_string(entry).context("serialize lm_log entry")?;
    writeln!(file, "{}", line).context("write lm_log entry")?;
    Ok(())
}

/// Store the full prompt and response for one call.
pub fn store_lm_content(
    log_dir: &Path,
    call: u32,
    kind: CallKind,
    prompt: &str,
    response: &str,
) -> Result<()> {
    fs::create_dir_all(log_dir).context("create lm_log directory")?;
    let prompt_path = log_dir.join(format!("call_{:03}_{}_prompt.txt", call, kind));
    let response_path = log_dir.join(format!("call_{:03}_{}_response.txt", call, kind));
    fs::write(&prompt_path, prompt)
        .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
    fs::write(&response_path, response)
        .with_context(|| format!("write response: {}", response_path.display()))?;
    Ok(())
}

/// Load every parseable entry; corrupt lines are skipped with a warning.
pub fn load_lm_log(log_path: &Path) -> Result<Vec<LmLogEntry>> {
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let file =
        File::open(log_path).with_context(|| format!("open lm_log: {}", log_path.display()))?;
    let mut entries = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of lm_log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LmLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "skip corrupt lm_log entry");
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_load_continue_numbering() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(temp.path().to_path_buf());

        let log = LmLog::open(paths.clone(), false);
        let first = log.next_call();
        log.record(&LmLogBuilder::new(first, DocumentKind::Brd, CallKind::Generate).success(1));
        let second = log.next_call();
        log.record(
            &LmLogBuilder::new(second, DocumentKind::Brd, CallKind::SelfReview)
                .failed(3, "HTTP 503"),
        );

        let entries = load_lm_log(&paths.lm_log_path()).expect("load");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].call, 1);
        assert_eq!(entries[1].kind, CallKind::SelfReview);
        assert_eq!(entries[1].outcome, CallOutcome::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("HTTP 503"));

        let reopened = LmLog::open(paths, false);
        assert_eq!(reopened.next_call(), 3);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("lm_log.jsonl");
        let entry = LmLogBuilder::new(7, DocumentKind::CodeDoc, CallKind::Generate).success(1);
        append_lm_log(&path, &entry).expect("append");
        let mut file = OpenOptions::new().append(true).open(&path).expect("open");
        writeln!(file, "{{not json").expect("write");

        let entries = load_lm_log(&path).expect("load");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].call, 7);
    }

    #[test]
    fn content_is_stored_only_when_enabled() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = OutputPaths::new(temp.path().to_path_buf());

        LmLog::open(paths.clone(), false).store_content(1, CallKind::Generate, "p", "r");
        assert!(!paths.lm_log_dir().exists());

        LmLog::open(paths.clone(), true).store_content(2, CallKind::SelfReview, "p", "r");
        let prompt = paths.lm_log_dir().join("call_002_self_review_prompt.txt");
        let response = paths.lm_log_dir().join("call_002_self_review_response.txt");
        assert_eq!(std::fs::read_to_string(prompt).expect("prompt"), "p");
        assert_eq!(std::fs::read_to_string(response).expect("response"), "r");
    }

    #[test]
    fn long_prompts_are_previewed() {
        let prompt = "x".repeat(PREVIEW_BYTES + 10);
        let entry = LmLogBuilder::new(1, DocumentKind::UserStories, CallKind::Generate)
            .with_prompt_preview(&prompt)
            .success(1);
        let preview = entry.prompt_preview.expect("preview");
        assert_eq!(preview.len(), PREVIEW_BYTES + 3);
        assert!(preview.ends_with("..."));
    }
}
