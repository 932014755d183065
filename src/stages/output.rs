use crate::documents::{self, OutputFormat};
use crate::error::StageError;
use crate::paths::OutputPaths;
use crate::pipeline::Stage;
use crate::record::Record;
use crate::util::{now_epoch_ms, slugify};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Longest label kept in an artifact filename.
const MAX_LABEL_LEN: usize = 64;

/// Render the validated text and write it as the run's artifact.
pub struct OutputStage {
    paths: OutputPaths,
    format: OutputFormat,
    clock: fn() -> u64,
}

impl OutputStage {
    pub fn new(paths: OutputPaths, format: OutputFormat) -> Self {
        Self {
            paths,
            format,
            clock: now_epoch_ms,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// `<PREFIX>_<label>_<epoch-ms>.<ext>`, suffixed when the name is taken.
    fn artifact_path(&self, record: &Record) -> PathBuf {
        let label = record
            .input
            .as_ref()
            .map(|input| slugify(&input.artifact_label(), MAX_LABEL_LEN))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| "document".to_string());
        let stem = format!(
            "{}_{}_{}",
            record.kind.artifact_prefix(),
            label,
            (self.clock)()
        );
        let ext = self.format.extension();
        let dir = self.paths.root();
        let mut path = dir.join(format!("{stem}.{ext}"));
        let mut n = 2;
        while path.exists() {
            path = dir.join(format!("{stem}_{n}.{ext}"));
            n += 1;
        }
        path
    }
}

impl Stage for OutputStage {
    fn name(&self) -> &'static str {
        "output"
    }

    fn run(&mut self, record: &mut Record) -> Result<(), StageError> {
        let noun = record.kind.noun();
        if record.validated.trim().is_empty() {
            return Err(StageError::Output(format!("no validated {noun} to write")));
        }
        let body = documents::render(record.kind, &record.validated, self.format)
            .map_err(|err| StageError::Output(format!("{err:#}")))?;
        if body.trim().is_empty() {
            return Err(StageError::Output(format!("rendered {noun} is empty")));
        }
        let path = self.artifact_path(record);
        write_atomic(&path, body.as_bytes())
            .map_err(|err| StageError::Output(format!("{err:#}")))?;
        tracing::info!(path = %path.display(), bytes = body.len(), "artifact written");
        record.artifact = Some(path);
        Ok(())
    }
}

/// Write through a hidden temp file in the same directory, then rename.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("artifact");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents).with_context(|| format!("write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("publish {}", dest.display()));
    }
    Ok(())
}
