//! Typed paths into an output directory.
//!
//! Artifacts land directly in the output directory; bookkeeping (call log,
//! captured prompts, run history) lives under a hidden `.sapdoc/` subdirectory.
use std::path::{Path, PathBuf};

/// Convenience wrapper for locating run artifacts and bookkeeping files.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
}

impl OutputPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Return the output directory artifacts are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `.sapdoc/` bookkeeping directory.
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".sapdoc")
    }

    /// Return the `.sapdoc/lm_log.jsonl` path.
    pub fn lm_log_path(&self) -> PathBuf {
        self.state_dir().join("lm_log.jsonl")
    }

    /// Return the `.sapdoc/lm_log/` directory for full prompt/response capture.
    pub fn lm_log_dir(&self) -> PathBuf {
        self.state_dir().join("lm_log")
    }

    /// Return the `.sapdoc/history.jsonl` path.
    pub fn history_path(&self) -> PathBuf {
        self.state_dir().join("history.jsonl")
    }
}
