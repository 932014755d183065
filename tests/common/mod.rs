//! Shared test infrastructure for integration tests.
//!
//! Every test runs the built `sapdoc` binary in a fresh temp directory with a
//! private config file, so a user's own config or environment never leaks in.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Retry settings that keep failing runs fast.
const TEST_CONFIG: &str = r#"schema_version = 1

[retry]
max_attempts = 2
initial_delay_ms = 1
multiplier = 2
max_delay_ms = 10
"#;

const SAPDOC_ENV: [&str; 6] = [
    "SAPDOC_CONFIG",
    "SAPDOC_LM_COMMAND",
    "SAPDOC_LM_ENDPOINT",
    "SAPDOC_MODEL",
    "SAPDOC_OUTPUT_DIR",
    "RUST_LOG",
];

pub fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn fixture_dir(name: &str) -> PathBuf {
    manifest_dir().join("tests/fixtures").join(name)
}

/// `--lm` value that answers from `tests/fixtures/<name>/`.
pub fn mock_lm(fixture: &str) -> String {
    let script = manifest_dir().join("tests/mock-lm.sh");
    shell_words::join([
        "sh".to_string(),
        script.display().to_string(),
        fixture_dir(fixture).display().to_string(),
    ])
}

/// A temp working directory plus the result of one `sapdoc` invocation.
pub struct Workspace {
    pub dir: TempDir,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join("config.toml"), TEST_CONFIG).expect("write config");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Run `sapdoc <args> --config <ws>/config.toml --out-dir <ws>/out`.
    pub fn sapdoc(&self, args: &[&str]) -> Output {
        self.sapdoc_with_stdin(args, "")
    }

    pub fn sapdoc_with_stdin(&self, args: &[&str], stdin: &str) -> Output {
        use std::io::Write;
        use std::process::Stdio;

        let mut command = Command::new(env!("CARGO_BIN_EXE_sapdoc"));
        command
            .args(args)
            .arg("--config")
            .arg(self.path().join("config.toml"))
            .arg("--out-dir")
            .arg(self.out_dir())
            .current_dir(self.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for name in SAPDOC_ENV {
            command.env_remove(name);
        }
        let mut child = command.spawn().expect("spawn sapdoc");
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin.as_bytes()).expect("write stdin");
        }
        child.wait_with_output().expect("wait for sapdoc")
    }

    /// Artifacts in the output directory, excluding the `.sapdoc/` state.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.out_dir()) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .map(|entry| entry.expect("dir entry").path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        paths
    }

    /// Parsed `.sapdoc/lm_log.jsonl` entries.
    pub fn lm_log(&self) -> Vec<serde_json::Value> {
        read_jsonl(&self.out_dir().join(".sapdoc/lm_log.jsonl"))
    }

    /// Parsed `.sapdoc/history.jsonl` entries.
    pub fn history(&self) -> Vec<serde_json::Value> {
        read_jsonl(&self.out_dir().join(".sapdoc/history.jsonl"))
    }
}

fn read_jsonl(path: &Path) -> Vec<serde_json::Value> {
    let Ok(text) = fs::read_to_string(path) else {
        return Vec::new();
    };
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("valid JSON line"))
        .collect()
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .expect("utf-8 file name")
}
