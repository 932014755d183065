//! Command backend: prompt on stdin, completion on stdout.
//!
//! Works with any tool that reads text and prints text (`llm`, `ollama run`,
//! wrapper scripts that add caching or auth).
use super::{LmError, LmRequest, TextGenerator};
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

const STDERR_PREVIEW_BYTES: usize = 400;

#[derive(Debug)]
pub struct CommandGenerator {
    program: PathBuf,
    args: Vec<String>,
    display: String,
}

impl CommandGenerator {
    /// Parse `command` with shell quoting rules and resolve the program on `PATH`.
    pub fn new(command: &str) -> Result<Self> {
        let words =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        let Some((program, args)) = words.split_first() else {
            return Err(anyhow!("LM command is empty"));
        };
        let resolved = which::which(program)
            .with_context(|| format!("LM command program {program:?} not found"))?;
        Ok(Self {
            program: resolved,
            args: args.to_vec(),
            display: command.trim().to_string(),
        })
    }
}

impl TextGenerator for CommandGenerator {
    fn generate(&self, request: &LmRequest) -> Result<String, LmError> {
        let prompt = request.flattened();
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                LmError::Fatal(format!("spawn LM command {}: {err}", self.program.display()))
            })?;

        // A large prompt can fill the pipe before the child starts reading its
        // output, so the write runs beside the wait.
        let writer = child.stdin.take().map(|mut stdin| {
            let prompt = prompt.clone();
            std::thread::spawn(move || stdin.write_all(prompt.as_bytes()))
        });

        let output = child
            .wait_with_output()
            .map_err(|err| LmError::Transient(format!("wait for LM command: {err}")))?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, "LM command closed stdin early");
                }
                Err(_) => {
                    return Err(LmError::Fatal("stdin writer thread panicked".to_string()));
                }
            }
        }

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "LM command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LmError::Transient(format!(
                "LM command failed with {}: {}",
                output.status,
                crate::util::truncate_string(stderr.trim(), STDERR_PREVIEW_BYTES)
            )));
        }
        let text = String::from_utf8(output.stdout)
            .map_err(|_| LmError::Fatal("LM command output is not valid UTF-8".to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LmError::Transient("LM command returned no output".to_string()));
        }
        Ok(text.to_string())
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.display)
    }
}
