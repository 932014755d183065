//! The three document kinds and their per-kind behavior.
//!
//! Each kind owns its input type, prompt templates, structural check, and
//! renderers. The stages stay kind-agnostic by dispatching through the
//! functions in this module.
pub mod brd;
pub mod code_doc;
pub mod user_stories;

use crate::lm::LmRequest;
use crate::markdown;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Brd,
    CodeDoc,
    UserStories,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Brd => "brd",
            DocumentKind::CodeDoc => "code_doc",
            DocumentKind::UserStories => "user_stories",
        }
    }

    /// Human-readable noun used in messages.
    pub fn noun(&self) -> &'static str {
        match self {
            DocumentKind::Brd => "BRD",
            DocumentKind::CodeDoc => "ABAP documentation",
            DocumentKind::UserStories => "user stories",
        }
    }

    /// Filename prefix for written artifacts.
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Brd => "BRD",
            DocumentKind::CodeDoc => "ABAP_Documentation",
            DocumentKind::UserStories => "User_Stories",
        }
    }

    pub fn supports_format(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Markdown | OutputFormat::Text => true,
            OutputFormat::Json => matches!(self, DocumentKind::UserStories),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Markdown,
    Text,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

/// Input collected by the input stage, one variant per document kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentInput {
    Brd(brd::BrdInput),
    CodeDoc(code_doc::CodeInput),
    UserStories(user_stories::BrdDetails),
}

impl DocumentInput {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentInput::Brd(_) => DocumentKind::Brd,
            DocumentInput::CodeDoc(_) => DocumentKind::CodeDoc,
            DocumentInput::UserStories(_) => DocumentKind::UserStories,
        }
    }

    /// Free-text label folded into the artifact filename.
    pub fn artifact_label(&self) -> String {
        match self {
            DocumentInput::Brd(input) => input.project_name.clone(),
            DocumentInput::CodeDoc(input) => input.program_name(),
            DocumentInput::UserStories(details) => details.label(),
        }
    }
}

/// Parse a structured input file: TOML for `.toml`, JSON otherwise.
pub fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&text).with_context(|| format!("parse {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }
}

/// First model call: produce a draft from the input.
pub fn generation_request(input: &DocumentInput) -> LmRequest {
    match input {
        DocumentInput::Brd(input) => brd::generation_request(input),
        DocumentInput::CodeDoc(input) => code_doc::generation_request(input),
        DocumentInput::UserStories(details) => user_stories::generation_request(details),
    }
}

/// Second model call: self-review the draft against the checklist.
pub fn review_request(input: &DocumentInput, draft: &str) -> LmRequest {
    match input {
        DocumentInput::Brd(input) => brd::review_request(input, draft),
        DocumentInput::CodeDoc(input) => code_doc::review_request(input, draft),
        DocumentInput::UserStories(_) => user_stories::review_request(draft),
    }
}

/// Structural check on model output; `Err` lists every problem found.
///
/// The check is a pure function of the text, so re-running it on output that
/// already passed yields a pass again.
pub fn check_structure(kind: DocumentKind, text: &str) -> Result<(), Vec<String>> {
    if text.trim().is_empty() {
        return Err(vec![format!("{} is empty", kind.noun())]);
    }
    match kind {
        DocumentKind::Brd => brd::check(text),
        DocumentKind::CodeDoc => code_doc::check(text),
        DocumentKind::UserStories => user_stories::check(text),
    }
}

/// Render validated text into the artifact body for `format`.
pub fn render(kind: DocumentKind, text: &str, format: OutputFormat) -> Result<String> {
    if !kind.supports_format(format) {
        return Err(anyhow!(
            "{} cannot be written as {}",
            kind.noun(),
            format.extension()
        ));
    }
    match (kind, format) {
        (DocumentKind::UserStories, OutputFormat::Markdown) => {
            Ok(user_stories::render_markdown(&user_stories::parse_stories(text)))
        }
        (DocumentKind::UserStories, OutputFormat::Json) => {
            user_stories::render_json(&user_stories::parse_stories(text))
        }
        (DocumentKind::UserStories, OutputFormat::Text) => {
            Ok(user_stories::render_text(&user_stories::parse_stories(text)))
        }
        (_, OutputFormat::Text) => Ok(with_trailing_newline(markdown::to_plain_text(text))),
        (_, _) => Ok(with_trailing_newline(text.trim().to_string())),
    }
}

fn with_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_only_for_user_stories() {
        assert!(DocumentKind::UserStories.supports_format(OutputFormat::Json));
        assert!(!DocumentKind::Brd.supports_format(OutputFormat::Json));
        let err = render(DocumentKind::CodeDoc, "x", OutputFormat::Json).expect_err("json");
        assert!(err.to_string().contains("cannot be written as json"));
    }

    #[test]
    fn empty_text_fails_every_check() {
        for kind in [
            DocumentKind::Brd,
            DocumentKind::CodeDoc,
            DocumentKind::UserStories,
        ] {
            assert!(check_structure(kind, "  \n").is_err(), "{kind}");
        }
    }

    #[test]
    fn text_render_strips_markdown() {
        let rendered = render(
            DocumentKind::CodeDoc,
            "## Technical Documentation\n**Purpose:** report",
            OutputFormat::Text,
        )
        .expect("render");
        assert_eq!(rendered, "Technical Documentation\nPurpose: report\n");
    }
}
