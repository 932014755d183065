//! ABAP code documentation: uploaded source, prompts, and the section check.
use crate::lm::LmRequest;
use crate::templates;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const REQUIRED_SECTIONS: [&str; 3] = [
    "Technical Documentation",
    "Code Review Comments",
    "Optimization Suggestions",
];

/// Accepted upload extensions, compared case-insensitively.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["txt", "abap"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeInput {
    pub file_name: String,
    pub source: String,
}

impl CodeInput {
    /// Program name derived from the upload's file stem.
    pub fn program_name(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
            .to_string()
    }
}

/// Load an uploaded ABAP source file.
pub fn load(path: &Path) -> Result<CodeInput> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(anyhow!(
            "{} is not a .txt or .abap upload",
            path.display()
        ));
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let source = String::from_utf8(bytes)
        .map_err(|_| anyhow!("{} is not valid UTF-8", path.display()))?;
    if source.trim().is_empty() {
        return Err(anyhow!("{} contains no ABAP code", path.display()));
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload.txt")
        .to_string();
    Ok(CodeInput { file_name, source })
}

fn required_sections_list() -> String {
    REQUIRED_SECTIONS
        .iter()
        .map(|section| format!("\"{section}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn generation_request(input: &CodeInput) -> LmRequest {
    let required = required_sections_list();
    LmRequest::user(templates::fill(
        templates::CODE_DOC_GENERATE_MD,
        &[
            ("required_sections", &required),
            ("file_name", &input.file_name),
            ("code", &input.source),
        ],
    ))
}

pub fn review_request(input: &CodeInput, draft: &str) -> LmRequest {
    let required = required_sections_list();
    LmRequest::user(templates::fill(
        templates::CODE_DOC_REVIEW_MD,
        &[
            ("required_sections", &required),
            ("file_name", &input.file_name),
            ("code", &input.source),
            ("draft", draft),
        ],
    ))
}

/// Require every section title to appear somewhere in the text.
pub fn check(text: &str) -> Result<(), Vec<String>> {
    let missing: Vec<&str> = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|section| !text.contains(section))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(vec![format!(
        "documentation is missing required sections: {}",
        missing.join(", ")
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "REPORT zsales.\nSELECT * FROM vbak INTO TABLE @DATA(lt_vbak).";

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write upload");
        path
    }

    #[test]
    fn load_accepts_txt_and_abap_uploads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let input = load(&write(temp.path(), "ZSALES.txt", REPORT)).expect("txt");
        assert_eq!(input.file_name, "ZSALES.txt");
        assert_eq!(input.program_name(), "ZSALES");
        assert_eq!(input.source, REPORT);
        assert!(load(&write(temp.path(), "zsales.ABAP", REPORT)).is_ok());
    }

    #[test]
    fn load_rejects_other_extensions_and_blank_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load(&write(temp.path(), "zsales.pdf", REPORT)).expect_err("pdf");
        assert!(err.to_string().contains("not a .txt or .abap upload"));
        let err = load(&write(temp.path(), "empty.txt", " \n")).expect_err("blank");
        assert!(err.to_string().contains("contains no ABAP code"));
    }

    #[test]
    fn prompts_embed_the_source_verbatim() {
        let input = CodeInput {
            file_name: "ZSALES.txt".to_string(),
            source: "WRITE: '{draft}'.".to_string(),
        };
        let generate = generation_request(&input);
        assert!(generate.user.contains("ABAP Code (ZSALES.txt):\nWRITE: '{draft}'."));
        assert!(generate.user.contains("\"Code Review Comments\""));

        let review = review_request(&input, "## Technical Documentation");
        assert!(review.user.contains("WRITE: '{draft}'."));
        assert!(review.user.contains("Draft Documentation:\n## Technical Documentation"));
    }

    #[test]
    fn check_requires_all_sections() {
        let complete = "## Technical Documentation\n...\n## Code Review Comments\n...\n## Optimization Suggestions\n...";
        assert_eq!(check(complete), Ok(()));
        assert_eq!(check(complete), Ok(()));

        let problems = check("## Technical Documentation\n## Code Review Comments").expect_err("one missing");
        assert_eq!(
            problems,
            vec!["documentation is missing required sections: Optimization Suggestions".to_string()]
        );
    }
}
