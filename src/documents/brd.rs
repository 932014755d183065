//! Business Requirement Document: input, prompts, and the section check.
use crate::lm::LmRequest;
use crate::markdown;
use crate::templates;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Sections every BRD must contain, in order.
pub const SECTIONS: [&str; 12] = [
    "Purpose",
    "Project Summary",
    "Project Success Criteria",
    "Project Objectives",
    "In-Scope",
    "Out of Scope",
    "Non-Functional Requirements",
    "Assumptions",
    "Dependencies",
    "Constraints",
    "Stakeholder Analysis",
    "Roles and Responsibilities",
];

/// Minimum number of `## ` section headings a BRD must carry.
pub const MIN_SECTION_HEADINGS: usize = SECTIONS.len();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrdInput {
    pub project_name: String,
    pub project_purpose: String,
    pub scope_area: String,
    #[serde(default)]
    pub in_scope_items: Vec<String>,
    #[serde(default)]
    pub out_of_scope_items: Vec<String>,
    #[serde(default)]
    pub stakeholders: Vec<String>,
}

impl BrdInput {
    /// Trim every field and drop blank list items.
    pub fn normalized(mut self) -> Self {
        self.project_name = self.project_name.trim().to_string();
        self.project_purpose = self.project_purpose.trim().to_string();
        self.scope_area = self.scope_area.trim().to_string();
        for list in [
            &mut self.in_scope_items,
            &mut self.out_of_scope_items,
            &mut self.stakeholders,
        ] {
            *list = list
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
        }
        self
    }

    /// Report every required field that is empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (label, value) in [
            ("project_name", &self.project_name),
            ("project_purpose", &self.project_purpose),
            ("scope_area", &self.scope_area),
        ] {
            if value.trim().is_empty() {
                missing.push(label);
            }
        }
        for (label, items) in [
            ("in_scope_items", &self.in_scope_items),
            ("out_of_scope_items", &self.out_of_scope_items),
            ("stakeholders", &self.stakeholders),
        ] {
            if items.iter().all(|item| item.trim().is_empty()) {
                missing.push(label);
            }
        }
        missing
    }

    /// The user-input block embedded in the review prompt.
    pub fn summary(&self) -> String {
        format!(
            "Project Name: {}\nProject Purpose: {}\nScope Area: {}\nIn-Scope Items: {}\nOut of Scope Items: {}\nStakeholders: {}",
            self.project_name,
            self.project_purpose,
            self.scope_area,
            self.in_scope_items.join(", "),
            self.out_of_scope_items.join(", "),
            self.stakeholders.join(", "),
        )
    }
}

fn numbered_sections() -> String {
    SECTIONS
        .iter()
        .enumerate()
        .map(|(idx, section)| format!("{}. {}", idx + 1, section))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn generation_request(input: &BrdInput) -> LmRequest {
    let sections = numbered_sections();
    let section_count = SECTIONS.len().to_string();
    let in_scope = input.in_scope_items.join(", ");
    let out_of_scope = input.out_of_scope_items.join(", ");
    let stakeholders = input.stakeholders.join(", ");
    LmRequest::user(templates::fill(
        templates::BRD_GENERATE_MD,
        &[
            ("sections", &sections),
            ("section_count", &section_count),
            ("project_name", &input.project_name),
            ("project_purpose", &input.project_purpose),
            ("scope_area", &input.scope_area),
            ("in_scope_items", &in_scope),
            ("out_of_scope_items", &out_of_scope),
            ("stakeholders", &stakeholders),
        ],
    ))
}

pub fn review_request(input: &BrdInput, draft: &str) -> LmRequest {
    let sections = numbered_sections();
    let section_count = SECTIONS.len().to_string();
    let user_input = input.summary();
    LmRequest::user(templates::fill(
        templates::BRD_REVIEW_MD,
        &[
            ("sections", &sections),
            ("section_count", &section_count),
            ("user_input", &user_input),
            ("draft", draft),
        ],
    ))
}

/// Require at least one `## ` heading per BRD section.
pub fn check(text: &str) -> Result<(), Vec<String>> {
    let found = markdown::count_headings(text, 2);
    if found >= MIN_SECTION_HEADINGS {
        return Ok(());
    }
    let headings: Vec<String> = markdown::headings(text, 2)
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    let missing: Vec<&str> = SECTIONS
        .iter()
        .copied()
        .filter(|section| {
            let needle = section.to_lowercase();
            !headings.iter().any(|heading| heading.contains(&needle))
        })
        .collect();
    let mut problems = vec![format!(
        "Incomplete BRD returned: expected at least {MIN_SECTION_HEADINGS} section headings, found {found}"
    )];
    if !missing.is_empty() {
        problems.push(format!("missing sections: {}", missing.join(", ")));
    }
    Err(problems)
}

/// Collect a BRD input from a terminal session.
///
/// Text fields take one line each; list fields take one item per line and end
/// at the first empty line (or end of input).
pub fn read_interactive<R: BufRead, W: Write>(reader: &mut R, writer: &mut W) -> Result<BrdInput> {
    writeln!(writer, "Please provide the following details for BRD generation:")?;
    let project_name = prompt_line(reader, writer, "Project Name: ")?;
    let project_purpose = prompt_line(reader, writer, "Project Purpose: ")?;
    let scope_area = prompt_line(reader, writer, "Scope Area: ")?;
    let in_scope_items = prompt_list(reader, writer, "in-scope items")?;
    let out_of_scope_items = prompt_list(reader, writer, "out-of-scope items")?;
    let stakeholders = prompt_list(reader, writer, "stakeholders")?;
    Ok(BrdInput {
        project_name,
        project_purpose,
        scope_area,
        in_scope_items,
        out_of_scope_items,
        stakeholders,
    }
    .normalized())
}

fn prompt_line<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, label: &str) -> Result<String> {
    write!(writer, "{label}")?;
    writer.flush().context("flush prompt")?;
    let mut line = String::new();
    let read = reader.read_line(&mut line).context("read answer")?;
    if read == 0 {
        return Err(anyhow!("input ended before {}", label.trim_end_matches(": ")));
    }
    Ok(line.trim().to_string())
}

fn prompt_list<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    label: &str,
) -> Result<Vec<String>> {
    writeln!(
        writer,
        "Enter {label} (one per line, press Enter twice to finish):"
    )?;
    writer.flush().context("flush prompt")?;
    let mut items = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).context("read item")? == 0 {
            break;
        }
        let item = line.trim();
        if item.is_empty() {
            break;
        }
        items.push(item.to_string());
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> BrdInput {
        BrdInput {
            project_name: "Oracle to Redshift".to_string(),
            project_purpose: "Modernize the data warehouse".to_string(),
            scope_area: "Data platform".to_string(),
            in_scope_items: vec!["Table migration".to_string(), "Stored procedures".to_string()],
            out_of_scope_items: vec!["PII processing".to_string()],
            stakeholders: vec!["IT Department".to_string(), "Dealers".to_string()],
        }
    }

    fn complete_brd() -> String {
        let mut text = String::from("# BRD: Oracle to Redshift\n");
        for section in SECTIONS {
            text.push_str(&format!("## {section}\n- content\n"));
        }
        text
    }

    #[test]
    fn generation_prompt_lists_inputs_and_sections() {
        let request = generation_request(&sample_input());
        assert!(request.system.is_none());
        assert!(request.user.contains("- Project Name: Oracle to Redshift"));
        assert!(request.user.contains("- In-Scope Items: Table migration, Stored procedures"));
        assert!(request.user.contains("12. Roles and Responsibilities"));
        assert!(request.user.contains("Ensure all 12 sections are present"));
    }

    #[test]
    fn review_prompt_embeds_draft_and_user_input() {
        let request = review_request(&sample_input(), "## Purpose\ndraft body");
        assert!(request.user.starts_with("Validate the following Business Requirement Document"));
        assert!(request.user.contains("Stakeholders: IT Department, Dealers"));
        assert!(request.user.contains("## Purpose\ndraft body"));
    }

    #[test]
    fn complete_brd_passes_and_is_idempotent() {
        let text = complete_brd();
        assert_eq!(check(&text), Ok(()));
        assert_eq!(check(&text), Ok(()));
    }

    #[test]
    fn incomplete_brd_reports_missing_sections() {
        let text = "## Purpose\nx\n## Project Summary\ny\n### Assumptions\n";
        let problems = check(text).expect_err("two sections");
        assert!(problems[0].contains("found 2"), "{problems:?}");
        assert!(problems[1].contains("Assumptions"));
        assert!(!problems[1].contains("Project Summary"));
    }

    #[test]
    fn missing_fields_lists_blank_entries() {
        let mut input = sample_input();
        input.scope_area = "  ".to_string();
        input.stakeholders = vec![" ".to_string()];
        assert_eq!(input.missing_fields(), vec!["scope_area", "stakeholders"]);
        assert!(sample_input().missing_fields().is_empty());
    }

    #[test]
    fn interactive_reads_fields_and_lists() {
        let answers = "Oracle to Redshift\nModernize\nData platform\nTables\n  Procs \n\nPII\n\nIT\nDealers\n";
        let mut reader = std::io::Cursor::new(answers.as_bytes());
        let mut transcript = Vec::new();
        let input = read_interactive(&mut reader, &mut transcript).expect("read");
        assert_eq!(input.project_name, "Oracle to Redshift");
        assert_eq!(input.in_scope_items, vec!["Tables", "Procs"]);
        assert_eq!(input.out_of_scope_items, vec!["PII"]);
        assert_eq!(input.stakeholders, vec!["IT", "Dealers"]);
        let transcript = String::from_utf8(transcript).expect("utf8");
        assert!(transcript.contains("Enter stakeholders (one per line"));
    }

    #[test]
    fn interactive_fails_on_truncated_input() {
        let mut reader = std::io::Cursor::new("Only a name\n".as_bytes());
        let err = read_interactive(&mut reader, &mut std::io::sink()).expect_err("eof");
        assert!(err.to_string().contains("Project Purpose"), "{err}");
    }
}
