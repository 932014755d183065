//! User stories: BRD details in, a JSON list of stories out.
//!
//! The model is asked for a JSON array. Its output is recovered by stripping a
//! Markdown code fence; anything that still fails to parse is treated as an
//! empty story list, which the structural check then rejects.
use crate::lm::LmRequest;
use crate::markdown;
use crate::templates;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form BRD content keyed by section (`purpose`, `project_summary`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrdDetails(pub BTreeMap<String, String>);

impl BrdDetails {
    /// Drop blank entries; fails when nothing is left.
    pub fn validated(self) -> Result<Self> {
        let details: BTreeMap<String, String> = self
            .0
            .into_iter()
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .collect();
        if details.is_empty() {
            return Err(anyhow!("BRD details contain no non-empty fields"));
        }
        Ok(Self(details))
    }

    pub fn label(&self) -> String {
        self.0
            .get("project_name")
            .cloned()
            .unwrap_or_else(|| "from_brd".to_string())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).context("serialize BRD details")
    }
}

/// A field the model may emit either as one string or as a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl Default for TextOrList {
    fn default() -> Self {
        TextOrList::Text(String::new())
    }
}

impl TextOrList {
    /// Single-line form; list items joined with `; `.
    pub fn joined(&self) -> String {
        match self {
            TextOrList::Text(text) => text.trim().to_string(),
            TextOrList::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.joined().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStory {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: TextOrList,
    #[serde(default)]
    pub definition_of_done: TextOrList,
    #[serde(default)]
    pub definition_of_ready: TextOrList,
}

impl UserStory {
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.acceptance_criteria.is_blank() {
            missing.push("acceptance_criteria");
        }
        if self.definition_of_done.is_blank() {
            missing.push("definition_of_done");
        }
        if self.definition_of_ready.is_blank() {
            missing.push("definition_of_ready");
        }
        missing
    }
}

pub fn generation_request(details: &BrdDetails) -> LmRequest {
    let content = details
        .to_json()
        .unwrap_or_else(|_| format!("{:?}", details.0));
    LmRequest::with_system(
        templates::USER_STORIES_SYSTEM_MD,
        format!("BRD Content: {content}"),
    )
}

pub fn review_request(draft: &str) -> LmRequest {
    LmRequest::with_system(
        templates::USER_STORIES_REVIEW_SYSTEM_MD,
        format!("User Stories: {draft}"),
    )
}

/// Parse model output into stories; malformed output yields an empty list.
pub fn parse_stories(text: &str) -> Vec<UserStory> {
    if let Ok(stories) = serde_json::from_str::<Vec<UserStory>>(text.trim()) {
        return stories;
    }
    let json = markdown::strip_code_fence(text);
    match serde_json::from_str::<Vec<UserStory>>(json) {
        Ok(stories) => stories,
        Err(err) => {
            tracing::warn!(error = %err, "user stories are not a JSON array; treating as empty");
            Vec::new()
        }
    }
}

/// Require a non-empty list where every story carries all five fields.
pub fn check(text: &str) -> Result<(), Vec<String>> {
    let stories = parse_stories(text);
    if stories.is_empty() {
        return Err(vec!["no user stories could be parsed".to_string()]);
    }
    let problems: Vec<String> = stories
        .iter()
        .enumerate()
        .filter_map(|(idx, story)| {
            let missing = story.missing_fields();
            (!missing.is_empty()).then(|| {
                format!("story {} is missing {}", idx + 1, missing.join(", "))
            })
        })
        .collect();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}

const TABLE_HEADER: [&str; 5] = [
    "Title",
    "Description",
    "Acceptance Criteria",
    "Definition of Done",
    "Definition of Ready",
];

pub fn render_markdown(stories: &[UserStory]) -> String {
    let mut out = String::from("# User Stories\n\n");
    out.push_str(&format!("| {} |\n", TABLE_HEADER.join(" | ")));
    out.push_str(&format!("|{}\n", " --- |".repeat(TABLE_HEADER.len())));
    for story in stories {
        let cells = [
            markdown::table_cell(&story.title),
            markdown::table_cell(&story.description),
            markdown::table_cell(&story.acceptance_criteria.joined()),
            markdown::table_cell(&story.definition_of_done.joined()),
            markdown::table_cell(&story.definition_of_ready.joined()),
        ];
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

pub fn render_text(stories: &[UserStory]) -> String {
    let mut out = String::from("User Stories\n");
    for (idx, story) in stories.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", idx + 1, story.title.trim()));
        out.push_str(&format!("Description: {}\n", story.description.trim()));
        out.push_str(&format!(
            "Acceptance Criteria: {}\n",
            story.acceptance_criteria.joined()
        ));
        out.push_str(&format!(
            "Definition of Done: {}\n",
            story.definition_of_done.joined()
        ));
        out.push_str(&format!(
            "Definition of Ready: {}\n",
            story.definition_of_ready.joined()
        ));
    }
    out
}

pub fn render_json(stories: &[UserStory]) -> Result<String> {
    let mut text = serde_json::to_string_pretty(stories).context("serialize user stories")?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORIES: &str = r#"```json
[
  {
    "title": "Migrate sales tables",
    "description": "As a data engineer I move VBAK | VBAP to Redshift.",
    "acceptance_criteria": ["Row counts match", "No data loss"],
    "definition_of_done": "Reconciled in QA",
    "definition_of_ready": ["Schema documented"]
  }
]
```"#;

    #[test]
    fn parse_strips_fences_and_accepts_lists() {
        let stories = parse_stories(STORIES);
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].acceptance_criteria.joined(), "Row counts match; No data loss");
        assert_eq!(stories[0].definition_of_done.joined(), "Reconciled in QA");
    }

    #[test]
    fn unfenced_json_with_backticks_in_values_parses() {
        let text = r#"[{"title": "Fence docs", "description": "Wrap ABAP in ``` blocks",
            "acceptance_criteria": ["Samples render"], "definition_of_done": "Reviewed",
            "definition_of_ready": "Examples chosen"}]"#;
        let stories = parse_stories(text);
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].description, "Wrap ABAP in ``` blocks");
        assert_eq!(check(text), Ok(()));
    }

    #[test]
    fn malformed_json_is_an_empty_result() {
        assert!(parse_stories("Here are your stories: [{title: nope}]").is_empty());
        assert!(parse_stories(r#"{"title": "not a list"}"#).is_empty());
        assert_eq!(
            check("not json"),
            Err(vec!["no user stories could be parsed".to_string()])
        );
    }

    #[test]
    fn check_passes_complete_stories_repeatedly() {
        assert_eq!(check(STORIES), Ok(()));
        assert_eq!(check(STORIES), Ok(()));
    }

    #[test]
    fn check_names_missing_fields() {
        let text = r#"[{"title": "A", "description": "B", "acceptance_criteria": [],
            "definition_of_done": "D"}]"#;
        assert_eq!(
            check(text),
            Err(vec![
                "story 1 is missing acceptance_criteria, definition_of_ready".to_string()
            ])
        );
    }

    #[test]
    fn markdown_table_escapes_cells() {
        let rendered = render_markdown(&parse_stories(STORIES));
        assert!(rendered.starts_with("# User Stories\n\n| Title | Description |"));
        assert!(rendered.contains("| --- | --- | --- | --- | --- |\n"));
        assert!(rendered.contains("VBAK \\| VBAP"));
        assert!(rendered.contains("| Row counts match; No data loss |"));
    }

    #[test]
    fn details_drop_blank_fields() {
        let mut map = BTreeMap::new();
        map.insert("purpose".to_string(), " Modernize ".to_string());
        map.insert("constraints".to_string(), "  ".to_string());
        let details = BrdDetails(map).validated().expect("one field");
        assert_eq!(details.0.len(), 1);
        assert_eq!(details.0["purpose"], "Modernize");
        assert_eq!(details.label(), "from_brd");

        assert!(BrdDetails::default().validated().is_err());
    }

    #[test]
    fn generation_request_sends_details_as_json() {
        let mut map = BTreeMap::new();
        map.insert("purpose".to_string(), "Modernize".to_string());
        let request = generation_request(&BrdDetails(map));
        assert!(request
            .system
            .as_deref()
            .is_some_and(|system| system.starts_with("You are an SAP Functional Consultant")));
        assert_eq!(request.user, r#"BRD Content: {"purpose":"Modernize"}"#);
    }
}
