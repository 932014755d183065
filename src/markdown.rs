//! Markdown post-processing for model output.
//!
//! These helpers approximate "did the model produce a well-formed document"
//! with plain text inspection; none of them parse Markdown properly.
use regex::Regex;
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern compiles"));
static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").expect("heading pattern compiles"));

/// Extract a JSON payload from model output.
///
/// A leading fence is stripped up to the last closing fence, so backticks
/// inside the payload survive. Text that already opens with `[` or `{` is
/// returned as is. Otherwise the first fenced block after any prose is used,
/// preferring a ```` ```json ```` fence.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let body = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest.strip_prefix("json").unwrap_or(rest),
        };
        let body = match body.rfind("```") {
            Some(end) => &body[..end],
            None => body,
        };
        return body.trim();
    }

    if text.starts_with('[') || text.starts_with('{') {
        return text;
    }

    if let Some(start) = text.find("```json") {
        let start = start + "```json".len();
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
        return text[start..].trim();
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            return text[start..start + end].trim();
        }
        return text[start..].trim();
    }

    text
}

/// Count ATX headings of exactly `level` (`## ` for level 2).
pub fn count_headings(text: &str, level: usize) -> usize {
    text.lines()
        .filter(|line| heading_level(line) == Some(level))
        .count()
}

/// Return the heading texts of exactly `level`, in document order.
pub fn headings(text: &str, level: usize) -> Vec<&str> {
    text.lines()
        .filter(|line| heading_level(line) == Some(level))
        .map(|line| line.trim_start().trim_start_matches('#').trim())
        .collect()
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|ch| *ch == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match trimmed[hashes..].chars().next() {
        Some(ch) if ch.is_whitespace() => Some(hashes),
        _ => None,
    }
}

/// Strip bold markers and heading hashes for plain-text artifacts.
pub fn to_plain_text(text: &str) -> String {
    let text = BOLD.replace_all(text, "$1");
    HEADING_MARKER.replace_all(&text, "").into_owned()
}

/// Escape a value for a single Markdown table cell.
pub fn table_cell(value: &str) -> String {
    value
        .trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
