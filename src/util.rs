use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

/// Truncate to at most `max_bytes` without splitting a character.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Reduce free text to a filename-safe label (`Oracle → Redshift` -> `Oracle_Redshift`).
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch);
        } else {
            pending_sep = true;
        }
        if slug.len() >= max_len {
            break;
        }
    }
    slug.truncate(max_len);
    slug.trim_end_matches('_').to_string()
}
