pub const BRD_GENERATE_MD: &str = include_str!("../prompts/brd_generate.md");
pub const BRD_REVIEW_MD: &str = include_str!("../prompts/brd_review.md");
pub const CODE_DOC_GENERATE_MD: &str = include_str!("../prompts/code_doc_generate.md");
pub const CODE_DOC_REVIEW_MD: &str = include_str!("../prompts/code_doc_review.md");
pub const USER_STORIES_SYSTEM_MD: &str = include_str!("../prompts/user_stories_system.md");
pub const USER_STORIES_REVIEW_SYSTEM_MD: &str =
    include_str!("../prompts/user_stories_review_system.md");

/// Substitute `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// (ABAP sources, drafts) passes through verbatim. Unknown placeholders are
/// left in place.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_known_placeholders_once() {
        let filled = fill(
            "Code:\n{code}\nDraft: {draft} {unknown}",
            &[("code", "DATA(x) = '{draft}'."), ("draft", "ok")],
        );
        assert_eq!(filled, "Code:\nDATA(x) = '{draft}'.\nDraft: ok {unknown}");
    }

    #[test]
    fn prompt_templates_carry_their_placeholders() {
        for (template, placeholder) in [
            (BRD_GENERATE_MD, "{project_name}"),
            (BRD_REVIEW_MD, "{draft}"),
            (CODE_DOC_GENERATE_MD, "{code}"),
            (CODE_DOC_REVIEW_MD, "{draft}"),
        ] {
            assert!(template.contains(placeholder), "missing {placeholder}");
        }
    }
}
