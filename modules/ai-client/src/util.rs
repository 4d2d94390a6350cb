/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    let end = (0..=max_bytes.min(s.len()))
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..end]
}

/// Body of the first markdown code fence in `response`, or the trimmed
/// response when there is none. The fence's language tag and any chatter
/// before the opening fence are dropped; an unclosed fence runs to the end.
pub fn strip_code_blocks(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[open + 3..];
    let body_start = after_fence.find('\n').map_or(after_fence.len(), |i| i + 1);
    // `{...}` right after the fence with no newline: no language tag to skip.
    let body = if after_fence.trim_start().starts_with('{') {
        after_fence
    } else {
        &after_fence[body_start..]
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        let text = "广州南部 高温";
        let truncated = truncate_to_char_boundary(text, 7);
        assert_eq!(truncated, "广州");
        assert_eq!(truncate_to_char_boundary("32.5", 100), "32.5");
        assert_eq!(truncate_to_char_boundary("广州", 2), "");
    }

    #[test]
    fn strips_tagged_and_bare_fences() {
        assert_eq!(strip_code_blocks("```json\n{\"std_geo\": []}\n```"), "{\"std_geo\": []}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_code_blocks("  {}  "), "{}");
    }

    #[test]
    fn drops_text_around_the_fence() {
        let response = "Here is the result:\n```JSON\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(strip_code_blocks(response), "{\"a\": 1}");
        assert_eq!(strip_code_blocks("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
