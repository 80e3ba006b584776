//! UTF-8-safe string helpers
//!
//! Titles on the target site are mostly CJK text, so byte slicing is never
//! safe. Everything here works on character boundaries.

/// Truncate to at most `max_chars` characters without splitting a code point.
///
/// ```
/// # use notescout::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("春季穿搭分享", 2), "春季");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Short form of a title or body for log lines and placeholders.
#[must_use]
pub fn preview(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    let cut = safe_truncate_chars(trimmed, max_chars);
    if cut.len() < trimmed.len() {
        format!("{cut}…")
    } else {
        cut.to_string()
    }
}

/// Collapse runs of whitespace (including newlines from `innerText`) to one space.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(safe_truncate_chars("小红书爆款笔记", 3), "小红书");
        assert_eq!(safe_truncate_chars("", 3), "");
    }

    #[test]
    fn preview_appends_ellipsis_only_when_cut() {
        assert_eq!(preview("  短标题  ", 10), "短标题");
        assert_eq!(preview("一二三四五", 2), "一二…");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(normalize_whitespace(" 1.2万\n 点赞 "), "1.2万 点赞");
    }
}
