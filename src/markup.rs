//! Small HTML text helpers shared by the partial and blog renderers.

use std::borrow::Cow;

/// Escape HTML special characters for text and double-quoted attributes.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[must_use]
pub fn html_escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#039;"),
            _ => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Append `class` to a space separated class list unless already present.
#[must_use]
pub fn add_class(list: &str, class: &str) -> String {
    if list.split_whitespace().any(|c| c == class) {
        return list.trim().to_owned();
    }
    let trimmed = list.trim();
    if trimmed.is_empty() { class.to_owned() } else { format!("{trimmed} {class}") }
}

/// Remove every occurrence of `class` from a space separated class list.
#[must_use]
pub fn remove_class(list: &str, class: &str) -> String {
    list.split_whitespace()
        .filter(|c| *c != class)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Leading-integer parse: `"2"`, `" 2"`, `"2 levels"` are all 2; anything
/// negative or without leading digits is 0.
#[must_use]
pub fn leading_uint(raw: &str) -> usize {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('-') {
        return 0;
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = unsigned.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<usize>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_plain_is_borrowed() {
        assert!(matches!(html_escape("hello world"), Cow::Borrowed("hello world")));
    }

    #[test]
    fn escape_special_chars() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
        assert_eq!(html_escape("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(html_escape("it's"), "it&#039;s");
    }

    #[test]
    fn add_class_appends_once() {
        assert_eq!(add_class("grid gap-4", "projects-preview-grid"), "grid gap-4 projects-preview-grid");
        assert_eq!(add_class("grid projects-preview-grid", "projects-preview-grid"), "grid projects-preview-grid");
        assert_eq!(add_class("  ", "active"), "active");
    }

    #[test]
    fn remove_class_drops_all_matches() {
        assert_eq!(remove_class("hamburger active", "active"), "hamburger");
        assert_eq!(remove_class("active", "active"), "");
        assert_eq!(remove_class("a  b", "c"), "a b");
    }

    #[test]
    fn leading_uint_semantics() {
        assert_eq!(leading_uint("1px"), 1);
        assert_eq!(leading_uint("  3"), 3);
        assert_eq!(leading_uint("+2"), 2);
        assert_eq!(leading_uint("-1"), 0);
        assert_eq!(leading_uint("deep"), 0);
        assert_eq!(leading_uint(""), 0);
    }
}
