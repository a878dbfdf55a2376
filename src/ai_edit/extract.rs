//! JSON extraction from free-form model output
//!
//! Models wrap JSON in code fences, prepend prose, or both. Fenced content wins when
//! present; otherwise the first balanced `{...}` object is taken by depth counting
//! that ignores braces inside string literals.

use std::sync::OnceLock;

use regex::Regex;

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
    })
}

/// Contents of the first fenced code block, if any
pub fn strip_code_fence(text: &str) -> Option<&str> {
    fence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// First balanced brace-delimited object in `text`
pub fn extract_first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Best candidate JSON object text from a model response
pub fn extract_json(text: &str) -> Option<&str> {
    let body = strip_code_fence(text).unwrap_or(text);
    extract_first_object(body).or_else(|| extract_first_object(text))
}

/// First `max_chars` characters of `text`, for error previews
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nanything else?";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_prose_then_object() {
        let text = "Sure! {\"patches\": [{\"path\": \"/title\"}]} hope that helps {\"x\":2}";
        assert_eq!(
            extract_json(text),
            Some("{\"patches\": [{\"path\": \"/title\"}]}")
        );
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"explanation": "use } and { freely \" ok", "n": {"m": 1}} tail"#;
        assert_eq!(
            extract_first_object(text),
            Some(r#"{"explanation": "use } and { freely \" ok", "n": {"m": 1}}"#)
        );
    }

    #[test]
    fn test_unbalanced_returns_none() {
        assert_eq!(extract_json("{\"a\": {\"b\": 1}"), None);
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ab", 3), "ab");
    }
}
