//! Best-effort JSON extraction from model replies.
//!
//! Models asked for JSON frequently wrap it in prose or Markdown
//! fences.  [`first_json_object`] scans for the first balanced `{...}`
//! span, tracking string literals and escapes so braces inside strings
//! don't confuse the balance count.

/// Return the first balanced top-level JSON object in `text`, if any.
///
/// The returned slice still has to survive `serde_json` parsing; this
/// only finds the candidate span.  Returns `None` when no opening brace
/// exists or the object is truncated.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_is_returned_whole() {
        let text = r#"{"intent": "casual_chat", "confidence": 0.9}"#;
        assert_eq!(first_json_object(text), Some(text));
    }

    #[test]
    fn object_inside_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n{\"a\": 1}\n```\nLet me know.";
        assert_eq!(first_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn nested_objects_balance() {
        let text = r#"prefix {"a": {"b": {"c": 3}}, "d": 4} suffix"#;
        assert_eq!(first_json_object(text), Some(r#"{"a": {"b": {"c": 3}}, "d": 4}"#));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"a": "}{", "b": "\"}"}"#;
        let found = first_json_object(text).unwrap();
        assert_eq!(found, text);
        // And it actually parses.
        let v: serde_json::Value = serde_json::from_str(found).unwrap();
        assert_eq!(v["a"], "}{");
    }

    #[test]
    fn first_of_multiple_objects_wins() {
        let text = r#"{"first": 1} {"second": 2}"#;
        assert_eq!(first_json_object(text), Some(r#"{"first": 1}"#));
    }

    #[test]
    fn no_braces_returns_none() {
        assert_eq!(first_json_object("just words"), None);
        assert_eq!(first_json_object(""), None);
    }

    #[test]
    fn truncated_object_returns_none() {
        assert_eq!(first_json_object(r#"{"a": {"b": 1}"#), None);
    }
}
