use serde_json::Value;

const MAX_FIELD_CHARS: usize = 500;
const COLLAPSED_FIELDS: &[&str] = &["content", "new_source", "old_string", "new_string"];

/// Collapses known-bulky fields and any string over `MAX_FIELD_CHARS` into a
/// `"<N chars>"` placeholder before the tool input is persisted. The
/// original content for plan files is re-read from disk where it matters
/// (`tool_input` is never the source of truth for plan content).
pub fn sanitize_tool_input(input: &Value) -> Value {
    match input {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), sanitize_value(key, value));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn sanitize_value(key: &str, value: &Value) -> Value {
    match value {
        Value::String(s) => {
            if COLLAPSED_FIELDS.contains(&key) || s.chars().count() > MAX_FIELD_CHARS {
                Value::String(format!("<{} chars>", s.chars().count()))
            } else {
                value.clone()
            }
        }
        _ => value.clone(),
    }
}

const FAILURE_MARKERS: &[&str] = &["Traceback (most recent call last)", "error:", "Error:", "panicked at", "exit code: 1", "command not found"];

/// Whether a tool's stderr/output text reads as a failure. Used by
/// `post-tool-use` (where the agent doesn't explicitly say whether the call
/// succeeded) to set `success`/`error_message`.
pub fn detect_failure(output_text: &str) -> Option<String> {
    FAILURE_MARKERS.iter().find(|marker| output_text.contains(**marker)).map(|marker| {
        let idx = output_text.find(*marker).unwrap_or(0);
        let end = (idx + 200).min(output_text.len());
        output_text[idx..end].to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_named_bulky_fields_regardless_of_length() {
        let input = json!({"content": "x", "path": "a.rs"});
        let out = sanitize_tool_input(&input);
        assert_eq!(out["content"], json!("<1 chars>"));
        assert_eq!(out["path"], json!("a.rs"));
    }

    #[test]
    fn collapses_long_strings_in_unnamed_fields() {
        let long = "a".repeat(600);
        let input = json!({"description": long});
        let out = sanitize_tool_input(&input);
        assert_eq!(out["description"], json!("<600 chars>"));
    }

    #[test]
    fn detects_traceback_as_failure() {
        assert!(detect_failure("Traceback (most recent call last):\n  File ...").is_some());
    }

    #[test]
    fn clean_output_is_not_a_failure() {
        assert!(detect_failure("wrote 3 lines to file.rs").is_none());
    }
}
