use ci_core::config::GovernanceConfig;
use serde_json::Value;

pub enum Decision {
    Allow,
    Deny { reason: String },
}

/// Checks a tool call against the configured deny rules. Denied tools win
/// outright; denied path globs match the pretty-printed `tool_input` so a
/// rule like `**/.env` catches whichever field of any tool's input schema
/// happens to carry the path.
pub fn evaluate(config: &GovernanceConfig, tool_name: &str, tool_input: &Value) -> Decision {
    if config.denied_tools.iter().any(|denied| denied == tool_name) {
        return Decision::Deny { reason: format!("tool `{tool_name}` is denied by governance policy") };
    }

    let haystack = tool_input.to_string();
    for glob in &config.denied_path_globs {
        if glob_matches(glob, &haystack) {
            return Decision::Deny { reason: format!("tool input matches denied path pattern `{glob}`") };
        }
    }

    Decision::Allow
}

/// Minimal glob matcher supporting `*` (any run of characters, including
/// none) and `**` (treated the same as `*` here — the haystack is a flat
/// JSON string, not a path tree, so the distinction doesn't apply).
fn glob_matches(pattern: &str, haystack: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return haystack.contains(pattern);
    }

    let mut cursor = 0;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        match haystack[cursor..].find(segment) {
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                cursor += pos + segment.len();
            }
            None => return false,
        }
    }
    if let Some(last) = segments.last()
        && !last.is_empty()
        && !haystack.ends_with(last)
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn denied_tool_name_is_denied_regardless_of_input() {
        let config = GovernanceConfig { denied_tools: vec!["Bash".to_string()], denied_path_globs: Vec::new() };
        assert!(matches!(evaluate(&config, "Bash", &json!({"command": "ls"})), Decision::Deny { .. }));
    }

    #[test]
    fn denied_path_glob_matches_tool_input() {
        let config = GovernanceConfig { denied_tools: Vec::new(), denied_path_globs: vec!["*.env".to_string()] };
        let decision = evaluate(&config, "Read", &json!({"path": "/project/.env"}));
        assert!(matches!(decision, Decision::Deny { .. }));
    }

    #[test]
    fn unrelated_tool_and_input_is_allowed() {
        let config = GovernanceConfig { denied_tools: vec!["Bash".to_string()], denied_path_globs: vec!["*.env".to_string()] };
        assert!(matches!(evaluate(&config, "Read", &json!({"path": "/project/src/main.rs"})), Decision::Allow));
    }
}
