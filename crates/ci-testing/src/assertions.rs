//! Custom assertions for the daemon's JSON response shapes.
//!
//! Provides high-level assertions that make tests more readable:
//! - Session/activity/observation count validation
//! - Stats field checks
//! - Session membership checks

use anyhow::{Context, Result};
use serde_json::Value;

/// Assert that a `/api/activity/sessions`-shaped response contains the
/// expected number of sessions.
pub fn assert_session_count(json: &Value, expected: usize) -> Result<()> {
    let sessions = json["sessions"].as_array().context("expected 'sessions' array in JSON")?;

    if sessions.len() != expected {
        anyhow::bail!("expected {} sessions, got {}", expected, sessions.len());
    }

    Ok(())
}

/// Assert that a `/api/activity/sessions/:id/activities`-shaped response
/// contains the expected number of activities.
pub fn assert_activity_count(json: &Value, expected: usize) -> Result<()> {
    let activities = json["activities"].as_array().context("expected 'activities' array in JSON")?;

    if activities.len() != expected {
        anyhow::bail!("expected {} activities, got {}", expected, activities.len());
    }

    Ok(())
}

/// Assert that a `/api/activity/search`-shaped response contains the
/// expected number of observations.
pub fn assert_observation_count(json: &Value, expected: usize) -> Result<()> {
    let observations = json["observations"].as_array().context("expected 'observations' array in JSON")?;

    if observations.len() != expected {
        anyhow::bail!("expected {} observations, got {}", expected, observations.len());
    }

    Ok(())
}

/// Assert that all sessions in a `/api/activity/sessions`-shaped response
/// belong to the given project root.
pub fn assert_sessions_belong_to_project(json: &Value, project_root: &str) -> Result<()> {
    let sessions = json["sessions"].as_array().context("expected 'sessions' array in JSON")?;

    for (i, session) in sessions.iter().enumerate() {
        let session_root = session["project_root"]
            .as_str()
            .with_context(|| format!("session {i} missing project_root"))?;

        if session_root != project_root {
            anyhow::bail!("session {i} belongs to project {session_root} but expected {project_root}");
        }
    }

    Ok(())
}

/// Assert a field on a `/api/activity/stats`-shaped response equals `expected`.
pub fn assert_stat(json: &Value, field: &str, expected: i64) -> Result<()> {
    let actual = json[field].as_i64().with_context(|| format!("expected integer field '{field}' in stats JSON"))?;

    if actual != expected {
        anyhow::bail!("expected stats.{field} == {expected}, got {actual}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_count_checks_the_flat_sessions_array() {
        let json = json!({ "sessions": [{"id": "1"}, {"id": "2"}] });

        assert!(assert_session_count(&json, 2).is_ok());
        assert!(assert_session_count(&json, 1).is_err());
    }

    #[test]
    fn sessions_belong_to_project_checks_project_root_field() {
        let json = json!({
            "sessions": [
                {"project_root": "/work/a"},
                {"project_root": "/work/a"}
            ]
        });

        assert!(assert_sessions_belong_to_project(&json, "/work/a").is_ok());
        assert!(assert_sessions_belong_to_project(&json, "/work/b").is_err());
    }

    #[test]
    fn stat_checks_a_single_numeric_field() {
        let json = json!({ "sessions": 3, "batches": 5 });

        assert!(assert_stat(&json, "sessions", 3).is_ok());
        assert!(assert_stat(&json, "batches", 1).is_err());
    }
}
