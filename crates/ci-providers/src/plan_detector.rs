use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::Error;
use crate::registry::ManifestRegistry;
use ci_types::Agent;

/// A recently-modified file is only considered "the plan for this turn" if
/// it changed within this window of the hook firing. Matches the daemon's
/// plan-directory disk-scan timing threshold.
const RECENCY_WINDOW: Duration = Duration::from_secs(300);

/// Resolves what a batch's "plan content" is, trying increasingly indirect
/// strategies until one produces something.
pub struct PlanDetector<'a> {
    registry: &'a ManifestRegistry,
}

impl<'a> PlanDetector<'a> {
    pub fn new(registry: &'a ManifestRegistry) -> Self {
        Self { registry }
    }

    /// Four-strategy resolution, in order:
    /// 1. An explicit plan file path supplied by the hook payload.
    /// 2. The most recently modified file under the agent's plan
    ///    directories, if modified within `RECENCY_WINDOW`.
    /// 3. An inline plan embedded in the assistant's own response text.
    /// 4. None — the batch has no associated plan.
    pub fn resolve_plan_content(
        &self,
        agent: Agent,
        project_root: &Path,
        explicit_path: Option<&Path>,
        response_text: Option<&str>,
    ) -> Option<String> {
        if let Some(path) = explicit_path
            && let Ok(content) = std::fs::read_to_string(path)
        {
            return Some(content);
        }

        if let Some(path) = self.find_recent_plan_file(agent, project_root)
            && let Ok(content) = std::fs::read_to_string(&path)
        {
            return Some(content);
        }

        if let Some(text) = response_text
            && let Some(inline) = self.detect_plan_in_response(agent, text)
        {
            return Some(inline);
        }

        None
    }

    /// Strategy 2: scan the agent's plan directories for the most recently
    /// modified file, accepted only if it changed inside the recency
    /// window — otherwise it's a stale leftover from an earlier session.
    pub fn find_recent_plan_file(&self, agent: Agent, project_root: &Path) -> Option<PathBuf> {
        let manifest = self.registry.get(agent);
        let now = SystemTime::now();
        let mut newest: Option<(PathBuf, SystemTime)> = None;

        for dir in manifest.plan_dirs(project_root) {
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Ok(meta) = entry.metadata() else { continue };
                let Ok(modified) = meta.modified() else { continue };
                if newest.as_ref().is_none_or(|(_, t)| modified > *t) {
                    newest = Some((path, modified));
                }
            }
        }

        let (path, modified) = newest?;
        let age = now.duration_since(modified).ok()?;
        if age <= RECENCY_WINDOW {
            Some(path)
        } else {
            None
        }
    }

    /// Strategy 3 / heuristic detection: does this response text look like
    /// it contains a proposed plan, per the agent's own patterns?
    pub fn detect_plan_in_response(&self, agent: Agent, text: &str) -> Option<String> {
        let manifest = self.registry.get(agent);
        if manifest.plan_response_patterns().iter().any(|re| re.is_match(text)) {
            Some(text.to_string())
        } else {
            None
        }
    }

    /// Whether `path` falls under one of this agent's known plan
    /// directories (used to decide whether a touched file warrants a
    /// `plan_proposed` activity on its own).
    pub fn detect(&self, agent: Agent, project_root: &Path, path: &Path) -> bool {
        self.registry
            .get(agent)
            .plan_dirs(project_root)
            .into_iter()
            .any(|dir| path.starts_with(&dir))
    }
}

pub fn no_plan_content_error(session_id: &str) -> Error {
    Error::NoPlanContent(session_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ManifestRegistry;

    #[test]
    fn detects_heading_style_plan_in_response() {
        let registry = ManifestRegistry::new();
        let detector = PlanDetector::new(&registry);
        let text = "# Plan\n1. do the thing\n2. test it";
        assert!(detector.detect_plan_in_response(Agent::Claude, text).is_some());
    }

    #[test]
    fn plain_response_is_not_a_plan() {
        let registry = ManifestRegistry::new();
        let detector = PlanDetector::new(&registry);
        assert!(detector
            .detect_plan_in_response(Agent::Claude, "sure, I fixed the bug")
            .is_none());
    }

    #[test]
    fn stale_plan_file_outside_recency_window_is_ignored() {
        let registry = ManifestRegistry::new();
        let detector = PlanDetector::new(&registry);
        let dir = tempfile::tempdir().unwrap();
        let plan_dir = dir.path().join(".claude").join("plans");
        std::fs::create_dir_all(&plan_dir).unwrap();
        let plan_file = plan_dir.join("old.md");
        std::fs::write(&plan_file, "# Plan\nold").unwrap();
        let old_time = std::time::SystemTime::now() - Duration::from_secs(3600);
        filetime::set_file_mtime(&plan_file, filetime::FileTime::from_system_time(old_time))
            .unwrap();
        assert!(detector.find_recent_plan_file(Agent::Claude, dir.path()).is_none());
    }
}
