//! Deterministic fixture builders for sessions, prompt batches and
//! activities, plus a throwaway project directory for tests that need real
//! paths on disk (plan files, transcripts, a project root to hash).

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use ci_providers::ManifestRegistry;
use ci_types::{
    Activity, ActivityId, ActivityKind, Agent, BatchId, BatchKind, BatchStatus, MachineId,
    PromptBatch, ProjectRoot, Session, SessionId,
};
use serde_json::json;
use tempfile::TempDir;

/// Build a session fixture for `agent`, owned by a deterministically-derived
/// id so repeated calls in one test produce stable, comparable values.
pub fn fake_session(project_root: &ProjectRoot, agent: Agent, seed: &str) -> Session {
    let id = SessionId::new(generate_id("session", seed));
    Session::new(id, project_root.clone(), agent, MachineId::new("test-machine"))
}

/// Build a batch fixture belonging to `session`, as the `n`th prompt in it.
pub fn fake_batch(session: &Session, n: u32, prompt_text: &str) -> PromptBatch {
    let id = BatchId::new(generate_id("batch", &format!("{}-{n}", session.id.as_str())));
    PromptBatch {
        id,
        session_id: session.id.clone(),
        prompt_number: n,
        kind: BatchKind::UserPrompt,
        status: BatchStatus::Active,
        prompt_text: prompt_text.to_string(),
        started_at: ci_types::util::now_rfc3339(),
        completed_at: None,
        processed: false,
        duration_ms: None,
        files_affected: Vec::new(),
        plan_embedded: false,
        source_plan_batch_id: None,
        plan_file_path: None,
        plan_content: None,
        response_summary: None,
        classification: None,
        content_hash: generate_id("content", prompt_text),
    }
}

/// Build a tool-use activity fixture within `batch`.
pub fn fake_activity(batch: &PromptBatch, tool_name: &str, summary: &str) -> Activity {
    let id = ActivityId::new(generate_id("activity", &format!("{}-{tool_name}-{summary}", batch.id.as_str())));
    Activity {
        id,
        session_id: batch.session_id.clone(),
        batch_id: Some(batch.id.clone()),
        kind: ActivityKind::ToolUse,
        tool_name: Some(tool_name.to_string()),
        summary: summary.to_string(),
        detail: None,
        files_affected: Vec::new(),
        occurred_at: ci_types::util::now_rfc3339(),
        duration_ms: Some(12),
        raw: json!({ "tool": tool_name }),
    }
}

/// Deterministic, human-legible fixture id: stable across repeated calls
/// with the same `(kind, seed)`, distinct across kinds and seeds.
fn generate_id(kind: &str, seed: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(seed.as_bytes());
    let hash = hasher.finalize();
    format!(
        "test-{kind}-{:016x}",
        u64::from_be_bytes([hash[0], hash[1], hash[2], hash[3], hash[4], hash[5], hash[6], hash[7]])
    )
}

/// A throwaway project directory, torn down on drop, for tests that need a
/// real `ProjectRoot` and the ability to write an agent's plan/transcript
/// files the way [`ci_providers::AgentManifest`] expects to find them.
pub struct TempProject {
    dir: TempDir,
    registry: ManifestRegistry,
}

impl TempProject {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        Ok(Self { dir, registry: ManifestRegistry::new() })
    }

    pub fn root(&self) -> ProjectRoot {
        ProjectRoot::new(self.dir.path())
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Write `content` to `agent`'s first plan directory, creating it if
    /// necessary, and return the file's path.
    pub fn write_plan(&self, agent: Agent, file_name: &str, content: &str) -> Result<PathBuf> {
        let manifest = self.registry.get(agent);
        let dir = manifest
            .plan_dirs(self.dir.path())
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("{agent} has no project-relative plan directory"))?;
        fs::create_dir_all(&dir)?;
        let dest = dir.join(file_name);
        fs::write(&dest, content)?;
        Ok(dest)
    }

    /// Write `content` to `agent`'s transcript path for `session_id`,
    /// creating parent directories as needed.
    pub fn write_transcript(&self, agent: Agent, session_id: &str, content: &str) -> Result<PathBuf> {
        let manifest = self.registry.get(agent);
        let dest = manifest
            .transcript_path(self.dir.path(), session_id)
            .ok_or_else(|| anyhow::anyhow!("{agent} does not expose a transcript file"))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, content)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_ids_are_deterministic() {
        let root = ProjectRoot::new("/tmp/project-a");
        let a = fake_session(&root, Agent::Claude, "seed-1");
        let b = fake_session(&root, Agent::Claude, "seed-1");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn fixture_ids_differ_by_seed() {
        let root = ProjectRoot::new("/tmp/project-a");
        let a = fake_session(&root, Agent::Claude, "seed-1");
        let b = fake_session(&root, Agent::Claude, "seed-2");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn temp_project_writes_claude_plan_under_dot_claude_plans() -> Result<()> {
        let project = TempProject::new()?;
        let path = project.write_plan(Agent::Claude, "plan.md", "# plan\ndo the thing")?;
        assert!(path.starts_with(project.path().join(".claude/plans")));
        assert_eq!(fs::read_to_string(path)?, "# plan\ndo the thing");
        Ok(())
    }
}
