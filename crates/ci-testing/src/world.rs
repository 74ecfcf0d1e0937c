//! TestWorld pattern for declarative daemon-store test setup.
//!
//! Provides a fluent interface for:
//! - Seeding an isolated in-memory store with session/batch/activity fixtures
//! - Running the `oak-ci` binary against an isolated project directory
//! - Common existence/state assertions

use std::path::{Path, PathBuf};

use anyhow::Result;
use assert_cmd::Command;
use ci_store::Database;
use ci_types::{Activity, Agent, PromptBatch, ProjectRoot, Session};

use crate::fixtures::{fake_activity, fake_batch, fake_session, TempProject};

/// Builder for constructing a [`TestWorld`] with fine-grained control.
pub struct TestWorldBuilder {
    skip_data_dir_creation: bool,
}

impl TestWorldBuilder {
    pub fn new() -> Self {
        Self { skip_data_dir_creation: false }
    }

    /// Skip automatic creation of `.oak/ci/`, for testing fresh-install
    /// scenarios where the data directory does not exist yet.
    pub fn without_data_dir(mut self) -> Self {
        self.skip_data_dir_creation = true;
        self
    }

    pub fn build(self) -> Result<TestWorld> {
        let project = TempProject::new()?;
        let paths = ci_core::CiPaths::new(project.root());
        if !self.skip_data_dir_creation {
            paths.ensure_data_dir()?;
        }
        let db = Database::open_in_memory()?;

        Ok(TestWorld { project, db })
    }
}

impl Default for TestWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Declarative test environment builder: an isolated project directory plus
/// an in-memory store, pre-seedable with fixture sessions/batches/activities.
///
/// # Example
/// ```no_run
/// use ci_testing::TestWorld;
/// use ci_types::Agent;
///
/// let mut world = TestWorld::new().unwrap();
/// let session = world.seed_session(Agent::Claude, "seed-1");
/// assert_eq!(world.db().list_sessions(10).unwrap().len(), 1);
/// ```
pub struct TestWorld {
    project: TempProject,
    db: Database,
}

impl TestWorld {
    pub fn builder() -> TestWorldBuilder {
        TestWorldBuilder::new()
    }

    /// Create a new isolated test environment with default settings.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn project_root(&self) -> ProjectRoot {
        self.project.root()
    }

    pub fn cwd(&self) -> &Path {
        self.project.path()
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Check whether `.oak/ci/` exists under the project root.
    pub fn assert_data_dir_exists(&self) -> bool {
        self.project.path().join(".oak").join("ci").exists()
    }

    /// Seed one active session for `agent` and persist it.
    pub fn seed_session(&mut self, agent: Agent, seed: &str) -> Session {
        let root = self.project_root();
        let session = fake_session(&root, agent, seed);
        self.db.upsert_session(&session).expect("seed session");
        session
    }

    /// Seed an active prompt batch for `session` and persist it.
    pub fn seed_batch(&mut self, session: &Session, prompt_number: u32, prompt_text: &str) -> PromptBatch {
        let batch = fake_batch(session, prompt_number, prompt_text);
        self.db.upsert_batch(&batch).expect("seed batch");
        batch
    }

    /// Seed a tool-use activity within `batch` and queue it for flush.
    pub fn seed_activity(&mut self, batch: &PromptBatch, tool_name: &str, summary: &str) -> Activity {
        let activity = fake_activity(batch, tool_name, summary);
        self.db.queue_activity(activity.clone()).expect("queue activity");
        self.db.flush_activities().expect("flush activities");
        activity
    }

    /// Write `content` to `agent`'s plan directory under the project root.
    pub fn write_plan(&self, agent: Agent, file_name: &str, content: &str) -> Result<PathBuf> {
        self.project.write_plan(agent, file_name, content)
    }

    /// Write `content` to `agent`'s transcript path for `session_id`.
    pub fn write_transcript(&self, agent: Agent, session_id: &str, content: &str) -> Result<PathBuf> {
        self.project.write_transcript(agent, session_id, content)
    }

    /// Configure a `oak-ci` command to run against this environment's
    /// project directory.
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.current_dir(self.cwd());
        cmd
    }

    /// Run `oak-ci` with `args` against this environment and return the
    /// result.
    ///
    /// Requires the binary to be built and available via
    /// `Command::cargo_bin`, as `cargo test` arranges automatically.
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("oak-ci")
            .map_err(|e| anyhow::anyhow!("failed to find oak-ci binary: {e}"))?;
        self.configure_command(&mut cmd);
        cmd.args(args);

        let output = cmd.output()?;
        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_a_session_persists_it_to_the_store() -> Result<()> {
        let mut world = TestWorld::new()?;
        let session = world.seed_session(Agent::Claude, "seed-1");

        let fetched = world.db().get_session(&session.id)?;
        assert!(fetched.is_some());
        Ok(())
    }

    #[test]
    fn seeding_an_activity_shows_up_after_flush() -> Result<()> {
        let mut world = TestWorld::new()?;
        let session = world.seed_session(Agent::Codex, "seed-2");
        let batch = world.seed_batch(&session, 1, "fix the bug");
        world.seed_activity(&batch, "Edit", "patched the handler");

        let activities = world.db().activities_for_batch(&batch.id)?;
        assert_eq!(activities.len(), 1);
        Ok(())
    }

    #[test]
    fn without_data_dir_skips_directory_creation() -> Result<()> {
        let world = TestWorld::builder().without_data_dir().build()?;
        assert!(!world.assert_data_dir_exists());
        Ok(())
    }
}
