use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::ids::{MachineId, ProjectRoot, SessionId};

/// Why a session's `parent_session_id` is set: what the agent told us (or
/// what the daemon inferred) happened to the previous session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentSessionReason {
    /// The agent's own `/clear`-equivalent command started a fresh session.
    Clear,
    /// The agent compacted its context and continued under a new id.
    Compact,
    /// No explicit signal; the daemon inferred continuity from timing and
    /// project root alone.
    Inferred,
}

/// A single continuous interaction between a developer and an agent, from
/// `session-start` (or the first observed hook) to `session-end`.
///
/// Invariant: at most one `PromptBatch` for a session has `status = Active`
/// at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_root: ProjectRoot,
    pub agent: Agent,
    pub started_at: String,
    pub ended_at: Option<String>,
    /// Set when the daemon observes hook traffic for a session id it has
    /// already recorded an `ended_at` for (the agent resumed a prior session).
    pub resumed_at: Option<String>,
    pub summary: Option<String>,
    /// Short human-facing label. Auto-generated from the first prompt
    /// batch's summary unless `title_manually_edited` is set.
    pub title: Option<String>,
    pub title_manually_edited: bool,
    pub prompt_count: u32,
    pub tool_count: u32,
    pub summary_updated_at: Option<String>,
    /// Set once `summary` has been embedded into the memory vector store.
    /// Cleared whenever `summary` is overwritten.
    pub summary_embedded: bool,
    /// The session id this one continues from, when the agent reported one.
    pub parent_session_id: Option<SessionId>,
    pub parent_session_reason: Option<ParentSessionReason>,
    /// Path to the agent's own transcript file for this session, if its
    /// manifest exposes one.
    pub transcript_path: Option<String>,
    pub source_machine_id: MachineId,
}

impl Session {
    pub fn new(id: SessionId, project_root: ProjectRoot, agent: Agent, machine: MachineId) -> Self {
        Self {
            id,
            project_root,
            agent,
            started_at: crate::util::now_rfc3339(),
            ended_at: None,
            resumed_at: None,
            summary: None,
            title: None,
            title_manually_edited: false,
            prompt_count: 0,
            tool_count: 0,
            summary_updated_at: None,
            summary_embedded: false,
            parent_session_id: None,
            parent_session_reason: None,
            transcript_path: None,
            source_machine_id: machine,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}
