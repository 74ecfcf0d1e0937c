use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, SessionId};

/// Lifecycle state of a `PromptBatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Currently accumulating activities; the session's one active batch.
    Active,
    /// Closed by the next `prompt-submit`/`session-end`, ready for the
    /// processor to promote it into observations.
    Completed,
    /// The processor has run the extraction pipeline over this batch.
    Processed,
}

/// The kind of turn that opened this batch, used to decide whether it is
/// eligible to auto-contribute observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// A normal user-authored prompt.
    UserPrompt,
    /// A system/agent-generated notification (e.g. a tool-permission
    /// re-prompt). Never auto-contributes observations; only a manual
    /// promote call can push it through the extraction pipeline.
    AgentNotification,
    System,
    /// The prompt itself is (or embeds) a plan document the agent is about
    /// to execute.
    Plan,
    /// Split off from a `Plan` batch when a later tool-use re-reads or
    /// revises the same plan file mid-execution.
    DerivedPlan,
}

/// Classification the processor assigns to a batch after looking at its
/// prompt and the tools used in response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchClassification {
    Exploration,
    Implementation,
    Debugging,
    Refactoring,
}

impl BatchClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchClassification::Exploration => "exploration",
            BatchClassification::Implementation => "implementation",
            BatchClassification::Debugging => "debugging",
            BatchClassification::Refactoring => "refactoring",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exploration" => Some(Self::Exploration),
            "implementation" => Some(Self::Implementation),
            "debugging" => Some(Self::Debugging),
            "refactoring" => Some(Self::Refactoring),
            _ => None,
        }
    }
}

/// One user turn and everything the agent did in response to it, up until
/// the next turn or session end.
///
/// Invariant: `prompt_number` is monotonically increasing within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBatch {
    pub id: BatchId,
    pub session_id: SessionId,
    pub prompt_number: u32,
    pub kind: BatchKind,
    pub status: BatchStatus,
    pub prompt_text: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub processed: bool,
    pub duration_ms: Option<u64>,
    pub files_affected: Vec<String>,
    /// True once a plan document's content has been folded into this
    /// batch's prompt_text for extraction purposes.
    pub plan_embedded: bool,
    /// When this batch was synthesized to reattach an orphaned activity
    /// rather than opened by an explicit prompt-submit, points at the
    /// batch it was split from.
    pub source_plan_batch_id: Option<BatchId>,
    /// Path to the plan document `plan_content` was resolved from, when the
    /// strategy that found it read one off disk rather than detecting an
    /// inline plan in response text.
    pub plan_file_path: Option<String>,
    /// The plan document's content, once resolved by
    /// `ci_providers::PlanDetector`.
    pub plan_content: Option<String>,
    /// Parsed from the agent's transcript once the next prompt-submit
    /// closes this batch.
    pub response_summary: Option<String>,
    /// Set once the processor classifies this batch's turn.
    pub classification: Option<BatchClassification>,
    pub content_hash: String,
}

impl PromptBatch {
    /// `AgentNotification`/`System` batches never auto-contribute
    /// observations — only a manual promote/reprocess call can push them
    /// through extraction. Every other kind, including plan batches, is
    /// eligible.
    pub fn is_eligible_for_auto_extraction(&self) -> bool {
        !matches!(self.kind, BatchKind::AgentNotification | BatchKind::System)
    }
}
