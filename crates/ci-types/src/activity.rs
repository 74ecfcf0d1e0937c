use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ActivityId, BatchId, SessionId};

/// The hook event that produced this activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ToolUse,
    ToolUseFailure,
    AssistantMessage,
    PlanProposed,
}

/// One recorded unit of agent activity within a prompt batch: a tool call,
/// its failure, or an assistant message.
///
/// `batch_id` is `None` only in the window between the activity being
/// buffered and its batch being assigned during flush; a recovery pass
/// reattaches any row still `None` after a restart.
///
/// All free-text fields (`summary`, `detail`) are passed through secret
/// redaction before being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub session_id: SessionId,
    pub batch_id: Option<BatchId>,
    pub kind: ActivityKind,
    pub tool_name: Option<String>,
    pub summary: String,
    pub detail: Option<String>,
    pub files_affected: Vec<String>,
    pub occurred_at: String,
    pub duration_ms: Option<u64>,
    pub raw: Value,
}
