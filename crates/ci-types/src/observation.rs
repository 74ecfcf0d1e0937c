use serde::{Deserialize, Serialize};

use crate::ids::{BatchId, ObservationId, SessionId};

/// Lifecycle state of a stored observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    /// Currently valid and eligible for retrieval.
    Active,
    /// Explicitly confirmed correct by a later resolution event.
    Resolved,
    /// Replaced by a newer observation covering the same fact.
    Superseded,
}

/// The category an extraction assigned to an observation, used only to
/// group retrieval results; it carries no ranking weight of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationCategory {
    Decision,
    Convention,
    Gotcha,
    Preference,
    Todo,
    Other(String),
}

/// Where an observation came from. `AgentCreated` observations bypass the
/// processor's extraction pipeline entirely (an agent or operator recorded
/// the fact directly); the processor only ever produces `AutoExtracted`
/// ones and never deletes rows of either kind, so an agent-created
/// observation survives any amount of reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationOrigin {
    AutoExtracted,
    AgentCreated,
}

/// A fact extracted by the processor from a completed prompt batch, or
/// recorded directly by an agent/operator.
///
/// Invariant: `id` is derived from a content hash of `(session_id,
/// category, text)` so that re-extraction of an unchanged fact upserts in
/// place instead of creating a duplicate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObservation {
    pub id: ObservationId,
    pub session_id: SessionId,
    pub source_batch_id: BatchId,
    pub category: ObservationCategory,
    pub text: String,
    /// Surrounding context the extraction captured alongside `text` — the
    /// "why", not restated in `text` itself.
    pub context: Option<String>,
    pub importance: u8,
    pub status: ObservationStatus,
    pub tags: Vec<String>,
    /// File this observation is scoped to, when the extraction could tie it
    /// to one (a convention about a specific module, say).
    pub file_path: Option<String>,
    pub origin: ObservationOrigin,
    pub created_at: String,
    pub updated_at: String,
    pub content_hash: String,
    /// Set once the text has been embedded and upserted into the vector
    /// store under this same id.
    pub embedded: bool,
}

impl StoredObservation {
    pub fn clamp_importance(value: i64) -> u8 {
        value.clamp(0, 10) as u8
    }
}
