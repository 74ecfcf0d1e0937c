use serde::{Deserialize, Serialize};

use crate::ids::{MachineId, ObservationId, ResolutionEventId};

/// What happened to an observation after it was surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Confirmed still correct; observation stays/returns to `Active`.
    Resolve,
    /// Replaced by a newer observation; observation moves to `Superseded`.
    Supersede,
    /// A previously superseded observation turned out to still apply;
    /// observation moves back to `Active`.
    Reactivate,
}

/// Records that an observation's standing changed, and why. Used to drive
/// the `Resolved`/`Superseded` observation status transitions and to keep
/// an audit trail of why an observation stopped being surfaced.
///
/// Invariant: `content_hash` is derived from `(observation_id, kind,
/// source_machine_id, superseded_by)`, so replaying the same resolution
/// upserts in place instead of duplicating the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionEvent {
    pub id: ResolutionEventId,
    pub observation_id: ObservationId,
    pub kind: ResolutionKind,
    /// Set when `kind` is `Supersede`: the observation that replaces this one.
    pub superseded_by: Option<ObservationId>,
    pub note: Option<String>,
    pub occurred_at: String,
    pub source_machine_id: MachineId,
    pub content_hash: String,
}
