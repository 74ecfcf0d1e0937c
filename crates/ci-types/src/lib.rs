mod activity;
mod agent;
mod batch;
mod chunk;
pub mod error;
mod hook;
mod ids;
mod observation;
mod resolution;
mod session;
pub mod util;

pub use activity::{Activity, ActivityKind};
pub use agent::Agent;
pub use batch::{BatchClassification, BatchKind, BatchStatus, PromptBatch};
pub use chunk::{ChunkType, CodeChunk};
pub use error::{Error, Result};
pub use hook::{HookRequest, HookResponse, HookStatus, RawHookBody};
pub use ids::{ActivityId, BatchId, MachineId, ObservationId, ProjectRoot, ResolutionEventId, SessionId};
pub use observation::{ObservationCategory, ObservationOrigin, ObservationStatus, StoredObservation};
pub use resolution::{ResolutionEvent, ResolutionKind};
pub use session::{ParentSessionReason, Session};
