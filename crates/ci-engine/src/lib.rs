pub mod classify;
pub mod error;
mod memory_store;
mod processor;
mod reconciliation;
mod retrieval;

pub use classify::{BatchClassification, ExtractedObservation, ExtractionResult};
pub use error::{Error, Result};
pub use memory_store::{MemoryVectorStore, ScoredMemory};
pub use processor::{Processor, DEFAULT_BATCH_LIMIT, DEFAULT_TICK_SECS};
pub use reconciliation::{plan_reconciliation, rebuild_memory_index, ReconciliationPlan};
pub use retrieval::{
    combined_score, filter_by_combined_score, filter_by_confidence, render_notify_context, render_post_tool_use_context, render_prompt_submit_context, ConfidenceLevel,
    RetrievalEngine, SearchResults, SearchType,
};
