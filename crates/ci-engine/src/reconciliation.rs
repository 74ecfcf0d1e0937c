use std::sync::Arc;

use ci_store::Database;

use crate::error::Result;
use crate::memory_store::MemoryVectorStore;

/// What the daemon should do after comparing SQLite's observation count
/// against the memory vector store's count at startup. Returned rather
/// than acted on directly so the caller can run it on a background task
/// without blocking daemon readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationPlan {
    NoOp,
    /// Vector store is empty but SQLite has observations: rebuild the
    /// whole memory index from scratch.
    FullRebuild,
    /// Some observations are still unembedded: the processor's own
    /// `embed_pending_observations` pass covers them on the next tick.
    EmbedPending,
}

pub fn plan_reconciliation(store: &Database, memory_index: &MemoryVectorStore) -> Result<ReconciliationPlan> {
    let observation_count = store.count_observations()?;
    let vector_count = memory_index.count()?;

    if observation_count > 0 && vector_count == 0 {
        return Ok(ReconciliationPlan::FullRebuild);
    }

    let pending = store.observations_pending_embedding(1)?;
    if !pending.is_empty() {
        return Ok(ReconciliationPlan::EmbedPending);
    }

    Ok(ReconciliationPlan::NoOp)
}

/// Re-embeds every active observation from scratch, used when the memory
/// vector store was lost or never built but SQLite still has the facts.
pub async fn rebuild_memory_index(store: &Database, memory_index: Arc<MemoryVectorStore>, embedder: Arc<dyn ci_llm::EmbeddingProvider>) -> Result<usize> {
    store.reset_all_embedding_flags()?;

    let mut rebuilt = 0;
    let mut offset = 0usize;
    loop {
        let batch = store.observations_pending_embedding(200)?;
        if batch.is_empty() {
            break;
        }
        let texts: Vec<String> = batch.iter().map(|o| o.text.clone()).collect();
        let embedded = embedder.embed(&texts).await?;
        let mut embedded_ids = Vec::new();
        for (observation, vector) in batch.iter().zip(embedded.vectors.iter()) {
            memory_index.upsert(&observation.id, &observation.text, &observation.category, observation.importance, vector)?;
            embedded_ids.push(observation.id.clone());
        }
        store.mark_observations_embedded(&embedded_ids)?;
        rebuilt += batch.len();
        offset += batch.len();
        if offset > 50_000 {
            tracing::warn!("memory index rebuild exceeded safety cap, stopping early");
            break;
        }
    }
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_needs_no_reconciliation() {
        let store = Database::open_in_memory().unwrap();
        let memory_index = MemoryVectorStore::open_in_memory().unwrap();
        assert_eq!(plan_reconciliation(&store, &memory_index).unwrap(), ReconciliationPlan::NoOp);
    }
}
