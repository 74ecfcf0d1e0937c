use std::sync::Arc;
use std::time::Duration;

use ci_core::hash::content_hash;
use ci_llm::{EmbeddingProvider, SummarizationProvider};
use ci_store::Database;
use ci_types::{util::now_rfc3339, Activity, ObservationId, ObservationOrigin, ObservationStatus, PromptBatch, SessionId, StoredObservation};

use crate::classify::{category_key, parse_extraction, BatchClassification};
use crate::error::Result;
use crate::memory_store::MemoryVectorStore;

pub const DEFAULT_TICK_SECS: u64 = 60;
pub const DEFAULT_BATCH_LIMIT: usize = 20;
const SUMMARY_MAX_CHARS: usize = 200;
const SUMMARY_MIN_TOOL_CALLS: i64 = 3;
const LLM_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the batch → observations pipeline on a fixed tick, the way the
/// daemon's other background work runs on its own timer rather than being
/// triggered per-request.
pub struct Processor {
    store: Arc<Database>,
    memory_index: Arc<MemoryVectorStore>,
    summarizer: Arc<dyn SummarizationProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_limit: usize,
}

impl Processor {
    pub fn new(store: Arc<Database>, memory_index: Arc<MemoryVectorStore>, summarizer: Arc<dyn SummarizationProvider>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, memory_index, summarizer, embedder, batch_limit: DEFAULT_BATCH_LIMIT }
    }

    /// One tick: pick up to `batch_limit` unprocessed, completed batches
    /// oldest-first and process each independently so one bad extraction
    /// doesn't block the rest.
    pub async fn run_tick(&self) -> Result<usize> {
        let batches = self.store.batches_ready_for_processing(self.batch_limit)?;
        let mut processed = 0;
        for batch in batches {
            if let Err(err) = self.process_batch(&batch).await {
                tracing::warn!(batch_id = batch.id.as_str(), error = %err, "batch processing failed");
                continue;
            }
            processed += 1;
        }
        self.embed_pending_observations().await?;
        Ok(processed)
    }

    async fn process_batch(&self, batch: &PromptBatch) -> Result<()> {
        if !batch.is_eligible_for_auto_extraction() {
            self.store.mark_batch_processed(&batch.id)?;
            return Ok(());
        }

        let activities = self.store.activities_for_batch(&batch.id)?;
        if let Some(classification) = self.classify_batch(batch, &activities).await {
            self.store.set_batch_classification(&batch.id, classification)?;
        }

        let prompt = build_extraction_prompt(batch, &activities);
        let raw = self.summarizer.complete(&prompt, LLM_TIMEOUT).await?;
        let extraction = parse_extraction(&raw);

        for extracted in &extraction.observations {
            let category = category_key(&extracted.category);
            let hash = content_hash(&[batch.session_id.as_str(), &category, &extracted.text]);
            if self.store.observation_by_content_hash(&hash)?.is_some() {
                continue; // already active/resolved/superseded — skip re-extraction
            }
            let now = now_rfc3339();
            let observation = StoredObservation {
                id: ObservationId::new(uuid::Uuid::new_v4().to_string()),
                session_id: batch.session_id.clone(),
                source_batch_id: batch.id.clone(),
                category: extracted.category.clone(),
                text: extracted.text.clone(),
                context: extracted.context.clone(),
                importance: extracted.importance.unwrap_or(5),
                status: ObservationStatus::Active,
                tags: extracted.tags.clone(),
                file_path: extracted.file_path.clone(),
                origin: ObservationOrigin::AutoExtracted,
                created_at: now.clone(),
                updated_at: now,
                content_hash: hash,
                embedded: false,
            };
            self.store.upsert_observation(&observation)?;
        }

        self.store.mark_batch_processed(&batch.id)?;
        self.maybe_summarize_session(&batch.session_id).await?;
        Ok(())
    }

    async fn classify_batch(&self, batch: &PromptBatch, activities: &[Activity]) -> Option<BatchClassification> {
        let tool_names: Vec<&str> = activities.iter().filter_map(|a| a.tool_name.as_deref()).collect();
        let prompt = format!(
            "Classify this coding session turn as exactly one of: exploration, implementation, debugging, refactoring.\n\nUser prompt: {}\nTools used: {}\n\nRespond with only the single word.",
            batch.prompt_text,
            tool_names.join(", ")
        );
        let response = self.summarizer.complete(&prompt, LLM_TIMEOUT).await.ok()?;
        BatchClassification::parse(&response)
    }

    async fn maybe_summarize_session(&self, session_id: &SessionId) -> Result<()> {
        let Some(session) = self.store.get_session(session_id)? else { return Ok(()) };
        let tool_calls = self.store.tool_call_count_for_session(session_id)?;
        let resumed = session.resumed_at.is_some();

        if !resumed && session.summary.is_some() {
            return Ok(());
        }
        if tool_calls < SUMMARY_MIN_TOOL_CALLS {
            return Ok(());
        }

        let batches = if resumed { self.store.batches_for_session(session_id)? } else { vec![] };
        let prompt = if resumed {
            build_full_session_summary_prompt(&batches)
        } else {
            format!("Summarize this coding session in at most {} characters of prose:\n\n{}", SUMMARY_MAX_CHARS, session.summary.clone().unwrap_or_default())
        };

        let raw = self.summarizer.complete(&prompt, LLM_TIMEOUT).await?;
        let summary = extract_summary_text(&raw);
        let truncated: String = summary.chars().take(SUMMARY_MAX_CHARS).collect();
        self.store.set_session_summary(session_id, &truncated)?;
        Ok(())
    }

    async fn embed_pending_observations(&self) -> Result<()> {
        let pending = self.store.observations_pending_embedding(100)?;
        if pending.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = pending.iter().map(|o| o.text.clone()).collect();
        let embedded = self.embedder.embed(&texts).await?;

        let mut embedded_ids = Vec::new();
        for (observation, vector) in pending.iter().zip(embedded.vectors.iter()) {
            self.memory_index.upsert(&observation.id, &observation.text, &observation.category, observation.importance, vector)?;
            embedded_ids.push(observation.id.clone());
        }
        self.store.mark_observations_embedded(&embedded_ids)?;
        Ok(())
    }
}

fn build_extraction_prompt(batch: &PromptBatch, activities: &[Activity]) -> String {
    let activity_lines: Vec<String> = activities
        .iter()
        .map(|a| format!("- {} {}", a.tool_name.as_deref().unwrap_or("assistant"), a.summary))
        .collect();
    let plan_section = match &batch.plan_content {
        Some(content) => format!("\nPlan document this turn is executing:\n{content}\n"),
        None => String::new(),
    };
    format!(
        "Given this prompt and the actions taken in response, extract durable observations as JSON: {{ \"observations\": [{{\"type\":..,\"observation\":..,\"context\":..,\"importance\":..,\"tags\":[..],\"file_path\":..}}], \"summary\": \"...\" }}.\n\nPrompt: {}\n{}Actions:\n{}",
        batch.prompt_text,
        plan_section,
        activity_lines.join("\n")
    )
}

fn build_full_session_summary_prompt(batches: &[PromptBatch]) -> String {
    let lines: Vec<String> = batches.iter().map(|b| format!("- {}", b.prompt_text)).collect();
    format!("Summarize this entire coding session in at most {} characters of prose, given every prompt so far:\n\n{}", SUMMARY_MAX_CHARS, lines.join("\n"))
}

fn extract_summary_text(raw: &str) -> String {
    let extraction = parse_extraction(raw);
    extraction.summary.unwrap_or_else(|| raw.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_summary_text_falls_back_to_raw_prose() {
        assert_eq!(extract_summary_text("Added a login form."), "Added a login form.");
    }

    #[test]
    fn extract_summary_text_unwraps_json_summary_field() {
        let raw = r#"{"summary": "Refactored the auth module."}"#;
        assert_eq!(extract_summary_text(raw), "Refactored the auth module.");
    }
}
