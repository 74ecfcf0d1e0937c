use std::sync::Arc;

use ci_codeindex::{ScoredChunk, VectorStore};
use ci_llm::EmbeddingProvider;

use crate::error::Result;
use crate::memory_store::{MemoryVectorStore, ScoredMemory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Code,
    Memory,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

const CONFIDENCE_HIGH: f32 = 0.75;
const CONFIDENCE_MEDIUM: f32 = 0.5;
const CONFIDENCE_LOW: f32 = 0.3;

const COMBINED_HIGH: f32 = 0.75;
const COMBINED_MEDIUM: f32 = 0.5;
const COMBINED_LOW: f32 = 0.3;

fn threshold_for(level: ConfidenceLevel) -> f32 {
    match level {
        ConfidenceLevel::High => CONFIDENCE_HIGH,
        ConfidenceLevel::Medium => CONFIDENCE_MEDIUM,
        ConfidenceLevel::Low => CONFIDENCE_LOW,
    }
}

fn combined_threshold_for(level: ConfidenceLevel) -> f32 {
    match level {
        ConfidenceLevel::High => COMBINED_HIGH,
        ConfidenceLevel::Medium => COMBINED_MEDIUM,
        ConfidenceLevel::Low => COMBINED_LOW,
    }
}

/// `relevance` weighted more than `importance`, so a highly relevant but
/// low-importance memory still surfaces, while a high-importance memory
/// needs to clear a lower relevance bar to do the same.
pub fn combined_score(relevance: f32, importance: u8) -> f32 {
    relevance * 0.7 + (importance as f32 / 10.0) * 0.3
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub code: Vec<ScoredChunk>,
    pub memory: Vec<ScoredMemory>,
}

pub fn filter_by_confidence(chunks: Vec<ScoredChunk>, min: ConfidenceLevel) -> Vec<ScoredChunk> {
    let threshold = threshold_for(min);
    chunks.into_iter().filter(|c| c.score >= threshold).collect()
}

pub fn filter_by_combined_score(memories: Vec<ScoredMemory>, min: ConfidenceLevel) -> Vec<ScoredMemory> {
    let threshold = combined_threshold_for(min);
    memories.into_iter().filter(|m| combined_score(m.score, m.importance) >= threshold).collect()
}

/// Single entry point for both code and memory retrieval. Embeds `query`
/// exactly once no matter which collections `search_type` asks for, since
/// that one embedding call dominates prompt-submit latency.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    code_store: Arc<dyn VectorStore>,
    memory_store: Arc<MemoryVectorStore>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, code_store: Arc<dyn VectorStore>, memory_store: Arc<MemoryVectorStore>) -> Self {
        Self { embedder, code_store, memory_store }
    }

    pub async fn search(&self, query: &str, search_type: SearchType, limit: usize) -> Result<SearchResults> {
        let embedded = self.embedder.embed(std::slice::from_ref(&query.to_string())).await?;
        let Some(vector) = embedded.vectors.into_iter().next() else {
            return Ok(SearchResults::default());
        };

        let code = if matches!(search_type, SearchType::Code | SearchType::All) {
            self.code_store.search(&vector, limit)?
        } else {
            Vec::new()
        };
        let memory = if matches!(search_type, SearchType::Memory | SearchType::All) {
            self.memory_store.search(&vector, limit)?
        } else {
            Vec::new()
        };

        Ok(SearchResults { code, memory })
    }
}

/// Markdown rendered for the prompt-submit hook: up to 3 high-confidence
/// code chunks, then up to 5 high-combined-score memories.
pub fn render_prompt_submit_context(results: &SearchResults) -> String {
    let code = filter_by_confidence(results.code.clone(), ConfidenceLevel::High);
    let memories = filter_by_combined_score(results.memory.clone(), ConfidenceLevel::High);

    let mut sections = Vec::new();
    if !code.is_empty() {
        let mut block = String::from("## Relevant code\n");
        for chunk in code.iter().take(3) {
            block.push_str(&format!("- `{}:{}` — {}\n", chunk.chunk.filepath, chunk.chunk.start_line, chunk.chunk.name.as_deref().unwrap_or("")));
        }
        sections.push(block);
    }
    if !memories.is_empty() {
        let mut block = String::from("## Relevant memory\n");
        for memory in memories.iter().take(5) {
            block.push_str(&format!("- {}\n", memory.text));
        }
        sections.push(block);
    }
    sections.join("\n")
}

/// Markdown rendered for the post-tool-use hook's file context: up to 3
/// medium-combined-score memories, gotchas marked with a warning prefix.
pub fn render_post_tool_use_context(memories: &[ScoredMemory]) -> String {
    use ci_types::ObservationCategory;

    let filtered = filter_by_combined_score(memories.to_vec(), ConfidenceLevel::Medium);
    let mut lines = Vec::new();
    for memory in filtered.iter().take(3) {
        let prefix = if memory.category == ObservationCategory::Gotcha { "⚠️ " } else { "" };
        lines.push(format!("- {}{}", prefix, memory.text));
    }
    lines.join("\n")
}

/// Notify context is precision-first: only high-confidence results pass,
/// and nothing is rendered if none clear that bar.
pub fn render_notify_context(results: &SearchResults) -> String {
    let code = filter_by_confidence(results.code.clone(), ConfidenceLevel::High);
    let memories = filter_by_combined_score(results.memory.clone(), ConfidenceLevel::High);

    let mut lines = Vec::new();
    for chunk in &code {
        lines.push(format!("- `{}`", chunk.chunk.filepath));
    }
    for memory in &memories {
        lines.push(format!("- {}", memory.text));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_types::ObservationId;

    fn memory(score: f32, importance: u8, category: ci_types::ObservationCategory) -> ScoredMemory {
        ScoredMemory { observation_id: ObservationId::new("o1"), text: "example".to_string(), category, importance, score }
    }

    #[test]
    fn combined_score_weights_relevance_above_importance() {
        let high_relevance_low_importance = combined_score(0.9, 2);
        let low_relevance_high_importance = combined_score(0.3, 10);
        assert!(high_relevance_low_importance > low_relevance_high_importance);
    }

    #[test]
    fn filter_by_combined_score_lets_high_importance_offset_lower_relevance() {
        let memories = vec![memory(0.6, 10, ci_types::ObservationCategory::Decision)];
        let filtered = filter_by_combined_score(memories, ConfidenceLevel::Medium);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn post_tool_use_context_prefixes_gotchas() {
        let memories = vec![memory(0.8, 8, ci_types::ObservationCategory::Gotcha)];
        let rendered = render_post_tool_use_context(&memories);
        assert!(rendered.starts_with("- ⚠️ "));
    }
}
