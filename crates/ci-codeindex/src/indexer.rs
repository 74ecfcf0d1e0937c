use std::path::Path;
use std::sync::Arc;

use ci_llm::EmbeddingProvider;

use crate::chunker::{chunk_file, max_chunk_chars_for_context, ChunkerConfig};
use crate::discovery::Discovery;
use crate::error::Result;
use crate::store::{upsert_with_recovery, VectorStore};

/// Ties discovery, chunking, embedding, and storage together for a single
/// project root. The file watcher in the daemon runtime calls
/// [`Indexer::index_file`] for incremental updates; a cold start calls
/// [`Indexer::index_project`] once.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: ChunkerConfig,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>, context_length: Option<u32>) -> Self {
        let config = ChunkerConfig { max_chunk_chars: max_chunk_chars_for_context(context_length), ..ChunkerConfig::default() };
        Self { embedder, store, config }
    }

    pub async fn index_project(&self, root: &Path, user_ignore_patterns: Vec<String>) -> Result<usize> {
        let discovery = Discovery::new(root, user_ignore_patterns);
        let files = discovery.discover()?;
        let mut indexed = 0;
        for file in files {
            indexed += self.index_file(&file).await?;
        }
        Ok(indexed)
    }

    /// Re-chunks and re-embeds a single file, replacing any chunks
    /// previously stored for it. Called on create/modify events; callers
    /// should call [`Indexer::remove_file`] directly on delete events.
    pub async fn index_file(&self, path: &Path) -> Result<usize> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => return Ok(0), // binary or unreadable; skip rather than fail the whole pass
        };

        let chunks = chunk_file(path, &content, &self.config);
        if chunks.is_empty() {
            return Ok(0);
        }

        let filepath = path.to_string_lossy().to_string();
        self.store.delete_by_filepath(&filepath)?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embedded = self.embedder.embed(&texts).await?;

        for (chunk, vector) in chunks.iter().zip(embedded.vectors.iter()) {
            upsert_with_recovery(self.store.as_ref(), chunk, vector)?;
        }
        Ok(chunks.len())
    }

    pub fn remove_file(&self, path: &Path) -> Result<usize> {
        self.store.delete_by_filepath(&path.to_string_lossy())
    }
}
