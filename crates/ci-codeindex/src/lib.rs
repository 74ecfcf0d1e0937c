pub mod chunker;
mod discovery;
pub mod error;
mod indexer;
mod language;
mod store;

pub use chunker::{chunk_file, ChunkerConfig, DEFAULT_CHUNK_LINES, DEFAULT_CHUNK_OVERLAP, DEFAULT_MAX_CHUNK_CHARS};
pub use discovery::Discovery;
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use language::{detect_language, family_for, LanguageFamily};
pub use store::{upsert_with_recovery, ScoredChunk, SqliteVectorStore, VectorStore};
