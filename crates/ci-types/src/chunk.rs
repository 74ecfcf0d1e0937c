use serde::{Deserialize, Serialize};

/// The kind of syntactic unit a chunk represents. `Module` is the fallback
/// for line-chunked (unsupported-language) content and whole-file chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Module,
    Function,
    Class,
    Method,
    Struct,
    Enum,
    Trait,
    Impl,
    Interface,
    Property,
    Constructor,
    Type,
}

impl ChunkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkType::Module => "module",
            ChunkType::Function => "function",
            ChunkType::Class => "class",
            ChunkType::Method => "method",
            ChunkType::Struct => "struct",
            ChunkType::Enum => "enum",
            ChunkType::Trait => "trait",
            ChunkType::Impl => "impl",
            ChunkType::Interface => "interface",
            ChunkType::Property => "property",
            ChunkType::Constructor => "constructor",
            ChunkType::Type => "type",
        }
    }
}

/// One unit of source code indexed for semantic search.
///
/// Invariant: `id` is derived from a content hash of `(filepath, start_line,
/// content)`, so re-indexing an unchanged region upserts rather than
/// duplicating, and a changed region gets a new id (the old one is deleted
/// by the indexer's by-filepath sweep).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub filepath: String,
    pub language: Option<String>,
    pub chunk_type: ChunkType,
    pub name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub parent_id: Option<String>,
    pub docstring: Option<String>,
    pub signature: Option<String>,
}

impl CodeChunk {
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}
