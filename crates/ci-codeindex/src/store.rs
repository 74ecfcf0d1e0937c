use std::path::Path;
use std::sync::Mutex;

use ci_types::{ChunkType, CodeChunk};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: CodeChunk,
    pub score: f32,
}

/// Storage backend for embedded code chunks. Kept behind a trait so a real
/// ANN index can replace the brute-force SQLite default without touching
/// callers in `ci-engine`.
pub trait VectorStore: Send + Sync {
    /// Returns `Error::DimensionMismatch` if the store already holds
    /// vectors of a different width; callers should recover via
    /// [`upsert_with_recovery`] rather than recreating the store themselves.
    fn upsert(&self, chunk: &CodeChunk, embedding: &[f32]) -> Result<()>;
    fn delete_by_filepath(&self, filepath: &str) -> Result<usize>;
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;
    fn count(&self) -> Result<usize>;
    fn dimensions(&self) -> Result<Option<usize>>;
    /// Drops every stored chunk so a new embedding dimension can take over.
    fn recreate(&self) -> Result<()>;
}

/// Upserts a chunk, and on a dimension mismatch (the embedding provider's
/// width changed since the store was last written) recreates the
/// collection and retries exactly once before giving up.
pub fn upsert_with_recovery(store: &dyn VectorStore, chunk: &CodeChunk, embedding: &[f32]) -> Result<()> {
    match store.upsert(chunk, embedding) {
        Err(Error::DimensionMismatch { .. }) => {
            store.recreate()?;
            store.upsert(chunk, embedding)
        }
        other => other,
    }
}

/// Default `VectorStore`: one SQLite table, brute-force cosine similarity
/// computed in Rust over every stored vector. Fine at the scale of a single
/// project's codebase; not meant to compete with a real ANN index.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    filepath TEXT NOT NULL,
    language TEXT,
    chunk_type TEXT NOT NULL,
    name TEXT,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    parent_id TEXT,
    docstring TEXT,
    signature TEXT,
    dims INTEGER NOT NULL,
    vector BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunks_filepath ON chunks(filepath);
";

impl SqliteVectorStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn chunk_type_str(chunk_type: ChunkType) -> &'static str {
    chunk_type.as_str()
}

fn chunk_type_from_str(value: &str) -> ChunkType {
    match value {
        "function" => ChunkType::Function,
        "class" => ChunkType::Class,
        "method" => ChunkType::Method,
        "struct" => ChunkType::Struct,
        "enum" => ChunkType::Enum,
        "trait" => ChunkType::Trait,
        "impl" => ChunkType::Impl,
        "interface" => ChunkType::Interface,
        "property" => ChunkType::Property,
        "constructor" => ChunkType::Constructor,
        "type" => ChunkType::Type,
        _ => ChunkType::Module,
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, chunk: &CodeChunk, embedding: &[f32]) -> Result<()> {
        if let Some(expected) = self.dimensions()? {
            if expected != embedding.len() {
                return Err(Error::DimensionMismatch { expected, got: embedding.len() });
            }
        }

        let conn = self.conn.lock().expect("vector store mutex poisoned");
        conn.execute(
            "INSERT INTO chunks (id, filepath, language, chunk_type, name, start_line, end_line, content, parent_id, docstring, signature, dims, vector)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                filepath = excluded.filepath, language = excluded.language, chunk_type = excluded.chunk_type,
                name = excluded.name, start_line = excluded.start_line, end_line = excluded.end_line,
                content = excluded.content, parent_id = excluded.parent_id, docstring = excluded.docstring,
                signature = excluded.signature, dims = excluded.dims, vector = excluded.vector",
            params![
                chunk.id,
                chunk.filepath,
                chunk.language,
                chunk_type_str(chunk.chunk_type),
                chunk.name,
                chunk.start_line,
                chunk.end_line,
                chunk.content,
                chunk.parent_id,
                chunk.docstring,
                chunk.signature,
                embedding.len() as i64,
                encode_vector(embedding),
            ],
        )?;
        Ok(())
    }

    fn delete_by_filepath(&self, filepath: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        let affected = conn.execute("DELETE FROM chunks WHERE filepath = ?1", params![filepath])?;
        Ok(affected)
    }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, filepath, language, chunk_type, name, start_line, end_line, content, parent_id, docstring, signature, vector FROM chunks",
        )?;
        let rows = stmt.query_map([], |row| {
            let vector_bytes: Vec<u8> = row.get(11)?;
            Ok((
                CodeChunk {
                    id: row.get(0)?,
                    filepath: row.get(1)?,
                    language: row.get(2)?,
                    chunk_type: chunk_type_from_str(&row.get::<_, String>(3)?),
                    name: row.get(4)?,
                    start_line: row.get(5)?,
                    end_line: row.get(6)?,
                    content: row.get(7)?,
                    parent_id: row.get(8)?,
                    docstring: row.get(9)?,
                    signature: row.get(10)?,
                },
                decode_vector(&vector_bytes),
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (chunk, vector) = row?;
            let score = cosine_similarity(query, &vector);
            scored.push(ScoredChunk { chunk, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> Result<Option<usize>> {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        let dims: Option<i64> = conn.query_row("SELECT dims FROM chunks LIMIT 1", [], |row| row.get(0)).optional()?;
        Ok(dims.map(|d| d as usize))
    }

    fn recreate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("vector store mutex poisoned");
        conn.execute_batch("DROP TABLE IF EXISTS chunks;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk(id: &str, filepath: &str) -> CodeChunk {
        CodeChunk {
            id: id.to_string(),
            filepath: filepath.to_string(),
            language: Some("rust".to_string()),
            chunk_type: ChunkType::Function,
            name: Some("sample".to_string()),
            start_line: 1,
            end_line: 3,
            content: "fn sample() {}".to_string(),
            parent_id: None,
            docstring: None,
            signature: None,
        }
    }

    #[test]
    fn upsert_then_search_finds_closest_vector() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0, 0.0]).unwrap();
        store.upsert(&sample_chunk("b", "src/b.rs"), &[0.0, 1.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.id, "a");
    }

    #[test]
    fn delete_by_filepath_removes_all_its_chunks() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0]).unwrap();
        store.upsert(&sample_chunk("a2", "src/a.rs"), &[0.0, 1.0]).unwrap();
        store.upsert(&sample_chunk("b", "src/b.rs"), &[1.0, 1.0]).unwrap();

        let deleted = store.delete_by_filepath("src/a.rs").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn dimension_mismatch_is_rejected_without_recovery_wrapper() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0, 0.0]).unwrap();

        let err = store.upsert(&sample_chunk("b", "src/b.rs"), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 2 }));
    }

    #[test]
    fn upsert_with_recovery_recreates_collection_once_on_mismatch() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0, 0.0]).unwrap();
        assert_eq!(store.dimensions().unwrap(), Some(3));

        upsert_with_recovery(&store, &sample_chunk("b", "src/b.rs"), &[1.0, 0.0]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.dimensions().unwrap(), Some(2));
    }

    #[test]
    fn upsert_is_idempotent_by_id() {
        let store = SqliteVectorStore::open_in_memory().unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0]).unwrap();
        store.upsert(&sample_chunk("a", "src/a.rs"), &[1.0, 0.0]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
