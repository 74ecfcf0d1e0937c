use std::path::Path;
use std::sync::Mutex;

use ci_types::{ObservationCategory, ObservationId};
use rusqlite::{params, Connection};

use crate::error::Result;

/// An embedded observation, ranked by a search. Mirrors `ci_codeindex`'s
/// `ScoredChunk` shape — same role (embedded row + cosine score), different
/// payload (a memory fact instead of a source chunk).
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub observation_id: ObservationId,
    pub text: String,
    pub category: ObservationCategory,
    pub importance: u8,
    pub score: f32,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memory_vectors (
    observation_id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL,
    dims INTEGER NOT NULL,
    vector BLOB NOT NULL
);
";

/// Vector index for `StoredObservation` text, separate from the code index
/// in `ci-codeindex` since the two collections are searched and scored
/// independently before `ci-engine::retrieval` merges the results.
pub struct MemoryVectorStore {
    conn: Mutex<Connection>,
}

impl MemoryVectorStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| crate::error::Error::Store(ci_store::Error::Io(e)))?;
        }
        let conn = Connection::open(path).map_err(ci_store::Error::Database)?;
        conn.execute_batch(SCHEMA).map_err(ci_store::Error::Database)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(ci_store::Error::Database)?;
        conn.execute_batch(SCHEMA).map_err(ci_store::Error::Database)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn upsert(&self, id: &ObservationId, text: &str, category: &ObservationCategory, importance: u8, embedding: &[f32]) -> Result<()> {
        let existing_dims = self.dimensions()?;
        if existing_dims.is_some_and(|d| d != embedding.len()) {
            self.recreate()?;
        }

        let conn = self.conn.lock().expect("memory vector store mutex poisoned");
        conn.execute(
            "INSERT INTO memory_vectors (observation_id, text, category, importance, dims, vector)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(observation_id) DO UPDATE SET
                text = excluded.text, category = excluded.category, importance = excluded.importance,
                dims = excluded.dims, vector = excluded.vector",
            params![id.as_str(), text, category_str(category), importance, embedding.len() as i64, encode_vector(embedding)],
        )
        .map_err(ci_store::Error::Database)?;
        Ok(())
    }

    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredMemory>> {
        let conn = self.conn.lock().expect("memory vector store mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT observation_id, text, category, importance, vector FROM memory_vectors")
            .map_err(ci_store::Error::Database)?;
        let rows = stmt
            .query_map([], |row| {
                let vector_bytes: Vec<u8> = row.get(4)?;
                Ok((
                    ObservationId::new(row.get::<_, String>(0)?),
                    row.get::<_, String>(1)?,
                    category_from_str(&row.get::<_, String>(2)?),
                    row.get::<_, i64>(3)? as u8,
                    decode_vector(&vector_bytes),
                ))
            })
            .map_err(ci_store::Error::Database)?;

        let mut scored = Vec::new();
        for row in rows {
            let (observation_id, text, category, importance, vector) = row.map_err(ci_store::Error::Database)?;
            let score = cosine_similarity(query, &vector);
            scored.push(ScoredMemory { observation_id, text, category, importance, score });
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("memory vector store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_vectors", [], |r| r.get(0)).map_err(ci_store::Error::Database)?;
        Ok(count as usize)
    }

    fn dimensions(&self) -> Result<Option<usize>> {
        use rusqlite::OptionalExtension;
        let conn = self.conn.lock().expect("memory vector store mutex poisoned");
        let dims: Option<i64> =
            conn.query_row("SELECT dims FROM memory_vectors LIMIT 1", [], |r| r.get(0)).optional().map_err(ci_store::Error::Database)?;
        Ok(dims.map(|d| d as usize))
    }

    fn recreate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("memory vector store mutex poisoned");
        conn.execute_batch("DROP TABLE IF EXISTS memory_vectors;").map_err(ci_store::Error::Database)?;
        conn.execute_batch(SCHEMA).map_err(ci_store::Error::Database)?;
        Ok(())
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
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

fn category_str(c: &ObservationCategory) -> String {
    match c {
        ObservationCategory::Decision => "decision".to_string(),
        ObservationCategory::Convention => "convention".to_string(),
        ObservationCategory::Gotcha => "gotcha".to_string(),
        ObservationCategory::Preference => "preference".to_string(),
        ObservationCategory::Todo => "todo".to_string(),
        ObservationCategory::Other(s) => format!("other:{s}"),
    }
}

fn category_from_str(s: &str) -> ObservationCategory {
    match s {
        "decision" => ObservationCategory::Decision,
        "convention" => ObservationCategory::Convention,
        "gotcha" => ObservationCategory::Gotcha,
        "preference" => ObservationCategory::Preference,
        "todo" => ObservationCategory::Todo,
        other => ObservationCategory::Other(other.strip_prefix("other:").unwrap_or(other).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_ranks_by_cosine_similarity() {
        let store = MemoryVectorStore::open_in_memory().unwrap();
        store.upsert(&ObservationId::new("o1"), "uses postgres", &ObservationCategory::Decision, 8, &[1.0, 0.0]).unwrap();
        store.upsert(&ObservationId::new("o2"), "unrelated", &ObservationCategory::Todo, 3, &[0.0, 1.0]).unwrap();

        let results = store.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].observation_id.as_str(), "o1");
    }

    #[test]
    fn dimension_change_recreates_collection() {
        let store = MemoryVectorStore::open_in_memory().unwrap();
        store.upsert(&ObservationId::new("o1"), "a", &ObservationCategory::Decision, 5, &[1.0, 0.0, 0.0]).unwrap();
        store.upsert(&ObservationId::new("o2"), "b", &ObservationCategory::Decision, 5, &[1.0, 0.0]).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
