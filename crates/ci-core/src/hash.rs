use sha2::{Digest, Sha256};
use std::path::Path;

/// SHA256 hex digest of an arbitrary byte string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Content hash for a `PromptBatch`/`Activity`/`StoredObservation` row:
/// joins the given fields with a separator byte not expected in any of
/// them, so `("a", "bc")` and `("ab", "c")` never collide.
pub fn content_hash(parts: &[&str]) -> String {
    let joined = parts.join("\u{1f}");
    sha256_hex(joined.as_bytes())
}

const CHUNK_HASH_PREFIX_LEN: usize = 12;

/// Content-derived chunk id: `{filepath}:{start_line}:{content hash prefix}`.
/// Stable across re-chunking runs as long as the chunk's filepath, starting
/// line, and content are unchanged; a changed region gets a new id.
pub fn chunk_id(filepath: &Path, start_line: u32, content: &str) -> String {
    let digest = sha256_hex(content.as_bytes());
    format!("{}:{}:{}", filepath.to_string_lossy(), start_line, &digest[..CHUNK_HASH_PREFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn same_input_same_hash() {
        assert_eq!(content_hash(&["a", "b"]), content_hash(&["a", "b"]));
    }

    #[test]
    fn different_split_different_hash() {
        assert_ne!(content_hash(&["a", "bc"]), content_hash(&["ab", "c"]));
    }

    #[test]
    fn chunk_id_stable_for_unchanged_content() {
        let path = Path::new("src/main.rs");
        assert_eq!(chunk_id(path, 10, "fn main() {}"), chunk_id(path, 10, "fn main() {}"));
    }

    #[test]
    fn chunk_id_changes_with_content() {
        let path = Path::new("src/main.rs");
        assert_ne!(chunk_id(path, 10, "fn main() {}"), chunk_id(path, 10, "fn main() {} "));
    }
}
