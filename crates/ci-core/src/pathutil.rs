use std::path::{Path, PathBuf};

/// Resolve a path to an absolute, canonical form for use as a stable
/// identity (port derivation, project root comparison). Falls back to a
/// best-effort absolute path when canonicalization fails (path does not
/// exist yet).
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_path_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let normalized = normalize_path(Path::new("."));
        assert_eq!(normalized, cwd.canonicalize().unwrap());
    }
}
