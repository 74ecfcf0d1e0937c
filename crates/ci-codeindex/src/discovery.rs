use std::path::{Path, PathBuf};

use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;

use crate::error::Result;

/// Directories pruned regardless of `.gitignore` contents.
const BUILTIN_IGNORES: &[&str] = &[
    ".git", "node_modules", "target", "dist", "build", ".venv", "venv", "__pycache__", ".oak",
];

/// Filenames never indexed even if not excluded by an ignore pattern.
const SENSITIVE_FILENAMES: &[&str] = &[".env", "credentials.json", "secrets.json", "id_rsa", "id_ed25519"];

/// Globs matched against the filename for the sensitive-file reject list.
const SENSITIVE_GLOBS: &[&str] = &["*.key", "*.pem", "*.p12", "*.pfx", "*_rsa", ".env.*"];

pub struct Discovery {
    root: PathBuf,
    user_patterns: Vec<String>,
}

impl Discovery {
    pub fn new(root: impl Into<PathBuf>, user_patterns: Vec<String>) -> Self {
        Self { root: root.into(), user_patterns }
    }

    /// Walks the project root, honoring `.gitignore` (re-read from disk on
    /// every call, so edits take effect without restarting the daemon),
    /// built-in directory prunes, and user-supplied ignore patterns.
    /// Symlinks are never followed, and any resolved path that escapes the
    /// project root is skipped rather than indexed.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let canonical_root = self.root.canonicalize()?;

        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in BUILTIN_IGNORES.iter() {
            let _ = overrides.add(&format!("!{}", pattern));
            let _ = overrides.add(&format!("!{}/**", pattern));
        }
        for pattern in &self.user_patterns {
            let _ = overrides.add(&format!("!{}", pattern));
        }
        let overrides = overrides.build().map_err(|e| crate::error::Error::Io(std::io::Error::other(e)))?;

        let walker = WalkBuilder::new(&self.root)
            .follow_links(false)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(false)
            .overrides(overrides)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let path = entry.path();
            if is_sensitive(path) {
                continue;
            }
            if !is_within_root(path, &canonical_root) {
                continue;
            }
            files.push(path.to_path_buf());
        }
        Ok(files)
    }
}

fn is_sensitive(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if SENSITIVE_FILENAMES.contains(&name) {
        return true;
    }
    SENSITIVE_GLOBS.iter().any(|glob| glob_match(glob, name))
}

/// Minimal `*`-only glob matcher, sufficient for the fixed sensitive-file list.
fn glob_match(glob: &str, name: &str) -> bool {
    match glob.split_once('*') {
        Some((prefix, suffix)) => name.starts_with(prefix) && name.ends_with(suffix) && name.len() >= prefix.len() + suffix.len(),
        None => glob == name,
    }
}

fn is_within_root(path: &Path, canonical_root: &Path) -> bool {
    match path.canonicalize() {
        Ok(resolved) => resolved.starts_with(canonical_root),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_source_files_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("built.rs"), "// built").unwrap();

        let discovery = Discovery::new(dir.path(), vec![]);
        let files = discovery.discover().unwrap();

        assert!(files.iter().any(|f| f.ends_with("main.rs")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("target")));
    }

    #[test]
    fn rejects_sensitive_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        fs::write(dir.path().join("id_rsa"), "---").unwrap();
        fs::write(dir.path().join("app.rs"), "fn main() {}").unwrap();

        let discovery = Discovery::new(dir.path(), vec![]);
        let files = discovery.discover().unwrap();

        assert!(files.iter().any(|f| f.ends_with("app.rs")));
        assert!(!files.iter().any(|f| f.ends_with(".env")));
        assert!(!files.iter().any(|f| f.ends_with("id_rsa")));
    }

    #[test]
    fn honors_gitignore_and_rereads_it_live() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.rs"), "fn keep() {}").unwrap();
        fs::write(dir.path().join("skip.rs"), "fn skip() {}").unwrap();
        fs::write(dir.path().join(".gitignore"), "skip.rs\n").unwrap();

        let discovery = Discovery::new(dir.path(), vec![]);
        let files = discovery.discover().unwrap();
        assert!(files.iter().any(|f| f.ends_with("keep.rs")));
        assert!(!files.iter().any(|f| f.ends_with("skip.rs")));

        fs::write(dir.path().join(".gitignore"), "\n").unwrap();
        let files = discovery.discover().unwrap();
        assert!(files.iter().any(|f| f.ends_with("skip.rs")));
    }

    #[test]
    fn honors_user_supplied_ignore_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.rs"), "fn main() {}").unwrap();
        fs::create_dir(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor").join("lib.rs"), "// vendored").unwrap();

        let discovery = Discovery::new(dir.path(), vec!["vendor/".to_string()]);
        let files = discovery.discover().unwrap();
        assert!(files.iter().any(|f| f.ends_with("app.rs")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("vendor")));
    }
}
