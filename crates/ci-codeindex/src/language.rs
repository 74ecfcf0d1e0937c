/// The chunker treats languages in families: C-style brace languages get a
/// brace-depth heuristic, indent languages get an indent heuristic, and
/// everything else (including file types with no AST-ish structure, like
/// Markdown or YAML) falls back to the generic line-chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageFamily {
    Brace,
    Indent,
    Flat,
}

pub fn detect_language(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "rs" => "rust",
        "java" => "java",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "md" | "markdown" => "markdown",
        "yml" | "yaml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "sh" | "bash" | "zsh" => "shell",
        _ => return None,
    })
}

pub fn family_for(language: &str) -> LanguageFamily {
    match language {
        "rust" | "javascript" | "typescript" | "go" | "java" | "c" | "cpp" | "csharp" | "swift" | "kotlin" | "scala" | "php" => {
            LanguageFamily::Brace
        }
        "python" | "ruby" => LanguageFamily::Indent,
        _ => LanguageFamily::Flat,
    }
}
