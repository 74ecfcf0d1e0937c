use std::path::Path;

use ci_core::hash::chunk_id;
use ci_types::{ChunkType, CodeChunk};

use crate::language::{detect_language, family_for, LanguageFamily};

pub const DEFAULT_CHUNK_LINES: usize = 100;
pub const DEFAULT_CHUNK_OVERLAP: usize = 10;
/// ~4096-token context at ~0.75 chars/token, the fallback when the
/// embedding provider doesn't report a context length.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 3072;
const CHARS_PER_TOKEN: f64 = 0.75;

pub fn max_chunk_chars_for_context(context_length: Option<u32>) -> usize {
    match context_length {
        Some(tokens) if tokens > 0 => (tokens as f64 * CHARS_PER_TOKEN) as usize,
        _ => DEFAULT_MAX_CHUNK_CHARS,
    }
}

pub struct ChunkerConfig {
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { chunk_lines: DEFAULT_CHUNK_LINES, chunk_overlap: DEFAULT_CHUNK_OVERLAP, max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS }
    }
}

pub fn chunk_file(path: &Path, content: &str, config: &ChunkerConfig) -> Vec<CodeChunk> {
    let language = detect_language(path);
    let filepath = path.to_string_lossy().to_string();

    let raw_chunks = match language.map(family_for) {
        Some(LanguageFamily::Brace) => brace_chunks(&filepath, content, language.unwrap()),
        Some(LanguageFamily::Indent) => indent_chunks(&filepath, content, language.unwrap()),
        _ => line_chunks(&filepath, content, language, config.chunk_lines, config.chunk_overlap),
    };

    raw_chunks.into_iter().flat_map(|chunk| split_if_oversized(chunk, config)).collect()
}

fn make_chunk(
    filepath: &str,
    language: Option<&str>,
    chunk_type: ChunkType,
    name: Option<String>,
    start_line: u32,
    end_line: u32,
    content: String,
    signature: Option<String>,
) -> CodeChunk {
    let id = chunk_id(Path::new(filepath), start_line, &content);
    CodeChunk {
        id,
        filepath: filepath.to_string(),
        language: language.map(str::to_string),
        chunk_type,
        name,
        start_line,
        end_line,
        content,
        parent_id: None,
        docstring: None,
        signature,
    }
}

/// Generic fallback: fixed-size overlapping line windows. Used for
/// unsupported languages (Markdown, YAML, JSON, TOML, shell scripts, …).
fn line_chunks(filepath: &str, content: &str, language: Option<&str>, chunk_lines: usize, overlap: usize) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let step = chunk_lines.saturating_sub(overlap).max(1);

    while start < lines.len() {
        let end = (start + chunk_lines).min(lines.len());
        let body = lines[start..end].join("\n");
        chunks.push(make_chunk(filepath, language, ChunkType::Module, None, (start + 1) as u32, end as u32, body, None));
        if end == lines.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Regex-free signature sniffing for curly-brace languages: find a line
/// that looks like a definition header, then track brace depth from that
/// line until it returns to zero. Everything not captured by a definition
/// (imports, top-level statements) is folded into one leading module chunk.
fn brace_chunks(filepath: &str, content: &str, language: &str) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    let mut i = 0usize;
    let mut prologue_end: Option<usize> = None;
    let mut consumed = vec![false; lines.len()];

    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        if let Some((chunk_type, name)) = brace_signature(trimmed, language) {
            if !lines[i].contains('{') && i + 1 < lines.len() {
                // signature and opening brace on separate lines (common in C/Java style)
            }
            let depth_start = i;
            let mut depth = 0i32;
            let mut seen_open = false;
            let mut j = i;
            while j < lines.len() {
                for ch in lines[j].chars() {
                    match ch {
                        '{' => {
                            depth += 1;
                            seen_open = true;
                        }
                        '}' => depth -= 1,
                        _ => {}
                    }
                }
                if seen_open && depth <= 0 {
                    break;
                }
                j += 1;
            }
            let end = j.min(lines.len() - 1);
            for slot in consumed.iter_mut().take(end + 1).skip(depth_start) {
                *slot = true;
            }
            let body = lines[depth_start..=end].join("\n");
            chunks.push(make_chunk(
                filepath,
                Some(language),
                chunk_type,
                Some(name.clone()),
                (depth_start + 1) as u32,
                (end + 1) as u32,
                body,
                Some(trimmed.to_string()),
            ));
            if prologue_end.is_none() {
                prologue_end = Some(depth_start);
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }

    if chunks.is_empty() {
        return line_chunks(filepath, content, Some(language), DEFAULT_CHUNK_LINES, DEFAULT_CHUNK_OVERLAP);
    }

    let leading: Vec<&str> = lines.iter().enumerate().filter(|(idx, _)| !consumed[*idx]).map(|(_, l)| *l).collect();
    if !leading.is_empty() && leading.iter().any(|l| !l.trim().is_empty()) {
        let body = leading.join("\n");
        chunks.insert(0, make_chunk(filepath, Some(language), ChunkType::Module, None, 1, lines.len() as u32, body, None));
    }

    chunks
}

fn brace_signature(line: &str, language: &str) -> Option<(ChunkType, String)> {
    let keywords: &[(&str, ChunkType)] = match language {
        "rust" => &[("fn ", ChunkType::Function), ("struct ", ChunkType::Struct), ("enum ", ChunkType::Enum), ("trait ", ChunkType::Trait), ("impl ", ChunkType::Impl)],
        "go" => &[("func ", ChunkType::Function), ("type ", ChunkType::Type)],
        "java" | "csharp" | "kotlin" | "scala" => {
            &[("class ", ChunkType::Class), ("interface ", ChunkType::Interface), ("void ", ChunkType::Method), ("public ", ChunkType::Method), ("private ", ChunkType::Method)]
        }
        "javascript" | "typescript" => &[("function ", ChunkType::Function), ("class ", ChunkType::Class), ("interface ", ChunkType::Interface)],
        "c" | "cpp" => &[("struct ", ChunkType::Struct), ("class ", ChunkType::Class)],
        "swift" => &[("func ", ChunkType::Function), ("class ", ChunkType::Class), ("struct ", ChunkType::Struct), ("protocol ", ChunkType::Interface)],
        "php" => &[("function ", ChunkType::Function), ("class ", ChunkType::Class)],
        _ => &[],
    };

    for (keyword, chunk_type) in keywords {
        if let Some(rest) = line.strip_prefix(keyword) {
            let name = rest.split(|c: char| !(c.is_alphanumeric() || c == '_')).next().unwrap_or("").to_string();
            if !name.is_empty() {
                return Some((*chunk_type, name));
            }
        }
    }
    None
}

/// Indentation-based chunking for Python/Ruby: a `def`/`class` line opens a
/// block that runs until the next line at the same or lower indentation.
fn indent_chunks(filepath: &str, content: &str, language: &str) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let (def_keyword, class_keyword) = match language {
        "ruby" => ("def ", "class "),
        _ => ("def ", "class "),
    };

    let mut chunks = Vec::new();
    let mut consumed = vec![false; lines.len()];
    let mut i = 0usize;

    while i < lines.len() {
        let indent = indent_of(lines[i]);
        let trimmed = lines[i].trim_start();
        let header = if let Some(rest) = trimmed.strip_prefix(def_keyword) {
            Some((ChunkType::Function, rest))
        } else if let Some(rest) = trimmed.strip_prefix(class_keyword) {
            Some((ChunkType::Class, rest))
        } else {
            None
        };

        if let Some((chunk_type, rest)) = header {
            let name = rest.split(|c: char| !(c.is_alphanumeric() || c == '_')).next().unwrap_or("").to_string();
            let mut end = i;
            let mut j = i + 1;
            while j < lines.len() {
                if lines[j].trim().is_empty() {
                    end = j;
                    j += 1;
                    continue;
                }
                if indent_of(lines[j]) <= indent {
                    break;
                }
                end = j;
                j += 1;
            }
            for slot in consumed.iter_mut().take(end + 1).skip(i) {
                *slot = true;
            }
            let body = lines[i..=end].join("\n");
            if !name.is_empty() {
                chunks.push(make_chunk(filepath, Some(language), chunk_type, Some(name), (i + 1) as u32, (end + 1) as u32, body, Some(trimmed.to_string())));
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }

    if chunks.is_empty() {
        return line_chunks(filepath, content, Some(language), DEFAULT_CHUNK_LINES, DEFAULT_CHUNK_OVERLAP);
    }

    let leading: Vec<&str> = lines.iter().enumerate().filter(|(idx, _)| !consumed[*idx]).map(|(_, l)| *l).collect();
    if !leading.is_empty() && leading.iter().any(|l| !l.trim().is_empty()) {
        let body = leading.join("\n");
        chunks.insert(0, make_chunk(filepath, Some(language), ChunkType::Module, None, 1, lines.len() as u32, body, None));
    }

    chunks
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Splits a chunk whose content exceeds `max_chunk_chars` along line
/// boundaries, carrying the configured line overlap into each successor
/// and linking every piece back to the original chunk via `parent_id`.
fn split_if_oversized(chunk: CodeChunk, config: &ChunkerConfig) -> Vec<CodeChunk> {
    if chunk.content.len() <= config.max_chunk_chars {
        return vec![chunk];
    }

    let parent_id = chunk.id.clone();
    let lines: Vec<&str> = chunk.content.lines().collect();
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_chars = 0usize;
    let mut line_offset = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let line_chars = line.len() + 1;
        if current_chars + line_chars > config.max_chunk_chars && !current.is_empty() {
            let start_line = chunk.start_line as usize + line_offset;
            let end_line = start_line + current.len() - 1;
            let body = current.join("\n");
            let mut part = make_chunk(&chunk.filepath, chunk.language.as_deref(), chunk.chunk_type, chunk.name.clone(), start_line as u32, end_line as u32, body, chunk.signature.clone());
            part.parent_id = Some(parent_id.clone());
            parts.push(part);

            let overlap_lines = config.chunk_overlap.min(current.len());
            line_offset = end_line - chunk.start_line as usize + 1 - overlap_lines;
            current = current[current.len() - overlap_lines..].to_vec();
            current_chars = current.iter().map(|l| l.len() + 1).sum();
        }
        current.push(line);
        current_chars += line_chars;
        let _ = idx;
    }

    if !current.is_empty() {
        let start_line = chunk.start_line as usize + line_offset;
        let end_line = start_line + current.len() - 1;
        let body = current.join("\n");
        let mut part = make_chunk(&chunk.filepath, chunk.language.as_deref(), chunk.chunk_type, chunk.name.clone(), start_line as u32, end_line as u32, body, chunk.signature.clone());
        part.parent_id = Some(parent_id);
        parts.push(part);
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_rust_functions() {
        let content = "use std::io;\n\nfn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\nfn sub(a: i32, b: i32) -> i32 {\n    a - b\n}\n";
        let chunks = chunk_file(Path::new("src/math.rs"), content, &ChunkerConfig::default());
        let names: Vec<_> = chunks.iter().filter_map(|c| c.name.as_deref()).collect();
        assert!(names.contains(&"add"));
        assert!(names.contains(&"sub"));
    }

    #[test]
    fn chunks_python_defs_by_indent() {
        let content = "import os\n\ndef greet(name):\n    print(name)\n    return name\n\ndef farewell(name):\n    print(name)\n";
        let chunks = chunk_file(Path::new("app.py"), content, &ChunkerConfig::default());
        let names: Vec<_> = chunks.iter().filter_map(|c| c.name.as_deref()).collect();
        assert!(names.contains(&"greet"));
        assert!(names.contains(&"farewell"));
    }

    #[test]
    fn falls_back_to_line_chunking_for_unsupported_languages() {
        let content = (0..250).map(|n| format!("line {}", n)).collect::<Vec<_>>().join("\n");
        let chunks = chunk_file(Path::new("README.md"), &content, &ChunkerConfig::default());
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chunk_type == ChunkType::Module));
    }

    #[test]
    fn chunk_ids_are_stable_across_rechunking() {
        let content = "fn main() {\n    println!(\"hi\");\n}\n";
        let first = chunk_file(Path::new("src/main.rs"), content, &ChunkerConfig::default());
        let second = chunk_file(Path::new("src/main.rs"), content, &ChunkerConfig::default());
        assert_eq!(first.iter().map(|c| &c.id).collect::<Vec<_>>(), second.iter().map(|c| &c.id).collect::<Vec<_>>());
    }

    #[test]
    fn splits_oversized_chunks_preserving_overlap() {
        let config = ChunkerConfig { chunk_lines: DEFAULT_CHUNK_LINES, chunk_overlap: 2, max_chunk_chars: 50 };
        let lines: Vec<String> = (0..20).map(|n| format!("statement number {:02};", n)).collect();
        let content = lines.join("\n");
        let chunks = chunk_file(Path::new("notes.md"), &content, &config);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.len() <= config.max_chunk_chars || c.content.lines().count() == 1));
    }

    #[test]
    fn max_chunk_chars_derives_from_context_length_when_known() {
        assert_eq!(max_chunk_chars_for_context(Some(4096)), 3072);
        assert_eq!(max_chunk_chars_for_context(None), DEFAULT_MAX_CHUNK_CHARS);
    }
}
