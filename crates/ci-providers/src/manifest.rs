use std::path::{Path, PathBuf};

use ci_types::Agent;
use regex::Regex;
use serde_json::{json, Value};

/// Everything the rest of the daemon needs to know about one agent's
/// conventions: where it keeps plan documents, where its transcripts live,
/// how to recognize an inline plan in a response, and how to shape a hook
/// response so the agent's own client renders it correctly.
///
/// One implementation per `Agent` variant, looked up through a
/// `ManifestRegistry` rather than matched on inline — adding a seventh
/// agent means adding one impl and one registry entry, not touching every
/// call site.
pub trait AgentManifest: Send + Sync {
    fn agent(&self) -> Agent;

    /// Directories (relative to the project root, and optionally under the
    /// user's home directory) where this agent's plan documents live.
    fn plan_dirs(&self, project_root: &Path) -> Vec<PathBuf>;

    /// Path to this agent's transcript file for a session, if the agent
    /// exposes one on disk (not all do).
    fn transcript_path(&self, project_root: &Path, session_id: &str) -> Option<PathBuf>;

    /// Regexes matched against assistant response text to catch a plan
    /// proposed inline rather than written to a plan file.
    fn plan_response_patterns(&self) -> &[Regex];

    /// Shape a hook's injected-context payload the way this agent's client
    /// expects it (some agents want a flat string, others a structured
    /// object under a specific key).
    fn shape_hook_output(&self, context: &Value) -> Value {
        json!({ "context": context })
    }
}

macro_rules! simple_manifest {
    ($name:ident, $agent:expr, $project_dir:expr, $home_dir:expr, $transcript_rel:expr, $patterns:expr) => {
        pub struct $name {
            patterns: Vec<Regex>,
        }

        impl $name {
            pub fn new() -> Self {
                Self { patterns: $patterns.iter().map(|p: &&str| Regex::new(p).unwrap()).collect() }
            }
        }

        impl AgentManifest for $name {
            fn agent(&self) -> Agent {
                $agent
            }

            fn plan_dirs(&self, project_root: &Path) -> Vec<PathBuf> {
                let mut dirs = vec![project_root.join($project_dir)];
                if let Some(home) = dirs::home_dir() {
                    dirs.push(home.join($home_dir));
                }
                dirs
            }

            fn transcript_path(&self, project_root: &Path, session_id: &str) -> Option<PathBuf> {
                let rel: &str = $transcript_rel;
                if rel.is_empty() {
                    return None;
                }
                Some(project_root.join(rel.replace("{session_id}", session_id)))
            }

            fn plan_response_patterns(&self) -> &[Regex] {
                &self.patterns
            }
        }
    };
}

simple_manifest!(
    ClaudeManifest,
    Agent::Claude,
    ".claude/plans",
    ".claude/plans",
    ".claude/projects/{session_id}/transcript.jsonl",
    ["(?i)^#+\\s*plan\\b", "(?i)\\bhere'?s my plan\\b"]
);

simple_manifest!(
    CursorManifest,
    Agent::Cursor,
    ".cursor/plans",
    ".cursor/plans",
    "",
    ["(?i)^#+\\s*plan\\b"]
);

simple_manifest!(
    CopilotManifest,
    Agent::Copilot,
    ".github/copilot/plans",
    ".copilot/plans",
    "",
    ["(?i)^#+\\s*plan\\b"]
);

simple_manifest!(
    CodexManifest,
    Agent::Codex,
    ".codex/plans",
    ".codex/plans",
    ".codex/sessions/{session_id}.jsonl",
    ["(?i)^#+\\s*plan\\b", "(?i)\\bproposed plan\\b"]
);

simple_manifest!(
    GeminiManifest,
    Agent::Gemini,
    ".gemini/plans",
    ".gemini/plans",
    ".gemini/tmp/{session_id}/logs.json",
    ["(?i)^#+\\s*plan\\b"]
);

simple_manifest!(
    WindsurfManifest,
    Agent::Windsurf,
    ".windsurf/plans",
    ".windsurf/plans",
    "",
    ["(?i)^#+\\s*plan\\b"]
);

/// Fallback for an agent with no registered manifest: no plan dirs, no
/// transcript, a single generic plan-heading heuristic.
pub struct UnknownManifest {
    patterns: Vec<Regex>,
}

impl UnknownManifest {
    pub fn new() -> Self {
        Self { patterns: vec![Regex::new(r"(?i)^#+\s*plan\b").unwrap()] }
    }
}

impl AgentManifest for UnknownManifest {
    fn agent(&self) -> Agent {
        Agent::Unknown
    }

    fn plan_dirs(&self, _project_root: &Path) -> Vec<PathBuf> {
        Vec::new()
    }

    fn transcript_path(&self, _project_root: &Path, _session_id: &str) -> Option<PathBuf> {
        None
    }

    fn plan_response_patterns(&self) -> &[Regex] {
        &self.patterns
    }
}
