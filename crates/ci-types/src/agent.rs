use serde::{Deserialize, Serialize};

/// The AI coding assistant a session originated from.
///
/// Every hook request carries one of these (or `Unknown` for an agent the
/// daemon has no manifest for yet); it selects which `AgentManifest` is
/// consulted for plan directories, transcript paths, and hook-output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Agent {
    Claude,
    Cursor,
    Copilot,
    Codex,
    Gemini,
    Windsurf,
    Unknown,
}

impl Agent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::Claude => "claude",
            Agent::Cursor => "cursor",
            Agent::Copilot => "copilot",
            Agent::Codex => "codex",
            Agent::Gemini => "gemini",
            Agent::Windsurf => "windsurf",
            Agent::Unknown => "unknown",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "claude" | "claude_code" | "claude-code" => Agent::Claude,
            "cursor" => Agent::Cursor,
            "copilot" | "github_copilot" => Agent::Copilot,
            "codex" => Agent::Codex,
            "gemini" | "gemini_cli" => Agent::Gemini,
            "windsurf" => Agent::Windsurf,
            _ => Agent::Unknown,
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
