use std::collections::HashMap;

use ci_types::Agent;

use crate::manifest::{
    AgentManifest, ClaudeManifest, CodexManifest, CopilotManifest, CursorManifest,
    GeminiManifest, UnknownManifest, WindsurfManifest,
};

/// Holds one `AgentManifest` per known agent, built once at daemon startup
/// and reused for the life of the process (constructor-injected into
/// whatever needs it, rather than a bare module-level global, per the
/// daemon's preference for explicit ownership over static singletons).
pub struct ManifestRegistry {
    manifests: HashMap<Agent, Box<dyn AgentManifest>>,
    fallback: Box<dyn AgentManifest>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        let mut manifests: HashMap<Agent, Box<dyn AgentManifest>> = HashMap::new();
        manifests.insert(Agent::Claude, Box::new(ClaudeManifest::new()));
        manifests.insert(Agent::Cursor, Box::new(CursorManifest::new()));
        manifests.insert(Agent::Copilot, Box::new(CopilotManifest::new()));
        manifests.insert(Agent::Codex, Box::new(CodexManifest::new()));
        manifests.insert(Agent::Gemini, Box::new(GeminiManifest::new()));
        manifests.insert(Agent::Windsurf, Box::new(WindsurfManifest::new()));
        Self { manifests, fallback: Box::new(UnknownManifest::new()) }
    }

    pub fn get(&self, agent: Agent) -> &dyn AgentManifest {
        self.manifests
            .get(&agent)
            .map(|b| b.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

impl Default for ManifestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_agent_resolves_to_its_own_manifest() {
        let registry = ManifestRegistry::new();
        for agent in [
            Agent::Claude,
            Agent::Cursor,
            Agent::Copilot,
            Agent::Codex,
            Agent::Gemini,
            Agent::Windsurf,
        ] {
            assert_eq!(registry.get(agent).agent(), agent);
        }
    }

    #[test]
    fn unknown_agent_falls_back() {
        let registry = ManifestRegistry::new();
        assert_eq!(registry.get(Agent::Unknown).agent(), Agent::Unknown);
    }
}
