use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::Agent;
use crate::session::ParentSessionReason;

/// A hook body as it arrives over HTTP: an open JSON object, since every
/// agent shapes its payload slightly differently. `ci-runtime` promotes
/// this into a `HookRequest` variant before anything downstream touches it,
/// so no other crate ever matches on raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHookBody {
    pub session_id: String,
    pub agent: Option<String>,
    pub cwd: Option<String>,
    #[serde(flatten)]
    pub rest: Value,
}

/// One normalized hook event, dispatched to the matching handler.
///
/// `hook_origin` carries the raw hook name the agent reported (e.g.
/// `"PreToolUse"`), kept alongside the variant tag since a few agents pack
/// more than one of our variants under the same wire name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum HookRequest {
    PromptSubmit {
        session_id: String,
        agent: Agent,
        cwd: String,
        prompt: String,
        generation_id: Option<String>,
        transcript_path: Option<String>,
        hook_origin: Option<String>,
    },
    PreToolUse {
        session_id: String,
        agent: Agent,
        tool_name: String,
        tool_input: Value,
        tool_use_id: Option<String>,
        hook_origin: Option<String>,
    },
    PostToolUse {
        session_id: String,
        agent: Agent,
        tool_name: String,
        tool_input: Value,
        tool_output: Value,
        duration_ms: Option<u64>,
        tool_use_id: Option<String>,
        hook_origin: Option<String>,
    },
    PostToolUseFailure {
        session_id: String,
        agent: Agent,
        tool_name: String,
        tool_input: Value,
        error: String,
        tool_use_id: Option<String>,
        hook_origin: Option<String>,
    },
    SessionStart {
        session_id: String,
        agent: Agent,
        cwd: String,
        parent_session_id: Option<String>,
        parent_session_reason: Option<ParentSessionReason>,
        hook_origin: Option<String>,
    },
    SessionEnd {
        session_id: String,
        agent: Agent,
        hook_origin: Option<String>,
    },
    BeforePrompt {
        session_id: String,
        agent: Agent,
        cwd: String,
        hook_origin: Option<String>,
    },
}

impl HookRequest {
    pub fn session_id(&self) -> &str {
        match self {
            HookRequest::PromptSubmit { session_id, .. }
            | HookRequest::PreToolUse { session_id, .. }
            | HookRequest::PostToolUse { session_id, .. }
            | HookRequest::PostToolUseFailure { session_id, .. }
            | HookRequest::SessionStart { session_id, .. }
            | HookRequest::SessionEnd { session_id, .. }
            | HookRequest::BeforePrompt { session_id, .. } => session_id,
        }
    }

    pub fn agent(&self) -> Agent {
        match self {
            HookRequest::PromptSubmit { agent, .. }
            | HookRequest::PreToolUse { agent, .. }
            | HookRequest::PostToolUse { agent, .. }
            | HookRequest::PostToolUseFailure { agent, .. }
            | HookRequest::SessionStart { agent, .. }
            | HookRequest::SessionEnd { agent, .. }
            | HookRequest::BeforePrompt { agent, .. } => *agent,
        }
    }

    pub fn hook_origin(&self) -> Option<&str> {
        match self {
            HookRequest::PromptSubmit { hook_origin, .. }
            | HookRequest::PreToolUse { hook_origin, .. }
            | HookRequest::PostToolUse { hook_origin, .. }
            | HookRequest::PostToolUseFailure { hook_origin, .. }
            | HookRequest::SessionStart { hook_origin, .. }
            | HookRequest::SessionEnd { hook_origin, .. }
            | HookRequest::BeforePrompt { hook_origin, .. } => hook_origin.as_deref(),
        }
    }

    /// The identity used for dedup-LRU keys: (hook kind, session, the parts
    /// of the payload that make two deliveries "the same event"). Prefers a
    /// stable id the agent handed us (`tool_use_id`, `generation_id`) over a
    /// hash of the payload, since agents sometimes redeliver a hook with a
    /// slightly different `tool_output` for the same logical call.
    pub fn dedupe_key(&self) -> String {
        match self {
            HookRequest::PromptSubmit { session_id, prompt, generation_id, .. } => {
                match generation_id {
                    Some(gen_id) => format!("prompt_submit:{session_id}:{gen_id}"),
                    None => format!("prompt_submit:{session_id}:{}", crate::util::truncate(prompt, 64)),
                }
            }
            HookRequest::PreToolUse { session_id, tool_name, tool_input, tool_use_id, .. } => {
                match tool_use_id {
                    Some(id) => format!("pre_tool_use:{session_id}:{id}"),
                    None => format!("pre_tool_use:{session_id}:{tool_name}:{}", tool_input),
                }
            }
            HookRequest::PostToolUse { session_id, tool_name, tool_input, tool_use_id, .. } => {
                match tool_use_id {
                    Some(id) => format!("post_tool_use:{session_id}:{id}"),
                    None => format!("post_tool_use:{session_id}:{tool_name}:{}", tool_input),
                }
            }
            HookRequest::PostToolUseFailure { session_id, tool_name, tool_input, tool_use_id, .. } => {
                match tool_use_id {
                    Some(id) => format!("post_tool_use_failure:{session_id}:{id}"),
                    None => format!("post_tool_use_failure:{session_id}:{tool_name}:{}", tool_input),
                }
            }
            HookRequest::SessionStart { session_id, .. } => format!("session_start:{session_id}"),
            HookRequest::SessionEnd { session_id, .. } => format!("session_end:{session_id}"),
            HookRequest::BeforePrompt { session_id, .. } => format!("before_prompt:{session_id}"),
        }
    }
}

/// Response body returned from every hook route. `context` carries
/// retrieved memory/code snippets to inject; it is empty whenever retrieval
/// is skipped, fails, or is not applicable to the hook kind. `extra` holds
/// whatever top-level fields are specific to one hook (`prompt_batch_id`,
/// `hook_output`, `observations_captured`) — flattened into the same JSON
/// object rather than nested, so callers don't have to special-case a
/// wrapper key per hook kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResponse {
    pub status: HookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Ok,
    Denied,
    Deduplicated,
}

impl HookResponse {
    pub fn ok() -> Self {
        Self { status: HookStatus::Ok, context: None, message: None, extra: None }
    }

    pub fn ok_with_context(context: Value) -> Self {
        Self { status: HookStatus::Ok, context: Some(context), message: None, extra: None }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self { status: HookStatus::Denied, context: None, message: Some(message.into()), extra: None }
    }

    pub fn deduplicated() -> Self {
        Self { status: HookStatus::Deduplicated, context: None, message: None, extra: None }
    }

    /// Attaches hook-specific top-level fields, merging into any existing
    /// `extra` object rather than overwriting it.
    pub fn with_extra(mut self, fields: Value) -> Self {
        self.extra = Some(fields);
        self
    }
}
