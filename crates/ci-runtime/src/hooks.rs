use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use ci_core::redact::redact;
use ci_engine::{render_notify_context, render_post_tool_use_context, render_prompt_submit_context, SearchType};
use ci_providers::PlanDetector;
use ci_types::{
    Activity, ActivityId, ActivityKind, BatchId, BatchKind, BatchStatus, HookRequest, HookResponse,
    PromptBatch, Session, SessionId,
};
use serde_json::{json, Value};

use crate::governance::{self, Decision};
use crate::sanitize::{detect_failure, sanitize_tool_input};
use crate::state::AppState;

const REACTIVATION_WINDOW_SECS: i64 = 30;
const CONTINUATION_LABEL: &str = "[session continuation]";
/// How much of a transcript's last assistant turn is kept as `response_summary`.
const RESPONSE_SUMMARY_MAX_CHARS: usize = 400;

/// Every hook event an agent can deliver, under the single `/hooks/ci/`
/// prefix the agent-side adapters are configured against (spec §4.2).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hooks/ci/prompt-submit", post(prompt_submit))
        .route("/hooks/ci/pre-tool-use", post(pre_tool_use))
        .route("/hooks/ci/post-tool-use", post(post_tool_use))
        .route("/hooks/ci/post-tool-use-failure", post(post_tool_use_failure))
        .route("/hooks/ci/session-start", post(session_start))
        .route("/hooks/ci/session-end", post(session_end))
        .route("/hooks/ci/before-prompt", post(before_prompt))
}

pub async fn prompt_submit(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::PromptSubmit { session_id, agent, cwd, prompt, transcript_path, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to prompt_submit"));
    };

    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }

    let session_id = SessionId::new(session_id.clone());
    ensure_session(&state, &session_id, *agent);
    if let Err(err) = state.db.increment_session_prompt_count(&session_id) {
        tracing::warn!(%err, "failed to bump session prompt count");
    }

    if state.db.get_active_batch(&session_id).ok().flatten().is_some() {
        close_active_batch(&state, &session_id, transcript_path.as_deref());
    }

    let prompt_number = next_prompt_number(&state, &session_id);
    let batch_id = BatchId::new(format!("{session_id}-{prompt_number}"));
    let clean_prompt = redact(prompt);
    let content_hash = ci_core::hash::content_hash(&[session_id.as_str(), &prompt_number.to_string()]);

    let project_root = std::path::Path::new(cwd);
    let detector = PlanDetector::new(&state.manifests);
    let inline_plan = detector.detect_plan_in_response(*agent, &clean_prompt);
    let kind = classify_prompt(&clean_prompt, inline_plan.is_some());

    let batch = PromptBatch {
        id: batch_id.clone(),
        session_id: session_id.clone(),
        prompt_number,
        kind,
        status: BatchStatus::Active,
        prompt_text: clean_prompt.clone(),
        started_at: ci_types::util::now_rfc3339(),
        completed_at: None,
        processed: false,
        duration_ms: None,
        files_affected: Vec::new(),
        plan_embedded: false,
        source_plan_batch_id: None,
        plan_file_path: None,
        plan_content: None,
        response_summary: None,
        classification: None,
        content_hash,
    };
    if let Err(err) = state.db.upsert_batch(&batch) {
        tracing::warn!(%err, "failed to persist prompt batch");
    }

    if kind == BatchKind::Plan {
        let plan_file_path = detector.find_recent_plan_file(*agent, project_root);
        let content = inline_plan.or_else(|| plan_file_path.as_deref().and_then(|p| std::fs::read_to_string(p).ok()));
        if let Some(content) = content
            && let Err(err) = state.db.set_batch_plan_content(&batch_id, plan_file_path.as_deref().and_then(|p| p.to_str()), &content)
        {
            tracing::warn!(%err, "failed to record plan content for prompt-submit batch");
        }
    }

    let query = format!("{}\n{}", session_id.as_str(), clean_prompt);
    let context = match state.retrieval.search(&query, SearchType::All, 8).await {
        Ok(results) => {
            let rendered = render_prompt_submit_context(&results);
            (!rendered.is_empty()).then_some(rendered)
        }
        Err(err) => {
            tracing::warn!(%err, "retrieval search failed for prompt-submit");
            None
        }
    };

    let manifest = state.manifests.get(*agent);
    let hook_output = manifest.shape_hook_output(&json!({ "injected_context": context }));

    let response = HookResponse::ok_with_context(json!({ "injected_context": context }))
        .with_extra(json!({ "prompt_batch_id": batch_id.as_str(), "hook_output": hook_output }));
    Json(response)
}

pub async fn pre_tool_use(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::PreToolUse { session_id, tool_name, tool_input, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to pre_tool_use"));
    };

    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }

    let session_id = SessionId::new(session_id.clone());
    let config = state.config_snapshot();
    let decision = governance::evaluate(&config.governance, tool_name, tool_input);

    let batch_id = current_or_continuation_batch(&state, &session_id, &req);
    let activity = Activity {
        id: ActivityId::new(uuid::Uuid::new_v4().to_string()),
        session_id: session_id.clone(),
        batch_id: Some(batch_id),
        kind: ActivityKind::ToolUse,
        tool_name: Some(tool_name.clone()),
        summary: format!("calling {tool_name}"),
        detail: None,
        files_affected: Vec::new(),
        occurred_at: ci_types::util::now_rfc3339(),
        duration_ms: None,
        raw: sanitize_tool_input(tool_input),
    };
    queue_and_maybe_flush(&state, activity);
    if let Err(err) = state.db.increment_session_tool_count(&session_id) {
        tracing::warn!(%err, "failed to bump session tool count");
    }

    match decision {
        Decision::Allow => Json(HookResponse::ok()),
        Decision::Deny { reason } => {
            if let Err(err) = state.db.record_governance_decision(&session_id, tool_name, "deny", Some(&reason)) {
                tracing::warn!(%err, "failed to record governance decision");
            }
            Json(HookResponse::denied(reason))
        }
    }
}

pub async fn post_tool_use(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::PostToolUse { session_id, agent, tool_name, tool_input, tool_output, duration_ms, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to post_tool_use"));
    };

    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }

    let session_id = SessionId::new(session_id.clone());
    let output_text = canonicalize_output(tool_output);
    let failure = detect_failure(&output_text);

    let batch_id = current_or_continuation_batch(&state, &session_id, &req);
    let activity = Activity {
        id: ActivityId::new(uuid::Uuid::new_v4().to_string()),
        session_id: session_id.clone(),
        batch_id: Some(batch_id.clone()),
        kind: ActivityKind::ToolUse,
        tool_name: Some(tool_name.clone()),
        summary: redact(&failure.clone().unwrap_or_else(|| format!("{tool_name} completed"))),
        detail: Some(redact(&output_text)),
        files_affected: extract_touched_paths(tool_input),
        occurred_at: ci_types::util::now_rfc3339(),
        duration_ms: *duration_ms,
        raw: sanitize_tool_input(tool_input),
    };
    queue_and_maybe_flush(&state, activity);

    if matches!(tool_name.as_str(), "Write" | "Edit" | "MultiEdit") {
        consolidate_plan_write(&state, &session_id, &batch_id, *agent, tool_input);
    }

    let context = if matches!(tool_name.as_str(), "Read" | "Edit" | "Write") {
        let paths = extract_touched_paths(tool_input);
        let path = paths.first().cloned().unwrap_or_default();
        let query = format!("{path}\n{}", ci_types::util::truncate(&output_text, 400));
        match state.retrieval.search(&query, SearchType::Memory, 5).await {
            Ok(results) => {
                let rendered = render_post_tool_use_context(&results.memory);
                (!rendered.is_empty()).then_some(rendered)
            }
            Err(err) => {
                tracing::warn!(%err, "retrieval search failed for post-tool-use");
                None
            }
        }
    } else {
        None
    };

    let manifest = state.manifests.get(*agent);
    let hook_output = manifest.shape_hook_output(&json!({ "injected_context": context }));

    let response = HookResponse::ok_with_context(json!({ "observations_captured": 0, "injected_context": context }))
        .with_extra(json!({ "prompt_batch_id": batch_id.as_str(), "hook_output": hook_output }));
    Json(response)
}

pub async fn post_tool_use_failure(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::PostToolUseFailure { session_id, tool_name, tool_input, error, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to post_tool_use_failure"));
    };

    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }

    let session_id = SessionId::new(session_id.clone());
    let batch_id = current_or_continuation_batch(&state, &session_id, &req);
    let activity = Activity {
        id: ActivityId::new(uuid::Uuid::new_v4().to_string()),
        session_id,
        batch_id: Some(batch_id),
        kind: ActivityKind::ToolUseFailure,
        tool_name: Some(tool_name.clone()),
        summary: redact(error),
        detail: None,
        files_affected: extract_touched_paths(tool_input),
        occurred_at: ci_types::util::now_rfc3339(),
        duration_ms: None,
        raw: sanitize_tool_input(tool_input),
    };
    queue_and_maybe_flush(&state, activity);

    Json(HookResponse::ok())
}

pub async fn session_start(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::SessionStart { session_id, agent, cwd: _, parent_session_id, parent_session_reason, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to session_start"));
    };
    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }
    let session_id = SessionId::new(session_id.clone());
    ensure_session(&state, &session_id, *agent);

    if let (Some(parent_id), Some(reason)) = (parent_session_id, parent_session_reason)
        && let Err(err) = state.db.set_session_parent(&session_id, &SessionId::new(parent_id.clone()), *reason)
    {
        tracing::warn!(%err, "failed to record session parentage");
    }

    Json(HookResponse::ok())
}

pub async fn session_end(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::SessionEnd { session_id, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to session_end"));
    };
    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }
    let session_id = SessionId::new(session_id.clone());
    close_active_batch(&state, &session_id, None);
    if let Err(err) = state.db.mark_session_ended(&session_id) {
        tracing::warn!(%err, "failed to mark session ended");
    }
    Json(HookResponse::ok())
}

pub async fn before_prompt(State(state): State<AppState>, Json(req): Json<HookRequest>) -> Json<HookResponse> {
    let HookRequest::BeforePrompt { session_id, .. } = &req else {
        return Json(HookResponse::denied("wrong hook variant routed to before_prompt"));
    };
    if state.dedup.check_and_insert(req.dedupe_key()) {
        return Json(HookResponse::deduplicated());
    }
    let query = session_id.clone();
    let context = match state.retrieval.search(&query, SearchType::All, 5).await {
        Ok(results) => {
            let rendered = render_notify_context(&results);
            (!rendered.is_empty()).then_some(rendered)
        }
        Err(_) => None,
    };
    match context {
        Some(c) => Json(HookResponse::ok_with_context(json!({ "injected_context": c }))),
        None => Json(HookResponse::ok()),
    }
}

fn ensure_session(state: &AppState, session_id: &SessionId, agent: ci_types::Agent) {
    match state.db.get_session(session_id) {
        Ok(Some(existing)) => {
            if !existing.is_active() {
                let _ = state.db.mark_session_resumed_if_ended(session_id);
            }
        }
        Ok(None) => {
            let session = Session::new(session_id.clone(), state.project_root.clone(), agent, state.machine_id.clone());
            if let Err(err) = state.db.upsert_session(&session) {
                tracing::warn!(%err, "failed to create session");
            }
        }
        Err(err) => tracing::warn!(%err, "failed to look up session"),
    }
}

fn next_prompt_number(state: &AppState, session_id: &SessionId) -> u32 {
    state.db.batches_for_session(session_id).map(|batches| batches.len() as u32 + 1).unwrap_or(1)
}

/// Closes the session's active batch, first trying to parse a
/// `response_summary` out of the agent's transcript tail if one was
/// supplied — best-effort, since not every agent exposes a transcript path.
fn close_active_batch(state: &AppState, session_id: &SessionId, transcript_path: Option<&str>) {
    if let Ok(Some(active)) = state.db.get_active_batch(session_id)
        && let Some(path) = transcript_path
        && let Some(summary) = read_last_transcript_line(path)
        && let Err(err) = state.db.set_batch_response_summary(&active.id, &summary)
    {
        tracing::warn!(%err, "failed to record response summary");
    }
    let _ = state.db.complete_active_batch(session_id);
}

/// Reads the last non-empty line of a transcript file and truncates it to a
/// manageable summary. Transcripts are JSONL; rather than committing to one
/// agent's schema, this just keeps the raw line truncated, since the
/// extraction prompt treats it as prose context, not structured input.
fn read_last_transcript_line(path: &str) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let last = contents.lines().rev().find(|l| !l.trim().is_empty())?;
    let text = serde_json::from_str::<Value>(last)
        .ok()
        .and_then(|v| v.get("text").or_else(|| v.get("content")).and_then(|t| t.as_str().map(str::to_string)))
        .unwrap_or_else(|| last.to_string());
    Some(ci_types::util::truncate(&text, RESPONSE_SUMMARY_MAX_CHARS))
}

/// Chooses the batch a non-prompt-submit activity belongs to: the active
/// batch if there is one, otherwise a reactivated or freshly synthesized
/// continuation batch labeled `"[session continuation]"`.
fn current_or_continuation_batch(state: &AppState, session_id: &SessionId, _req: &HookRequest) -> BatchId {
    if let Ok(Some(active)) = state.db.get_active_batch(session_id) {
        return active.id;
    }

    let batches = state.db.batches_for_session(session_id).unwrap_or_default();
    if let Some(last) = batches.last()
        && let Some(completed_at) = &last.completed_at
        && within_reactivation_window(completed_at)
    {
        let mut reactivated = last.clone();
        reactivated.status = BatchStatus::Active;
        if state.db.upsert_batch(&reactivated).is_ok() {
            return reactivated.id;
        }
    }

    let prompt_number = batches.len() as u32 + 1;
    let batch_id = BatchId::new(format!("{session_id}-{prompt_number}"));
    let content_hash = ci_core::hash::content_hash(&[session_id.as_str(), &prompt_number.to_string()]);
    let synthetic = PromptBatch {
        id: batch_id.clone(),
        session_id: session_id.clone(),
        prompt_number,
        kind: BatchKind::System,
        status: BatchStatus::Active,
        prompt_text: CONTINUATION_LABEL.to_string(),
        started_at: ci_types::util::now_rfc3339(),
        completed_at: None,
        processed: false,
        duration_ms: None,
        files_affected: Vec::new(),
        plan_embedded: false,
        source_plan_batch_id: None,
        plan_file_path: None,
        plan_content: None,
        response_summary: None,
        classification: None,
        content_hash,
    };
    let _ = state.db.upsert_batch(&synthetic);
    batch_id
}

/// Plan-write consolidation: when a `Write`/`Edit`/`MultiEdit` call touches
/// a path under the agent's plan directories, fold that file's content into
/// the current batch. If the batch already carries different plan content
/// (the same file was written once already this turn, then revised by a
/// later tool call), the revision is split off into its own `DerivedPlan`
/// batch instead of overwriting the first version.
fn consolidate_plan_write(state: &AppState, session_id: &SessionId, batch_id: &BatchId, agent: ci_types::Agent, tool_input: &Value) {
    let project_root = state.project_root.as_path();
    let detector = PlanDetector::new(&state.manifests);

    let Some(path) = extract_touched_paths(tool_input).into_iter().find(|p| detector.detect(agent, project_root, std::path::Path::new(p))) else {
        return;
    };
    let Some(content) = detector.resolve_plan_content(agent, project_root, Some(std::path::Path::new(&path)), None) else {
        return;
    };

    let Ok(batches) = state.db.batches_for_session(session_id) else { return };
    let Some(batch) = batches.iter().find(|b| &b.id == batch_id) else { return };

    match &batch.plan_content {
        None => {
            if let Err(err) = state.db.set_batch_plan_content(batch_id, Some(path.as_str()), &content) {
                tracing::warn!(%err, "failed to consolidate plan write into batch");
            }
        }
        Some(existing) if existing != &content => {
            let derived_id = BatchId::new(format!("{batch_id}-derived-{}", batch.prompt_number));
            let derived = PromptBatch {
                id: derived_id,
                session_id: session_id.clone(),
                prompt_number: batch.prompt_number,
                kind: BatchKind::DerivedPlan,
                status: BatchStatus::Completed,
                prompt_text: format!("[plan revision] {path}"),
                started_at: ci_types::util::now_rfc3339(),
                completed_at: Some(ci_types::util::now_rfc3339()),
                processed: false,
                duration_ms: None,
                files_affected: vec![path.clone()],
                plan_embedded: true,
                source_plan_batch_id: Some(batch_id.clone()),
                plan_file_path: Some(path),
                plan_content: Some(content.clone()),
                response_summary: None,
                classification: None,
                content_hash: ci_core::hash::content_hash(&[session_id.as_str(), batch_id.as_str(), &content]),
            };
            if let Err(err) = state.db.upsert_batch(&derived) {
                tracing::warn!(%err, "failed to record derived plan batch");
            }
        }
        Some(_) => {}
    }
}

fn within_reactivation_window(completed_at: &str) -> bool {
    let Ok(completed) = chrono::DateTime::parse_from_rfc3339(completed_at) else { return false };
    let elapsed = chrono::Utc::now().signed_duration_since(completed.with_timezone(&chrono::Utc));
    elapsed.num_seconds() <= REACTIVATION_WINDOW_SECS
}

fn queue_and_maybe_flush(state: &AppState, activity: Activity) {
    match state.db.queue_activity(activity) {
        Ok(true) => {
            if let Err(err) = state.db.flush_activities() {
                tracing::warn!(%err, "failed to flush activity buffer");
            }
        }
        Ok(false) => {}
        Err(err) => tracing::warn!(%err, "failed to queue activity"),
    }
}

/// Known prompt-classification prefixes, matched in order; a prompt that is
/// itself (or embeds) a plan document takes priority over the prefix check,
/// since a plan can start with ordinary prose.
fn classify_prompt(prompt: &str, looks_like_plan: bool) -> BatchKind {
    let trimmed = prompt.trim_start();
    if looks_like_plan {
        BatchKind::Plan
    } else if trimmed.starts_with("[SYSTEM]") || trimmed.starts_with("[NOTIFICATION]") {
        BatchKind::AgentNotification
    } else {
        BatchKind::UserPrompt
    }
}

fn canonicalize_output(tool_output: &Value) -> String {
    match tool_output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn extract_touched_paths(tool_input: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    for key in ["path", "file_path", "filepath"] {
        if let Some(Value::String(p)) = tool_input.get(key) {
            paths.push(p.clone());
        }
    }
    paths
}
