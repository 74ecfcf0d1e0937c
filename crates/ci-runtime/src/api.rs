use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use ci_core::CiConfig;
use ci_core::hash::content_hash;
use ci_llm::EmbeddingProvider as _;
use ci_types::{BatchId, ObservationId, ObservationOrigin, ObservationStatus, ResolutionEventId, ResolutionKind, SessionId, StoredObservation};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/config", get(get_config).put(put_config))
        .route("/api/config/test", post(test_config))
        .route("/api/restart", post(restart))
        .route("/api/providers/models", get(list_models))
        .route("/api/activity/sessions", get(list_sessions))
        .route("/api/activity/sessions/:id", get(get_session))
        .route("/api/activity/sessions/:id/activities", get(session_activities))
        .route("/api/activity/prompt-batches/:id/activities", get(batch_activities))
        .route("/api/activity/prompt-batches/:id/promote", post(promote_batch))
        .route("/api/activity/search", get(search_activity))
        .route("/api/activity/stats", get(stats))
        .route("/api/activity/reprocess-memories", post(reprocess_memories))
        .route("/api/activity/plans", get(list_plans))
        .route("/api/activity/plans/:batch_id/refresh", post(refresh_plan))
        .route("/api/activity/observations", post(create_observation))
        .route("/api/activity/observations/:id/resolve", post(resolve_observation))
        .route("/api/tunnel/status", get(tunnel_status))
        .route("/api/tunnel/start", post(tunnel_start))
        .route("/api/tunnel/stop", post(tunnel_stop))
}

/// Shared opt-in for endpoints that look up a single resource by id: when
/// `graceful=true` is present, a missing resource collapses to `{"success":
/// false}` instead of a 404, for callers (editor extensions, mostly) that
/// would rather branch on a JSON field than a status code.
#[derive(Deserialize, Default)]
struct GracefulQuery {
    #[serde(default)]
    graceful: bool,
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.uptime().as_secs(),
        "project_root": state.project_root.to_string(),
    }))
}

async fn get_config(State(state): State<AppState>) -> Json<CiConfig> {
    Json(state.config_snapshot())
}

async fn put_config(State(state): State<AppState>, Json(new_config): Json<CiConfig>) -> Result<Json<CiConfig>> {
    new_config.save(&state.paths.config_file())?;
    *state.config.write().expect("config lock poisoned") = new_config.clone();
    Ok(Json(new_config))
}

#[derive(Deserialize)]
struct TestConfigRequest {
    base_url: String,
    model: String,
    api_key: Option<String>,
}

async fn test_config(Json(req): Json<TestConfigRequest>) -> Result<Json<Value>> {
    let provider = ci_llm::OpenAiCompatibleProvider::new(req.base_url, req.model, req.api_key, std::time::Duration::from_secs(10));
    provider.check_availability().await?;
    Ok(Json(json!({ "ok": true })))
}

/// Reloads config from disk without dropping the HTTP listener; a full
/// process restart (picking up a new port, say) is the CLI's job via
/// `stop` then `start`, not this daemon's own responsibility.
async fn restart(State(state): State<AppState>) -> Result<Json<Value>> {
    let reloaded = CiConfig::load(&state.paths.config_file())?;
    *state.config.write().expect("config lock poisoned") = reloaded;
    Ok(Json(json!({ "status": "reloaded" })))
}

#[derive(Deserialize)]
struct ModelsQuery {
    base_url: String,
}

/// Anti-SSRF: only ever asked to fetch a provider's model list from a
/// loopback address, since the provider is assumed to be a local model
/// server (Ollama, LM Studio) the daemon has no business reaching out to
/// the public internet for.
async fn list_models(Query(q): Query<ModelsQuery>) -> Result<Json<Value>> {
    let parsed = reqwest::Url::parse(&q.base_url).map_err(|_| Error::Validation("invalid base_url".to_string()))?;
    let host = parsed.host_str().unwrap_or_default();
    if host != "localhost" && host != "127.0.0.1" && host != "::1" {
        return Err(Error::Validation("provider base_url must be a loopback address".to_string()));
    }

    let url = format!("{}/models", q.base_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await.map_err(|e| Error::Validation(e.to_string()))?;
    let body: Value = response.json().await.map_err(|e| Error::Validation(e.to_string()))?;
    Ok(Json(body))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn list_sessions(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>> {
    let sessions = state.db.list_sessions(q.limit.unwrap_or(50))?;
    Ok(Json(json!({ "sessions": sessions })))
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>, Query(g): Query<GracefulQuery>) -> Result<Json<Value>> {
    match state.db.get_session(&SessionId::new(id.clone()))? {
        Some(session) => Ok(Json(json!({ "session": session }))),
        None if g.graceful => Ok(Json(json!({ "success": false }))),
        None => Err(Error::NotFound(format!("session {id} not found"))),
    }
}

async fn session_activities(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let session_id = SessionId::new(id);
    let batches = state.db.batches_for_session(&session_id)?;
    let mut activities = Vec::new();
    for batch in &batches {
        activities.extend(state.db.activities_for_batch(&batch.id)?);
    }
    Ok(Json(json!({ "activities": activities })))
}

async fn batch_activities(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let activities = state.db.activities_for_batch(&BatchId::new(id))?;
    Ok(Json(json!({ "activities": activities })))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
    session_id: Option<String>,
    limit: Option<usize>,
}

async fn search_activity(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Result<Json<Value>> {
    let session_id = q.session_id.map(SessionId::new);
    let results = state.db.search_observations(&q.query, session_id.as_ref(), q.limit.unwrap_or(20))?;
    Ok(Json(json!({ "observations": results })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = state.db.stats()?;
    Ok(Json(json!(stats)))
}

#[derive(Deserialize)]
struct ReprocessRequest {
    batch_ids: Option<Vec<String>>,
    #[serde(default)]
    recover_stuck: bool,
    #[serde(default)]
    process_immediately: bool,
}

async fn reprocess_memories(State(state): State<AppState>, Json(req): Json<ReprocessRequest>) -> Result<Json<Value>> {
    let mut requeued = 0;
    for id in req.batch_ids.unwrap_or_default() {
        state.db.requeue_batch(&BatchId::new(id))?;
        requeued += 1;
    }
    if req.recover_stuck {
        let timeout = state.config_snapshot().stuck_batch_timeout_secs as i64;
        state.db.recover_stuck_batches(timeout)?;
    }
    if req.process_immediately {
        state.processor.run_tick().await?;
    }
    Ok(Json(json!({ "requeued": requeued })))
}

async fn promote_batch(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.db.requeue_batch(&BatchId::new(id.clone()))?;
    Ok(Json(json!({ "promoted": id })))
}

async fn list_plans(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Value>> {
    let plans = state.db.plan_batches(q.limit.unwrap_or(200))?;
    Ok(Json(json!({ "plans": plans })))
}

async fn refresh_plan(State(state): State<AppState>, Path(batch_id): Path<String>) -> Result<Json<Value>> {
    state.db.requeue_batch(&BatchId::new(batch_id.clone()))?;
    Ok(Json(json!({ "refreshed": batch_id })))
}

#[derive(Deserialize)]
struct CreateObservationRequest {
    session_id: String,
    category: String,
    text: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    importance: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    file_path: Option<String>,
}

/// Lets an agent or operator record a fact directly, bypassing extraction
/// entirely. Tied to the session's most recent batch purely for
/// `source_batch_id` bookkeeping; an agent-created observation is never
/// touched by the processor's own re-extraction pass.
async fn create_observation(State(state): State<AppState>, Json(req): Json<CreateObservationRequest>) -> Result<Json<Value>> {
    let session_id = SessionId::new(req.session_id);
    let batches = state.db.batches_for_session(&session_id)?;
    let source_batch_id = batches
        .last()
        .map(|b| b.id.clone())
        .ok_or_else(|| Error::NotFound(format!("session {} has no batches yet", session_id.as_str())))?;

    let category = ci_engine::classify::category_from_str(&req.category);
    let now = ci_types::util::now_rfc3339();
    let hash = content_hash(&[session_id.as_str(), &ci_engine::classify::category_key(&category), &req.text]);
    let observation = StoredObservation {
        id: ObservationId::new(uuid::Uuid::new_v4().to_string()),
        session_id,
        source_batch_id,
        category,
        text: req.text,
        context: req.context,
        importance: req.importance.map(StoredObservation::clamp_importance).unwrap_or(5),
        status: ObservationStatus::Active,
        tags: req.tags,
        file_path: req.file_path,
        origin: ObservationOrigin::AgentCreated,
        created_at: now.clone(),
        updated_at: now,
        content_hash: hash,
        embedded: false,
    };
    state.db.upsert_observation(&observation)?;
    Ok(Json(json!({ "observation": observation })))
}

#[derive(Deserialize)]
struct ResolveObservationRequest {
    kind: String,
    #[serde(default)]
    superseded_by: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

async fn resolve_observation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(g): Query<GracefulQuery>,
    Json(req): Json<ResolveObservationRequest>,
) -> Result<Json<Value>> {
    let observation_id = ObservationId::new(id.clone());
    let kind = match req.kind.as_str() {
        "resolve" => ResolutionKind::Resolve,
        "supersede" => ResolutionKind::Supersede,
        "reactivate" => ResolutionKind::Reactivate,
        other => return Err(Error::Validation(format!("unknown resolution kind: {other}"))),
    };

    let superseded_by = req.superseded_by.clone().map(ObservationId::new);
    let occurred_at = ci_types::util::now_rfc3339();
    let hash = content_hash(&[
        observation_id.as_str(),
        req.kind.as_str(),
        state.machine_id.as_str(),
        superseded_by.as_ref().map(|o| o.as_str()).unwrap_or(""),
    ]);
    let event = ci_types::ResolutionEvent {
        id: ResolutionEventId::new(uuid::Uuid::new_v4().to_string()),
        observation_id,
        kind,
        superseded_by,
        note: req.note,
        occurred_at,
        source_machine_id: state.machine_id.clone(),
        content_hash: hash,
    };
    match state.db.insert_resolution_event(&event) {
        Ok(()) => Ok(Json(json!({ "resolved": id }))),
        Err(err) if g.graceful => {
            tracing::warn!(observation_id = %id, %err, "resolve failed, returning graceful failure");
            Ok(Json(json!({ "success": false })))
        }
        Err(err) => Err(err.into()),
    }
}

async fn tunnel_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": format!("{:?}", state.tunnel.status()) }))
}

async fn tunnel_start(State(state): State<AppState>) -> Result<Json<Value>> {
    let url = state.tunnel.start(state.port)?;
    state.cors_origins.add(url.clone());
    Ok(Json(json!({ "public_url": url })))
}

async fn tunnel_stop(State(state): State<AppState>) -> Json<Value> {
    if let crate::tunnel::TunnelStatus::Running { public_url } = state.tunnel.status() {
        state.cors_origins.remove(&public_url);
    }
    state.tunnel.stop();
    Json(json!({ "status": "stopped" }))
}
