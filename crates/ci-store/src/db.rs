use std::path::Path;
use std::sync::Mutex;

use ci_types::{
    Activity, BatchId, MachineId, ObservationId, ParentSessionReason, PromptBatch,
    ResolutionEvent, Session, SessionId, StoredObservation,
};
use rusqlite::Connection;

use crate::convert::*;
use crate::error::Result;
use crate::schema;

/// Single-writer SQLite activity store. One `rusqlite::Connection` behind a
/// `Mutex` — every mutation goes through `transaction()`, so callers never
/// interleave writes even across async tasks.
///
/// `Activity` rows are buffered in memory and flushed in bulk, either when
/// the buffer crosses `flush_threshold` or when the caller explicitly asks
/// for a flush (end of batch, shutdown).
pub struct Database {
    conn: Mutex<Connection>,
    buffer: Mutex<Vec<Activity>>,
    flush_threshold: usize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn), buffer: Mutex::new(Vec::new()), flush_threshold: 50 })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn), buffer: Mutex::new(Vec::new()), flush_threshold: 50 })
    }

    /// Run `f` inside a transaction, committing on `Ok` and rolling back on
    /// `Err`. The single point every mutator goes through.
    pub(crate) fn transaction<T>(&self, f: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ---- sessions ----

    const SESSION_COLUMNS: &'static str = "id, project_root, agent, started_at, ended_at, resumed_at, summary,
            source_machine_id, title, title_manually_edited, prompt_count, tool_count,
            summary_updated_at, summary_embedded, parent_session_id, parent_session_reason, transcript_path";

    pub fn upsert_session(&self, session: &Session) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, project_root, agent, started_at, ended_at, resumed_at, summary,
                    source_machine_id, title, title_manually_edited, prompt_count, tool_count,
                    summary_updated_at, summary_embedded, parent_session_id, parent_session_reason, transcript_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(id) DO UPDATE SET
                    ended_at = COALESCE(excluded.ended_at, sessions.ended_at),
                    resumed_at = COALESCE(excluded.resumed_at, sessions.resumed_at),
                    summary = COALESCE(excluded.summary, sessions.summary),
                    transcript_path = COALESCE(excluded.transcript_path, sessions.transcript_path)",
                rusqlite::params![
                    session.id.as_str(),
                    session.project_root.to_string(),
                    agent_str(session.agent),
                    session.started_at,
                    session.ended_at,
                    session.resumed_at,
                    session.summary,
                    session.source_machine_id.as_str(),
                    session.title,
                    session.title_manually_edited,
                    session.prompt_count,
                    session.tool_count,
                    session.summary_updated_at,
                    session.summary_embedded,
                    session.parent_session_id.as_ref().map(|s| s.as_str().to_string()),
                    session.parent_session_reason.map(parent_session_reason_str),
                    session.transcript_path,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!("SELECT {} FROM sessions WHERE id = ?1", Self::SESSION_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![id.as_str()])?;
        Ok(rows.next()?.map(row_to_session).transpose()?)
    }

    pub fn mark_session_ended(&self, id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET ended_at = ?2 WHERE id = ?1",
                rusqlite::params![id.as_str(), ci_types::util::now_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// If a session already has `ended_at` set and new hook traffic arrives
    /// for it, mark it resumed. Callers use this to decide whether session
    /// summarization needs a full re-summarize over every batch.
    /// Overwrites the session summary unconditionally (unlike
    /// `upsert_session`, which only fills it in when previously null) —
    /// used by resumed-session re-summarization, which must replace the
    /// stale summary rather than leave the old one in place. Clears
    /// `summary_embedded` since the text changed underneath it.
    pub fn set_session_summary(&self, id: &SessionId, summary: &str) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET summary = ?2, summary_updated_at = ?3, summary_embedded = 0 WHERE id = ?1",
                rusqlite::params![id.as_str(), summary, ci_types::util::now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn mark_session_summary_embedded(&self, id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET summary_embedded = 1 WHERE id = ?1",
                rusqlite::params![id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Sets the session's display title. `manual` marks the edit as
    /// operator-driven so the auto-title logic (run off the first batch's
    /// summary) never overwrites it again.
    pub fn set_session_title(&self, id: &SessionId, title: &str, manual: bool) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET title = ?2, title_manually_edited = ?3 WHERE id = ?1 AND (title_manually_edited = 0 OR ?3 = 1)",
                rusqlite::params![id.as_str(), title, manual],
            )?;
            Ok(())
        })
    }

    pub fn increment_session_prompt_count(&self, id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET prompt_count = prompt_count + 1 WHERE id = ?1",
                rusqlite::params![id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn increment_session_tool_count(&self, id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET tool_count = tool_count + 1 WHERE id = ?1",
                rusqlite::params![id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn set_session_parent(&self, id: &SessionId, parent_id: &SessionId, reason: ParentSessionReason) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE sessions SET parent_session_id = ?2, parent_session_reason = ?3 WHERE id = ?1",
                rusqlite::params![id.as_str(), parent_id.as_str(), parent_session_reason_str(reason)],
            )?;
            Ok(())
        })
    }

    pub fn tool_call_count_for_session(&self, id: &SessionId) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE session_id = ?1 AND kind = 'tool_use'",
            rusqlite::params![id.as_str()],
            |r| r.get(0),
        )
        .map_err(Into::into)
    }

    pub fn mark_session_resumed_if_ended(&self, id: &SessionId) -> Result<bool> {
        self.transaction(|tx| {
            let was_ended: Option<String> = tx
                .query_row("SELECT ended_at FROM sessions WHERE id = ?1", rusqlite::params![id.as_str()], |r| r.get(0))
                .ok()
                .flatten();
            if was_ended.is_some() {
                tx.execute(
                    "UPDATE sessions SET ended_at = NULL, resumed_at = ?2 WHERE id = ?1",
                    rusqlite::params![id.as_str(), ci_types::util::now_rfc3339()],
                )?;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    // ---- prompt batches ----

    const BATCH_COLUMNS: &'static str = "id, session_id, prompt_number, kind, status, prompt_text, started_at,
            completed_at, processed, duration_ms, files_affected, plan_embedded,
            source_plan_batch_id, content_hash, plan_file_path, plan_content, response_summary, classification";

    pub fn upsert_batch(&self, batch: &PromptBatch) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO prompt_batches (id, session_id, prompt_number, kind, status, prompt_text,
                    started_at, completed_at, processed, duration_ms, files_affected, plan_embedded,
                    source_plan_batch_id, content_hash, plan_file_path, plan_content, response_summary, classification)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    completed_at = COALESCE(excluded.completed_at, prompt_batches.completed_at),
                    processed = excluded.processed,
                    duration_ms = COALESCE(excluded.duration_ms, prompt_batches.duration_ms),
                    files_affected = excluded.files_affected,
                    plan_embedded = excluded.plan_embedded,
                    plan_file_path = COALESCE(excluded.plan_file_path, prompt_batches.plan_file_path),
                    plan_content = COALESCE(excluded.plan_content, prompt_batches.plan_content),
                    response_summary = COALESCE(excluded.response_summary, prompt_batches.response_summary),
                    classification = COALESCE(excluded.classification, prompt_batches.classification),
                    content_hash = excluded.content_hash",
                rusqlite::params![
                    batch.id.as_str(),
                    batch.session_id.as_str(),
                    batch.prompt_number,
                    batch_kind_str(batch.kind),
                    batch_status_str(batch.status),
                    batch.prompt_text,
                    batch.started_at,
                    batch.completed_at,
                    batch.processed,
                    batch.duration_ms,
                    string_list_to_json(&batch.files_affected),
                    batch.plan_embedded,
                    batch.source_plan_batch_id.as_ref().map(|b| b.as_str().to_string()),
                    batch.content_hash,
                    batch.plan_file_path,
                    batch.plan_content,
                    batch.response_summary,
                    batch.classification.map(batch_classification_str),
                ],
            )?;
            Ok(())
        })
    }

    pub fn set_batch_classification(&self, id: &BatchId, classification: ci_types::BatchClassification) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET classification = ?2 WHERE id = ?1",
                rusqlite::params![id.as_str(), batch_classification_str(classification)],
            )?;
            Ok(())
        })
    }

    /// Records a plan document's content against a batch once resolved,
    /// marking it embedded so the extraction prompt folds it in exactly once.
    pub fn set_batch_plan_content(&self, id: &BatchId, plan_file_path: Option<&str>, plan_content: &str) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET plan_file_path = COALESCE(?2, plan_file_path), plan_content = ?3, plan_embedded = 1 WHERE id = ?1",
                rusqlite::params![id.as_str(), plan_file_path, plan_content],
            )?;
            Ok(())
        })
    }

    pub fn set_batch_response_summary(&self, id: &BatchId, summary: &str) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET response_summary = ?2 WHERE id = ?1",
                rusqlite::params![id.as_str(), summary],
            )?;
            Ok(())
        })
    }

    /// The session's one `Active` batch, if any — enforces the "one active
    /// batch per session" invariant by construction (only one row can ever
    /// have `status = 'active'` since opening a new one first completes it).
    pub fn get_active_batch(&self, session_id: &SessionId) -> Result<Option<PromptBatch>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM prompt_batches WHERE session_id = ?1 AND status = 'active' ORDER BY prompt_number DESC LIMIT 1",
            Self::BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![session_id.as_str()])?;
        Ok(rows.next()?.map(row_to_batch).transpose()?)
    }

    pub fn complete_active_batch(&self, session_id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET status = 'completed', completed_at = ?2
                 WHERE session_id = ?1 AND status = 'active'",
                rusqlite::params![session_id.as_str(), ci_types::util::now_rfc3339()],
            )?;
            Ok(())
        })
    }

    pub fn batches_ready_for_processing(&self, limit: usize) -> Result<Vec<PromptBatch>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM prompt_batches WHERE processed = 0 AND status = 'completed' ORDER BY started_at ASC LIMIT ?1",
            Self::BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_batch)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// All of a session's batches, any status, oldest first — used when a
    /// resumed session needs its summary regenerated with full context
    /// rather than just the newest batch.
    pub fn batches_for_session(&self, session_id: &SessionId) -> Result<Vec<PromptBatch>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM prompt_batches WHERE session_id = ?1 ORDER BY prompt_number ASC",
            Self::BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![session_id.as_str()], row_to_batch)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Plan batches eligible for `GET /api/activity/plans` — any batch whose
    /// plan content has been resolved, newest first.
    pub fn plan_batches(&self, limit: usize) -> Result<Vec<PromptBatch>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM prompt_batches WHERE kind IN ('plan', 'derived_plan') AND plan_embedded = 1
             ORDER BY started_at DESC LIMIT ?1",
            Self::BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_batch)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_batch_processed(&self, id: &BatchId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET processed = 1, status = 'processed' WHERE id = ?1",
                rusqlite::params![id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Reprocess queue: mark a batch unprocessed again so the next
    /// processor tick re-runs extraction over it.
    pub fn requeue_batch(&self, id: &BatchId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE prompt_batches SET processed = 0, status = 'completed' WHERE id = ?1",
                rusqlite::params![id.as_str()],
            )?;
            Ok(())
        })
    }

    // ---- activities (buffered) ----

    /// Queue an activity for the next flush rather than writing immediately.
    /// Returns `Ok(true)` if this push crossed `flush_threshold` and the
    /// caller should call `flush_activities`.
    pub fn queue_activity(&self, activity: Activity) -> Result<bool> {
        let mut buffer = self.buffer.lock().expect("buffer mutex poisoned");
        buffer.push(activity);
        Ok(buffer.len() >= self.flush_threshold)
    }

    pub fn flush_activities(&self) -> Result<usize> {
        let batch: Vec<Activity> = {
            let mut buffer = self.buffer.lock().expect("buffer mutex poisoned");
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        self.transaction(|tx| {
            for activity in &batch {
                tx.execute(
                    "INSERT INTO activities (id, session_id, batch_id, kind, tool_name, summary,
                        detail, files_affected, occurred_at, duration_ms, raw)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(id) DO NOTHING",
                    rusqlite::params![
                        activity.id.as_str(),
                        activity.session_id.as_str(),
                        activity.batch_id.as_ref().map(|b| b.as_str().to_string()),
                        activity_kind_str(activity.kind),
                        activity.tool_name,
                        activity.summary,
                        activity.detail,
                        string_list_to_json(&activity.files_affected),
                        activity.occurred_at,
                        activity.duration_ms,
                        activity.raw.to_string(),
                    ],
                )?;
            }
            Ok(())
        })?;
        Ok(count)
    }

    pub fn activities_for_batch(&self, batch_id: &BatchId) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, session_id, batch_id, kind, tool_name, summary, detail, files_affected,
                    occurred_at, duration_ms, raw
             FROM activities WHERE batch_id = ?1 ORDER BY occurred_at ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![batch_id.as_str()], row_to_activity)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Activities still waiting for a batch to be assigned (`batch_id IS
    /// NULL`), oldest first — the recovery-pass counterpart to orphans whose
    /// batch row was deleted out from under them.
    pub fn unbatched_activities(&self) -> Result<Vec<Activity>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, session_id, batch_id, kind, tool_name, summary, detail, files_affected,
                    occurred_at, duration_ms, raw
             FROM activities WHERE batch_id IS NULL ORDER BY occurred_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_activity)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn reattach_activity(&self, activity_id: &ci_types::ActivityId, batch_id: &BatchId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "UPDATE activities SET batch_id = ?2 WHERE id = ?1",
                rusqlite::params![activity_id.as_str(), batch_id.as_str()],
            )?;
            Ok(())
        })
    }

    // ---- observations ----

    const OBSERVATION_COLUMNS: &'static str = "id, session_id, source_batch_id, category, text, importance, status,
            created_at, updated_at, content_hash, embedded, context, tags, file_path, origin";

    /// Upsert by content hash: unchanged facts update in place instead of
    /// duplicating (the invariant `StoredObservation::id` exists to serve).
    pub fn upsert_observation(&self, obs: &StoredObservation) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO observations (id, session_id, source_batch_id, category, text,
                    importance, status, created_at, updated_at, content_hash, embedded,
                    context, tags, file_path, origin)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(content_hash) DO UPDATE SET
                    importance = excluded.importance,
                    status = excluded.status,
                    updated_at = excluded.updated_at,
                    embedded = excluded.embedded,
                    context = excluded.context,
                    tags = excluded.tags,
                    file_path = excluded.file_path",
                rusqlite::params![
                    obs.id.as_str(),
                    obs.session_id.as_str(),
                    obs.source_batch_id.as_str(),
                    observation_category_str(&obs.category),
                    obs.text,
                    obs.importance,
                    observation_status_str(obs.status),
                    obs.created_at,
                    obs.updated_at,
                    obs.content_hash,
                    obs.embedded,
                    obs.context,
                    string_list_to_json(&obs.tags),
                    obs.file_path,
                    observation_origin_str(obs.origin),
                ],
            )?;
            Ok(())
        })
    }

    pub fn active_observations_for_session(&self, session_id: &SessionId) -> Result<Vec<StoredObservation>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM observations WHERE session_id = ?1 AND status = 'active'",
            Self::OBSERVATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![session_id.as_str()], row_to_observation)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn observation_by_content_hash(&self, hash: &str) -> Result<Option<StoredObservation>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!("SELECT {} FROM observations WHERE content_hash = ?1", Self::OBSERVATION_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![hash])?;
        Ok(rows.next()?.map(row_to_observation).transpose()?)
    }

    pub fn observations_pending_embedding(&self, limit: usize) -> Result<Vec<StoredObservation>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!(
            "SELECT {} FROM observations WHERE embedded = 0 ORDER BY created_at ASC LIMIT ?1",
            Self::OBSERVATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_observation)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn mark_observations_embedded(&self, ids: &[ObservationId]) -> Result<()> {
        self.transaction(|tx| {
            for id in ids {
                tx.execute(
                    "UPDATE observations SET embedded = 1 WHERE id = ?1",
                    rusqlite::params![id.as_str()],
                )?;
            }
            Ok(())
        })
    }

    /// Clears every observation's `embedded` flag, so the next
    /// embed-pending pass re-embeds the whole table — used to rebuild a
    /// vector store that was lost or never populated.
    pub fn reset_all_embedding_flags(&self) -> Result<usize> {
        self.transaction(|tx| Ok(tx.execute("UPDATE observations SET embedded = 0", [])?))
    }

    pub fn count_observations(&self) -> Result<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0)).map_err(Into::into)
    }

    /// Most recent sessions, newest-started first — backs `GET
    /// /api/activity/sessions`.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sql = format!("SELECT {} FROM sessions ORDER BY started_at DESC LIMIT ?1", Self::SESSION_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], row_to_session)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Case-insensitive substring match over observation text, optionally
    /// scoped to one session — backs `GET /api/activity/search`.
    pub fn search_observations(&self, query: &str, session_id: Option<&SessionId>, limit: usize) -> Result<Vec<StoredObservation>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let sql = format!(
            "SELECT {} FROM observations
             WHERE text LIKE ?1 ESCAPE '\\' AND (?2 IS NULL OR session_id = ?2)
             ORDER BY created_at DESC LIMIT ?3",
            Self::OBSERVATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![pattern, session_id.map(|s| s.as_str()), limit as i64],
            row_to_observation,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Coarse counters for `GET /api/activity/stats`.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let sessions = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        let batches = conn.query_row("SELECT COUNT(*) FROM prompt_batches", [], |r| r.get(0))?;
        let activities = conn.query_row("SELECT COUNT(*) FROM activities", [], |r| r.get(0))?;
        let observations = conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))?;
        let pending_batches = conn.query_row(
            "SELECT COUNT(*) FROM prompt_batches WHERE processed = 0 AND status = 'completed'",
            [],
            |r| r.get(0),
        )?;
        Ok(StoreStats { sessions, batches, activities, observations, pending_batches })
    }

    // ---- resolution events ----

    /// Upsert by content hash: replaying the same resolution (e.g. a
    /// redelivered hook) updates the existing audit row instead of
    /// duplicating it, mirroring `upsert_observation`.
    pub fn insert_resolution_event(&self, event: &ResolutionEvent) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO resolution_events (id, observation_id, kind, superseded_by, note, occurred_at, source_machine_id, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(content_hash) DO UPDATE SET
                    note = excluded.note,
                    occurred_at = excluded.occurred_at",
                rusqlite::params![
                    event.id.as_str(),
                    event.observation_id.as_str(),
                    resolution_kind_str(event.kind),
                    event.superseded_by.as_ref().map(|o| o.as_str().to_string()),
                    event.note,
                    event.occurred_at,
                    event.source_machine_id.as_str(),
                    event.content_hash,
                ],
            )?;
            let new_status = match event.kind {
                ci_types::ResolutionKind::Resolve => "active",
                ci_types::ResolutionKind::Supersede => "superseded",
                ci_types::ResolutionKind::Reactivate => "active",
            };
            tx.execute(
                "UPDATE observations SET status = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![event.observation_id.as_str(), new_status, event.occurred_at],
            )?;
            Ok(())
        })
    }

    // ---- governance ----

    pub fn record_governance_decision(
        &self,
        session_id: &SessionId,
        tool_name: &str,
        decision: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.transaction(|tx| {
            tx.execute(
                "INSERT INTO governance_audit (session_id, tool_name, decision, reason, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    session_id.as_str(),
                    tool_name,
                    decision,
                    reason,
                    ci_types::util::now_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }
}

fn row_to_batch(row: &rusqlite::Row) -> rusqlite::Result<PromptBatch> {
    Ok(PromptBatch {
        id: BatchId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        prompt_number: row.get(2)?,
        kind: batch_kind_from_str(&row.get::<_, String>(3)?),
        status: batch_status_from_str(&row.get::<_, String>(4)?),
        prompt_text: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        processed: row.get(8)?,
        duration_ms: row.get(9)?,
        files_affected: json_to_string_list(&row.get::<_, String>(10)?),
        plan_embedded: row.get(11)?,
        source_plan_batch_id: row.get::<_, Option<String>>(12)?.map(BatchId::new),
        content_hash: row.get(13)?,
        plan_file_path: row.get(14)?,
        plan_content: row.get(15)?,
        response_summary: row.get(16)?,
        classification: row.get::<_, Option<String>>(17)?.and_then(|s| batch_classification_from_str(&s)),
    })
}

fn row_to_activity(row: &rusqlite::Row) -> rusqlite::Result<Activity> {
    Ok(Activity {
        id: ci_types::ActivityId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        batch_id: row.get::<_, Option<String>>(2)?.map(BatchId::new),
        kind: activity_kind_from_str(&row.get::<_, String>(3)?),
        tool_name: row.get(4)?,
        summary: row.get(5)?,
        detail: row.get(6)?,
        files_affected: json_to_string_list(&row.get::<_, String>(7)?),
        occurred_at: row.get(8)?,
        duration_ms: row.get(9)?,
        raw: serde_json::from_str(&row.get::<_, String>(10)?).unwrap_or(serde_json::Value::Null),
    })
}

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<StoredObservation> {
    Ok(StoredObservation {
        id: ObservationId::new(row.get::<_, String>(0)?),
        session_id: SessionId::new(row.get::<_, String>(1)?),
        source_batch_id: BatchId::new(row.get::<_, String>(2)?),
        category: observation_category_from_str(&row.get::<_, String>(3)?),
        text: row.get(4)?,
        importance: row.get::<_, i64>(5)? as u8,
        status: observation_status_from_str(&row.get::<_, String>(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        content_hash: row.get(9)?,
        embedded: row.get(10)?,
        context: row.get(11)?,
        tags: json_to_string_list(&row.get::<_, String>(12)?),
        file_path: row.get(13)?,
        origin: observation_origin_from_str(&row.get::<_, String>(14)?),
    })
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: SessionId::new(row.get::<_, String>(0)?),
        project_root: ci_types::ProjectRoot::new(row.get::<_, String>(1)?),
        agent: agent_from_str(&row.get::<_, String>(2)?),
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        resumed_at: row.get(5)?,
        summary: row.get(6)?,
        source_machine_id: MachineId::new(row.get::<_, String>(7)?),
        title: row.get(8)?,
        title_manually_edited: row.get(9)?,
        prompt_count: row.get(10)?,
        tool_count: row.get(11)?,
        summary_updated_at: row.get(12)?,
        summary_embedded: row.get(13)?,
        parent_session_id: row.get::<_, Option<String>>(14)?.map(SessionId::new),
        parent_session_reason: row.get::<_, Option<String>>(15)?.map(|s| parent_session_reason_from_str(&s)),
        transcript_path: row.get(16)?,
    })
}

/// Coarse counters returned by `Database::stats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub sessions: i64,
    pub batches: i64,
    pub activities: i64,
    pub observations: i64,
    pub pending_batches: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_types::{Agent, BatchKind, BatchStatus};

    fn test_session() -> Session {
        Session::new(
            SessionId::new("s1"),
            ci_types::ProjectRoot::new("/tmp/proj"),
            Agent::Claude,
            MachineId::new("m1"),
        )
    }

    fn test_batch(id: &str, session_id: &str, status: BatchStatus) -> PromptBatch {
        PromptBatch {
            id: BatchId::new(id),
            session_id: SessionId::new(session_id),
            prompt_number: 1,
            kind: BatchKind::UserPrompt,
            status,
            prompt_text: "do a thing".to_string(),
            started_at: ci_types::util::now_rfc3339(),
            completed_at: None,
            processed: false,
            duration_ms: None,
            files_affected: vec![],
            plan_embedded: false,
            source_plan_batch_id: None,
            plan_file_path: None,
            plan_content: None,
            response_summary: None,
            classification: None,
            content_hash: "h1".to_string(),
        }
    }

    #[test]
    fn upsert_and_get_session() {
        let db = Database::open_in_memory().unwrap();
        let session = test_session();
        db.upsert_session(&session).unwrap();
        let loaded = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert!(loaded.is_active());
        assert_eq!(loaded.prompt_count, 0);
    }

    #[test]
    fn session_counters_and_title_update() {
        let db = Database::open_in_memory().unwrap();
        let session = test_session();
        db.upsert_session(&session).unwrap();
        db.increment_session_prompt_count(&session.id).unwrap();
        db.increment_session_tool_count(&session.id).unwrap();
        db.set_session_title(&session.id, "fix the parser", false).unwrap();

        let loaded = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.prompt_count, 1);
        assert_eq!(loaded.tool_count, 1);
        assert_eq!(loaded.title.as_deref(), Some("fix the parser"));

        db.set_session_title(&session.id, "manual title", true).unwrap();
        db.set_session_title(&session.id, "auto title", false).unwrap();
        let loaded = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded.title.as_deref(), Some("manual title"));
    }

    #[test]
    fn only_one_active_batch_survives_per_session() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_session(&test_session()).unwrap();
        let session_id = SessionId::new("s1");

        db.upsert_batch(&test_batch("b1", "s1", BatchStatus::Active)).unwrap();
        assert!(db.get_active_batch(&session_id).unwrap().is_some());

        db.complete_active_batch(&session_id).unwrap();
        assert!(db.get_active_batch(&session_id).unwrap().is_none());
    }

    #[test]
    fn batch_classification_round_trips() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_session(&test_session()).unwrap();
        let batch = test_batch("b1", "s1", BatchStatus::Completed);
        db.upsert_batch(&batch).unwrap();
        db.set_batch_classification(&batch.id, ci_types::BatchClassification::Debugging).unwrap();

        let loaded = db.batches_for_session(&SessionId::new("s1")).unwrap();
        assert_eq!(loaded[0].classification, Some(ci_types::BatchClassification::Debugging));
    }

    #[test]
    fn buffered_activities_flush_on_demand() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_session(&test_session()).unwrap();
        db.upsert_batch(&test_batch("b1", "s1", BatchStatus::Active)).unwrap();

        let activity = Activity {
            id: ci_types::ActivityId::new("a1"),
            session_id: SessionId::new("s1"),
            batch_id: Some(BatchId::new("b1")),
            kind: ci_types::ActivityKind::ToolUse,
            tool_name: Some("Read".to_string()),
            summary: "read a file".to_string(),
            detail: None,
            files_affected: vec!["src/lib.rs".to_string()],
            occurred_at: ci_types::util::now_rfc3339(),
            duration_ms: Some(12),
            raw: serde_json::json!({}),
        };
        db.queue_activity(activity).unwrap();
        assert!(db.activities_for_batch(&BatchId::new("b1")).unwrap().is_empty());
        db.flush_activities().unwrap();
        assert_eq!(db.activities_for_batch(&BatchId::new("b1")).unwrap().len(), 1);
    }

    #[test]
    fn activity_without_batch_shows_up_as_unbatched() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_session(&test_session()).unwrap();

        let activity = Activity {
            id: ci_types::ActivityId::new("a1"),
            session_id: SessionId::new("s1"),
            batch_id: None,
            kind: ci_types::ActivityKind::ToolUse,
            tool_name: Some("Read".to_string()),
            summary: "read a file".to_string(),
            detail: None,
            files_affected: vec![],
            occurred_at: ci_types::util::now_rfc3339(),
            duration_ms: Some(12),
            raw: serde_json::json!({}),
        };
        db.queue_activity(activity).unwrap();
        db.flush_activities().unwrap();

        let unbatched = db.unbatched_activities().unwrap();
        assert_eq!(unbatched.len(), 1);

        db.upsert_batch(&test_batch("b1", "s1", BatchStatus::Completed)).unwrap();
        db.reattach_activity(&unbatched[0].id, &BatchId::new("b1")).unwrap();
        assert!(db.unbatched_activities().unwrap().is_empty());
    }

    #[test]
    fn resolution_event_supersede_marks_observation_superseded() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_session(&test_session()).unwrap();
        db.upsert_batch(&test_batch("b1", "s1", BatchStatus::Processed)).unwrap();

        let obs = StoredObservation {
            id: ObservationId::new("o1"),
            session_id: SessionId::new("s1"),
            source_batch_id: BatchId::new("b1"),
            category: ci_types::ObservationCategory::Decision,
            text: "use sqlite".to_string(),
            context: None,
            importance: 5,
            status: ci_types::ObservationStatus::Active,
            tags: vec![],
            file_path: None,
            origin: ci_types::ObservationOrigin::AutoExtracted,
            created_at: ci_types::util::now_rfc3339(),
            updated_at: ci_types::util::now_rfc3339(),
            content_hash: "oh1".to_string(),
            embedded: false,
        };
        db.upsert_observation(&obs).unwrap();

        let event = ResolutionEvent {
            id: ci_types::ResolutionEventId::new("r1"),
            observation_id: obs.id.clone(),
            kind: ci_types::ResolutionKind::Supersede,
            superseded_by: Some(ObservationId::new("o2")),
            note: Some("replaced by a newer decision".to_string()),
            occurred_at: ci_types::util::now_rfc3339(),
            source_machine_id: MachineId::new("m1"),
            content_hash: "rh1".to_string(),
        };
        db.insert_resolution_event(&event).unwrap();

        let loaded = db.observation_by_content_hash("oh1").unwrap().unwrap();
        assert_eq!(loaded.status, ci_types::ObservationStatus::Superseded);
    }
}
