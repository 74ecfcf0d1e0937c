use ci_types::{BatchId, MachineId, SessionId};

use crate::db::Database;
use crate::error::Result;

impl Database {
    /// Delete a session and every row that references it. Foreign keys are
    /// declared `ON DELETE CASCADE`, so a single delete on `sessions`
    /// removes its batches, activities, observations, and (transitively)
    /// resolution events — this method exists to make that cascade an
    /// explicit, named operation rather than an implicit side effect
    /// callers have to know about.
    pub fn delete_session(&self, id: &SessionId) -> Result<()> {
        self.transaction(|tx| {
            tx.execute("DELETE FROM sessions WHERE id = ?1", rusqlite::params![id.as_str()])?;
            Ok(())
        })
    }

    /// Cross-machine delete: remove every row attributable to `machine_id`
    /// across sessions, observations, and resolution events — used when a
    /// teammate's machine is retired and its local-only history should stop
    /// surfacing in shared retrieval.
    pub fn delete_records_by_machine(&self, machine_id: &MachineId) -> Result<usize> {
        self.transaction(|tx| {
            let sessions = tx.execute(
                "DELETE FROM sessions WHERE source_machine_id = ?1",
                rusqlite::params![machine_id.as_str()],
            )?;
            let resolutions = tx.execute(
                "DELETE FROM resolution_events WHERE source_machine_id = ?1",
                rusqlite::params![machine_id.as_str()],
            )?;
            Ok(sessions + resolutions)
        })
    }

    /// Stuck-batch recovery: any batch still `active` after
    /// `timeout_secs` of no activity is force-completed so the processor
    /// can pick it up instead of it sitting open forever (e.g. the agent
    /// crashed mid-turn and never sent the next prompt-submit/session-end).
    pub fn recover_stuck_batches(&self, timeout_secs: i64) -> Result<usize> {
        self.transaction(|tx| {
            let count = tx.execute(
                "UPDATE prompt_batches SET status = 'completed', completed_at = ?1
                 WHERE status = 'active'
                   AND (julianday('now') - julianday(started_at)) * 86400 > ?2",
                rusqlite::params![ci_types::util::now_rfc3339(), timeout_secs],
            )?;
            Ok(count)
        })
    }

    /// Orphan-activity recovery: activities whose batch no longer exists
    /// (the batch row vanished from a partial write, or was deleted out
    /// from under them), and activities still sitting with `batch_id IS
    /// NULL` past a flush (the window between buffering and batch
    /// assignment), are reattached to a synthesized continuation batch
    /// rather than silently dropped.
    pub fn recover_orphan_activities(&self) -> Result<usize> {
        self.transaction(|tx| {
            let orphan_session_ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT DISTINCT a.session_id FROM activities a
                     LEFT JOIN prompt_batches b ON a.batch_id = b.id
                     WHERE a.batch_id IS NULL OR b.id IS NULL",
                )?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let mut recovered = 0;
            for session_id in orphan_session_ids {
                let next_prompt_number: i64 = tx
                    .query_row(
                        "SELECT COALESCE(MAX(prompt_number), 0) + 1 FROM prompt_batches WHERE session_id = ?1",
                        rusqlite::params![session_id],
                        |r| r.get(0),
                    )
                    .unwrap_or(1);
                let synthetic_id = format!("{session_id}-orphan-{next_prompt_number}");
                tx.execute(
                    "INSERT INTO prompt_batches (id, session_id, prompt_number, kind, status,
                        prompt_text, started_at, completed_at, processed, duration_ms,
                        files_affected, plan_embedded, source_plan_batch_id, content_hash,
                        plan_file_path, plan_content, response_summary, classification)
                     VALUES (?1, ?2, ?3, 'system', 'completed', '[session continuation]',
                        ?4, ?4, 0, NULL, '[]', 0, NULL, ?5, NULL, NULL, NULL, NULL)",
                    rusqlite::params![
                        synthetic_id,
                        session_id,
                        next_prompt_number,
                        ci_types::util::now_rfc3339(),
                        format!("orphan-{session_id}-{next_prompt_number}"),
                    ],
                )?;
                let updated = tx.execute(
                    "UPDATE activities SET batch_id = ?1
                     WHERE session_id = ?2
                       AND (batch_id IS NULL OR batch_id NOT IN (SELECT id FROM prompt_batches))",
                    rusqlite::params![synthetic_id, session_id],
                )?;
                recovered += updated;
            }
            Ok(recovered)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_types::{Activity, ActivityKind, ActivityId, Agent, BatchKind, BatchStatus, ProjectRoot, PromptBatch, Session};

    fn test_batch(id: &str, session_id: &str, status: BatchStatus) -> PromptBatch {
        PromptBatch {
            id: BatchId::new(id),
            session_id: SessionId::new(session_id),
            prompt_number: 1,
            kind: BatchKind::UserPrompt,
            status,
            prompt_text: "x".into(),
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
            content_hash: "h".into(),
        }
    }

    #[test]
    fn cascade_delete_removes_dependent_rows() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(SessionId::new("s1"), ProjectRoot::new("/tmp"), Agent::Claude, MachineId::new("m1"));
        db.upsert_session(&session).unwrap();
        db.upsert_batch(&test_batch("b1", "s1", BatchStatus::Completed)).unwrap();

        db.delete_session(&SessionId::new("s1")).unwrap();
        assert!(db.get_session(&SessionId::new("s1")).unwrap().is_none());
    }

    #[test]
    fn stuck_batch_gets_force_completed() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(SessionId::new("s1"), ProjectRoot::new("/tmp"), Agent::Claude, MachineId::new("m1"));
        db.upsert_session(&session).unwrap();
        let mut batch = test_batch("b1", "s1", BatchStatus::Active);
        batch.started_at = "2000-01-01T00:00:00Z".to_string();
        db.upsert_batch(&batch).unwrap();

        let recovered = db.recover_stuck_batches(1800).unwrap();
        assert_eq!(recovered, 1);
        assert!(db.get_active_batch(&SessionId::new("s1")).unwrap().is_none());
    }

    #[test]
    fn unbatched_activity_gets_reattached_to_synthesized_batch() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(SessionId::new("s1"), ProjectRoot::new("/tmp"), Agent::Claude, MachineId::new("m1"));
        db.upsert_session(&session).unwrap();

        db.queue_activity(Activity {
            id: ActivityId::new("a1"),
            session_id: SessionId::new("s1"),
            batch_id: None,
            kind: ActivityKind::ToolUse,
            tool_name: Some("Read".into()),
            summary: "read a file".into(),
            detail: None,
            files_affected: vec![],
            occurred_at: ci_types::util::now_rfc3339(),
            duration_ms: None,
            raw: serde_json::json!({}),
        })
        .unwrap();
        db.flush_activities().unwrap();

        let recovered = db.recover_orphan_activities().unwrap();
        assert_eq!(recovered, 1);
        assert!(db.unbatched_activities().unwrap().is_empty());
    }
}
