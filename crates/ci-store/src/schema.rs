use rusqlite::Connection;

use crate::error::Result;

/// One migration: a version number and an idempotent SQL script. Scripts
/// only ever add columns/tables/indexes — they must never `DROP` anything,
/// since `activities.db` is the source of truth for observations, not a
/// disposable cache.
struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id                TEXT PRIMARY KEY,
                project_root      TEXT NOT NULL,
                agent             TEXT NOT NULL,
                started_at        TEXT NOT NULL,
                ended_at          TEXT,
                resumed_at        TEXT,
                summary           TEXT,
                source_machine_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_project_root ON sessions(project_root);

            CREATE TABLE IF NOT EXISTS prompt_batches (
                id                    TEXT PRIMARY KEY,
                session_id            TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                prompt_number         INTEGER NOT NULL,
                kind                  TEXT NOT NULL,
                status                TEXT NOT NULL,
                prompt_text           TEXT NOT NULL,
                started_at            TEXT NOT NULL,
                completed_at          TEXT,
                processed             INTEGER NOT NULL DEFAULT 0,
                duration_ms           INTEGER,
                files_affected        TEXT NOT NULL DEFAULT '[]',
                plan_embedded         INTEGER NOT NULL DEFAULT 0,
                source_plan_batch_id  TEXT,
                content_hash          TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_batches_session ON prompt_batches(session_id, prompt_number);
            CREATE INDEX IF NOT EXISTS idx_batches_unprocessed ON prompt_batches(processed, status);

            CREATE TABLE IF NOT EXISTS activities (
                id             TEXT PRIMARY KEY,
                session_id     TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                batch_id       TEXT NOT NULL REFERENCES prompt_batches(id) ON DELETE CASCADE,
                kind           TEXT NOT NULL,
                tool_name      TEXT,
                summary        TEXT NOT NULL,
                detail         TEXT,
                files_affected TEXT NOT NULL DEFAULT '[]',
                occurred_at    TEXT NOT NULL,
                duration_ms    INTEGER,
                raw            TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_activities_batch ON activities(batch_id);
            CREATE INDEX IF NOT EXISTS idx_activities_session ON activities(session_id);

            CREATE TABLE IF NOT EXISTS observations (
                id              TEXT PRIMARY KEY,
                session_id      TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                source_batch_id TEXT NOT NULL,
                category        TEXT NOT NULL,
                text            TEXT NOT NULL,
                importance      INTEGER NOT NULL,
                status          TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                content_hash    TEXT NOT NULL UNIQUE,
                embedded        INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_observations_status ON observations(status);
            CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id);

            CREATE TABLE IF NOT EXISTS resolution_events (
                id                TEXT PRIMARY KEY,
                observation_id    TEXT NOT NULL REFERENCES observations(id) ON DELETE CASCADE,
                kind              TEXT NOT NULL,
                note              TEXT,
                occurred_at       TEXT NOT NULL,
                source_machine_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_resolution_observation ON resolution_events(observation_id);

            CREATE TABLE IF NOT EXISTS governance_audit (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                tool_name   TEXT NOT NULL,
                decision    TEXT NOT NULL,
                reason      TEXT,
                occurred_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
            ALTER TABLE sessions ADD COLUMN title TEXT;
            ALTER TABLE sessions ADD COLUMN title_manually_edited INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE sessions ADD COLUMN prompt_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE sessions ADD COLUMN tool_count INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE sessions ADD COLUMN summary_updated_at TEXT;
            ALTER TABLE sessions ADD COLUMN summary_embedded INTEGER NOT NULL DEFAULT 0;
            ALTER TABLE sessions ADD COLUMN parent_session_id TEXT;
            ALTER TABLE sessions ADD COLUMN parent_session_reason TEXT;
            ALTER TABLE sessions ADD COLUMN transcript_path TEXT;

            ALTER TABLE prompt_batches ADD COLUMN plan_file_path TEXT;
            ALTER TABLE prompt_batches ADD COLUMN plan_content TEXT;
            ALTER TABLE prompt_batches ADD COLUMN response_summary TEXT;
            ALTER TABLE prompt_batches ADD COLUMN classification TEXT;

            ALTER TABLE observations ADD COLUMN context TEXT;
            ALTER TABLE observations ADD COLUMN tags TEXT NOT NULL DEFAULT '[]';
            ALTER TABLE observations ADD COLUMN file_path TEXT;
            ALTER TABLE observations ADD COLUMN origin TEXT NOT NULL DEFAULT 'auto_extracted';

            ALTER TABLE resolution_events ADD COLUMN superseded_by TEXT;
            ALTER TABLE resolution_events ADD COLUMN content_hash TEXT NOT NULL DEFAULT '';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_resolution_content_hash
                ON resolution_events(content_hash) WHERE content_hash != '';

            CREATE TABLE activities_v2 (
                id             TEXT PRIMARY KEY,
                session_id     TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                batch_id       TEXT REFERENCES prompt_batches(id) ON DELETE CASCADE,
                kind           TEXT NOT NULL,
                tool_name      TEXT,
                summary        TEXT NOT NULL,
                detail         TEXT,
                files_affected TEXT NOT NULL DEFAULT '[]',
                occurred_at    TEXT NOT NULL,
                duration_ms    INTEGER,
                raw            TEXT NOT NULL DEFAULT '{}'
            );
            INSERT INTO activities_v2 SELECT id, session_id, batch_id, kind, tool_name, summary, detail, files_affected, occurred_at, duration_ms, raw FROM activities;
            DROP TABLE activities;
            ALTER TABLE activities_v2 RENAME TO activities;
            CREATE INDEX IF NOT EXISTS idx_activities_batch ON activities(batch_id);
            CREATE INDEX IF NOT EXISTS idx_activities_session ON activities(session_id);
            CREATE INDEX IF NOT EXISTS idx_activities_unbatched ON activities(batch_id) WHERE batch_id IS NULL;
        "#,
    },
];

/// Apply every migration whose version is not yet recorded, in order,
/// each inside its own transaction. A `schema_migrations` row is only
/// written once its script has fully committed, so a crash mid-migration
/// is safe to retry on next startup.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
    )?;

    let applied: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql).map_err(|e| {
            crate::error::Error::Migration(format!("version {}: {}", migration.version, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, ci_types::util::now_rfc3339()],
        )?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn creates_expected_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='observations'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
