use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::ledger::EvidenceRow;

// Schema-on-read: the event log and the ledger's evidence.jsonl remain the
// source of truth. This SQLite index exists purely to make `ledger_query`,
// `cost_view`, and session listing fast without re-scanning every
// session's JSON-lines file on every CLI invocation. It is fully
// reconstructible from `reindex`.
const SCHEMA_VERSION: i32 = 1;

pub struct Index {
    conn: Connection,
}

impl Index {
    pub fn open(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join("index.sqlite3");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let index = Self { conn };
        index.init_schema()?;
        Ok(index)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        let current_version: i32 = self.conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if current_version != SCHEMA_VERSION {
            self.conn.execute_batch(
                "DROP TABLE IF EXISTS evidence_rows; DROP TABLE IF EXISTS sessions;",
            )?;
        }

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                last_turn INTEGER DEFAULT 0,
                last_seen_at TEXT
            );

            CREATE TABLE IF NOT EXISTS evidence_rows (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                turn INTEGER NOT NULL,
                tool TEXT NOT NULL,
                skill TEXT,
                verdict TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_evidence_session ON evidence_rows(session_id);
            CREATE INDEX IF NOT EXISTS idx_evidence_tool ON evidence_rows(tool);
            CREATE INDEX IF NOT EXISTS idx_evidence_skill ON evidence_rows(skill);
            "#,
        )?;
        self.conn
            .execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])?;
        Ok(())
    }

    pub fn index_evidence_row(&self, row: &EvidenceRow) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO evidence_rows (id, session_id, turn, tool, skill, verdict, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.session_id,
                row.turn as i64,
                row.tool,
                row.skill,
                serde_json::to_string(&row.verdict).unwrap_or_default(),
                row.created_at.to_rfc3339(),
            ],
        )?;
        self.conn.execute(
            "INSERT INTO sessions (id, last_turn, last_seen_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                last_turn = MAX(last_turn, excluded.last_turn),
                last_seen_at = excluded.last_seen_at",
            params![row.session_id, row.turn as i64, row.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn session_last_turn(&self, session_id: &str) -> Result<Option<u64>> {
        let turn: Option<i64> = self
            .conn
            .query_row(
                "SELECT last_turn FROM sessions WHERE id = ?1",
                params![session_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(turn.map(|t| t as u64))
    }

    pub fn list_session_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM sessions ORDER BY last_seen_at DESC")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count_by_tool(&self, tool: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM evidence_rows WHERE tool = ?1",
            params![tool],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Verdict;
    use chrono::Utc;

    fn row(session_id: &str, turn: u64, tool: &str) -> EvidenceRow {
        EvidenceRow {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            turn,
            tool: tool.to_string(),
            args_summary: String::new(),
            output_hash: String::new(),
            output_summary: String::new(),
            verdict: Verdict::Pass,
            skill: None,
            created_at: Utc::now(),
            prev_hash: None,
            hash: "h".to_string(),
        }
    }

    #[test]
    fn indexes_and_tracks_last_turn() {
        let index = Index::open_in_memory().unwrap();
        index.index_evidence_row(&row("s1", 1, "bash")).unwrap();
        index.index_evidence_row(&row("s1", 3, "edit")).unwrap();
        assert_eq!(index.session_last_turn("s1").unwrap(), Some(3));
        assert_eq!(index.count_by_tool("bash").unwrap(), 1);
    }

    #[test]
    fn lists_indexed_sessions() {
        let index = Index::open_in_memory().unwrap();
        index.index_evidence_row(&row("a", 1, "bash")).unwrap();
        index.index_evidence_row(&row("b", 1, "bash")).unwrap();
        let mut ids = index.list_session_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
