use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use orch_core::{canonical_json, sha256_hex};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Blocked,
    Unknown,
}

/// One hash-chained evidence row. `hash = H(prev_hash || canonical(row))`
/// where `row` excludes the `hash` field itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRow {
    pub id: String,
    pub session_id: String,
    pub turn: u64,
    pub tool: String,
    pub args_summary: String,
    pub output_hash: String,
    pub output_summary: String,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    pub hash: String,
}

fn row_digest_input(row: &EvidenceRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.id,
        "session_id": row.session_id,
        "turn": row.turn,
        "tool": row.tool,
        "args_summary": row.args_summary,
        "output_hash": row.output_hash,
        "output_summary": row.output_summary,
        "verdict": row.verdict,
        "skill": row.skill,
        "created_at": row.created_at,
        "prev_hash": row.prev_hash,
    })
}

fn compute_hash(row: &EvidenceRow) -> String {
    let payload = row_digest_input(row);
    let prefix = row.prev_hash.clone().unwrap_or_default();
    sha256_hex(format!("{prefix}{}", canonical_json(&payload)).as_bytes())
}

pub struct NewEvidence {
    pub session_id: String,
    pub turn: u64,
    pub tool: String,
    pub args_summary: String,
    pub output_hash: String,
    pub output_summary: String,
    pub verdict: Verdict,
    pub skill: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Filter {
    pub tool: Option<String>,
    pub skill: Option<String>,
    pub verdict: Option<Verdict>,
    pub last_n: Option<usize>,
}

/// Hash-chained evidence ledger, one row per tool invocation. The chain is
/// tracked independently per session; a broken chain for a session is
/// reported but non-fatal — subsequent appends start a fresh chain from
/// that point rather than refusing to record new evidence.
pub struct Ledger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

struct LedgerState {
    rows: Vec<EvidenceRow>,
    last_hash_by_session: HashMap<String, Option<String>>,
    broken_sessions: Vec<String>,
}

impl Ledger {
    pub fn open(workspace_root: &Path) -> Result<Self> {
        let path = workspace_root.join("ledger").join("evidence.jsonl");
        let (rows, last_hash_by_session, broken_sessions) = Self::load_and_verify(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(LedgerState { rows, last_hash_by_session, broken_sessions }),
        })
    }

    fn load_and_verify(
        path: &Path,
    ) -> Result<(Vec<EvidenceRow>, HashMap<String, Option<String>>, Vec<String>)> {
        let mut rows = Vec::new();
        let mut last_hash_by_session: HashMap<String, Option<String>> = HashMap::new();
        let mut broken_sessions = Vec::new();

        if path.exists() {
            let file = std::fs::File::open(path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let row: EvidenceRow = serde_json::from_str(&line)?;
                // The logical chain tip only advances on a row that verifies
                // against it. A row that doesn't verify is kept in the file
                // for audit but does not move the tip, so a later append
                // (per spec.md's "new chain at the last valid row") resumes
                // from the last row that did verify.
                let expected_prev = last_hash_by_session.get(&row.session_id).cloned().flatten();
                let chain_ok = row.prev_hash == expected_prev && compute_hash(&row) == row.hash;
                if chain_ok {
                    last_hash_by_session.insert(row.session_id.clone(), Some(row.hash.clone()));
                } else if !broken_sessions.contains(&row.session_id) {
                    tracing::warn!(session_id = %row.session_id, "evidence hash chain broken, starting new chain");
                    broken_sessions.push(row.session_id.clone());
                }
                rows.push(row);
            }
        }

        Ok((rows, last_hash_by_session, broken_sessions))
    }

    pub fn append(&self, evidence: NewEvidence) -> Result<EvidenceRow> {
        let mut state = self.state.lock().unwrap();
        let prev_hash = state
            .last_hash_by_session
            .get(&evidence.session_id)
            .cloned()
            .flatten();

        let mut row = EvidenceRow {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: evidence.session_id.clone(),
            turn: evidence.turn,
            tool: evidence.tool,
            args_summary: evidence.args_summary,
            output_hash: evidence.output_hash,
            output_summary: evidence.output_summary,
            verdict: evidence.verdict,
            skill: evidence.skill,
            created_at: Utc::now(),
            prev_hash: prev_hash.clone(),
            hash: String::new(),
        };
        row.hash = compute_hash(&row);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&row)?)?;

        state
            .last_hash_by_session
            .insert(evidence.session_id, Some(row.hash.clone()));
        state.rows.push(row.clone());
        Ok(row)
    }

    pub fn query(&self, session_id: Option<&str>, filter: &Filter) -> Vec<EvidenceRow> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<EvidenceRow> = state
            .rows
            .iter()
            .filter(|r| session_id.is_none_or(|s| r.session_id == s))
            .filter(|r| filter.tool.as_deref().is_none_or(|t| r.tool == t))
            .filter(|r| filter.skill.as_deref().is_none_or(|s| r.skill.as_deref() == Some(s)))
            .filter(|r| filter.verdict.is_none_or(|v| r.verdict == v))
            .cloned()
            .collect();

        if let Some(n) = filter.last_n {
            let start = rows.len().saturating_sub(n);
            rows = rows.split_off(start);
        }
        rows
    }

    pub fn is_chain_broken(&self, session_id: &str) -> bool {
        self.state.lock().unwrap().broken_sessions.iter().any(|s| s == session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(session_id: &str, turn: u64, tool: &str) -> NewEvidence {
        NewEvidence {
            session_id: session_id.to_string(),
            turn,
            tool: tool.to_string(),
            args_summary: "{}".to_string(),
            output_hash: "abc".to_string(),
            output_summary: "ok".to_string(),
            verdict: Verdict::Pass,
            skill: None,
        }
    }

    #[test]
    fn hash_chain_links_consecutive_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        let first = ledger.append(evidence("s1", 1, "bash")).unwrap();
        let second = ledger.append(evidence("s1", 2, "edit")).unwrap();
        assert_eq!(second.prev_hash.as_deref(), Some(first.hash.as_str()));
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn chains_are_independent_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        let a1 = ledger.append(evidence("a", 1, "bash")).unwrap();
        let b1 = ledger.append(evidence("b", 1, "bash")).unwrap();
        assert!(a1.prev_hash.is_none());
        assert!(b1.prev_hash.is_none());
    }

    #[test]
    fn query_filters_by_tool_and_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        ledger.append(evidence("s1", 1, "bash")).unwrap();
        ledger.append(evidence("s1", 2, "edit")).unwrap();
        ledger.append(evidence("s1", 3, "bash")).unwrap();

        let filter = Filter { tool: Some("bash".to_string()), ..Default::default() };
        let rows = ledger.query(Some("s1"), &filter);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn reopening_verifies_existing_chain() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger.append(evidence("s1", 1, "bash")).unwrap();
            ledger.append(evidence("s1", 2, "edit")).unwrap();
        }
        let reopened = Ledger::open(dir.path()).unwrap();
        assert!(!reopened.is_chain_broken("s1"));
        assert_eq!(reopened.query(Some("s1"), &Filter::default()).len(), 2);
    }

    #[test]
    fn broken_chain_is_reported_and_new_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger").join("evidence.jsonl");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let tampered = EvidenceRow {
            id: "x".into(),
            session_id: "s1".into(),
            turn: 1,
            tool: "bash".into(),
            args_summary: "{}".into(),
            output_hash: "abc".into(),
            output_summary: "ok".into(),
            verdict: Verdict::Pass,
            skill: None,
            created_at: Utc::now(),
            prev_hash: None,
            hash: "not-a-real-hash".into(),
        };
        std::fs::write(&path, format!("{}\n", serde_json::to_string(&tampered).unwrap())).unwrap();

        let ledger = Ledger::open(dir.path()).unwrap();
        assert!(ledger.is_chain_broken("s1"));
        // The tampered row never verified, so the chain tip is still at its
        // start: a fresh append begins a new chain with no predecessor.
        let appended = ledger.append(evidence("s1", 2, "edit")).unwrap();
        assert_eq!(appended.prev_hash, None);
    }
}
