use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Add,
    Modify,
    Delete,
    Unchanged,
}

/// One file's before/after state within a PatchSet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchChange {
    pub path: String,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_hash: Option<String>,
    /// Present iff a before-state snapshot exists on disk for this path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_snapshot_path: Option<String>,
}

impl PatchChange {
    pub fn before_exists(&self) -> bool {
        self.before_snapshot_path.is_some()
    }
}

/// A commit-like record of the file changes produced by one tool
/// invocation. Reversible via `FileChangeTracker::rollback_last`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSet {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub summary: String,
    pub changes: Vec<PatchChange>,
}

/// Persisted per-session PatchSet history file shape
/// (`snapshots/<session>/patchsets.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchHistory {
    pub version: u32,
    pub session_id: String,
    pub updated_at: DateTime<Utc>,
    pub patch_sets: Vec<PatchSet>,
}

impl PatchHistory {
    pub const MAX_HISTORY: usize = 64;

    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            version: 1,
            session_id: session_id.into(),
            updated_at: Utc::now(),
            patch_sets: Vec::new(),
        }
    }

    pub fn push(&mut self, patch: PatchSet) {
        self.patch_sets.push(patch);
        if self.patch_sets.len() > Self::MAX_HISTORY {
            let overflow = self.patch_sets.len() - Self::MAX_HISTORY;
            self.patch_sets.drain(0..overflow);
        }
        self.updated_at = Utc::now();
    }

    pub fn pop_last(&mut self) -> Option<PatchSet> {
        self.patch_sets.pop()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub failed_paths: Vec<String>,
}

impl RollbackOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            reason: None,
            failed_paths: Vec::new(),
        }
    }

    pub fn restore_failed(failed_paths: Vec<String>) -> Self {
        Self {
            ok: false,
            reason: Some("restore_failed".to_string()),
            failed_paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_caps_at_64() {
        let mut history = PatchHistory::new("s1");
        for i in 0..70 {
            history.push(PatchSet {
                id: format!("p{i}"),
                created_at: Utc::now(),
                summary: String::new(),
                changes: vec![],
            });
        }
        assert_eq!(history.patch_sets.len(), PatchHistory::MAX_HISTORY);
        assert_eq!(history.patch_sets.first().unwrap().id, "p6");
        assert_eq!(history.patch_sets.last().unwrap().id, "p69");
    }
}
