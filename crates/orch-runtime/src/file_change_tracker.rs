use std::collections::HashMap;
use std::path::{Path, PathBuf};

use orch_core::{resolve_in_workspace, sha256_hex};
use orch_types::{ChangeAction, PatchChange, PatchHistory, PatchSet, RollbackOutcome};

use crate::error::{Error, Result};

fn extract_path_candidates(args: &serde_json::Value) -> Vec<String> {
    let mut found = Vec::new();
    fn walk(value: &serde_json::Value, found: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, v) in map {
                    let key_lower = key.to_lowercase();
                    if (key_lower.contains("path") || key_lower.contains("file")) && v.is_string() {
                        found.push(v.as_str().unwrap().to_string());
                    } else {
                        walk(v, found);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(item, found);
                }
            }
            _ => {}
        }
    }
    walk(args, &mut found);
    found
}

struct BeforeState {
    path: PathBuf,
    existed: bool,
    hash: Option<String>,
    snapshot_path: Option<PathBuf>,
}

/// Captures before/after snapshots around mutating tool calls and produces
/// reversible `PatchSet`s. Snapshots are content-addressed by SHA-256 under
/// `snapshots/<session_id>/<digest>.snap`, so identical content is stored
/// once per session regardless of how many tool calls touch it.
pub struct FileChangeTracker {
    workspace_root: PathBuf,
    snapshots_root: PathBuf,
    history_path_for: Box<dyn Fn(&str) -> PathBuf + Send + Sync>,
    pending: HashMap<String, Vec<BeforeState>>,
}

impl FileChangeTracker {
    pub fn new(workspace_root: PathBuf, state_root: PathBuf) -> Self {
        let snapshots_root = state_root.join("snapshots");
        let history_root = state_root.join("patches");
        Self {
            workspace_root,
            snapshots_root,
            history_path_for: Box::new(move |session_id| history_root.join(format!("{session_id}.json"))),
            pending: HashMap::new(),
        }
    }

    fn snapshot_path(&self, session_id: &str, digest: &str) -> PathBuf {
        self.snapshots_root.join(session_id).join(format!("{digest}.snap"))
    }

    fn load_history(&self, session_id: &str) -> Result<PatchHistory> {
        let path = (self.history_path_for)(session_id);
        if !path.exists() {
            return Ok(PatchHistory { version: 1, session_id: session_id.to_string(), updated_at: chrono::Utc::now(), patch_sets: Vec::new() });
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_history(&self, history: &PatchHistory) -> Result<()> {
        let path = (self.history_path_for)(&history.session_id);
        orch_core::write_atomic(&path, serde_json::to_string_pretty(history)?.as_bytes())?;
        Ok(())
    }

    /// Resolves each `path|file`-keyed argument against the workspace,
    /// dropping any candidate that escapes it, then snapshots the current
    /// content of files that exist.
    pub fn capture_before_tool_call(&mut self, session_id: &str, tool_call_id: &str, args: &serde_json::Value) -> Result<()> {
        let candidates = extract_path_candidates(args);
        let mut states = Vec::new();
        for candidate in candidates {
            let resolved = match resolve_in_workspace(&self.workspace_root, &candidate) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let existed = resolved.exists();
            let (hash, snapshot_path) = if existed {
                let content = std::fs::read(&resolved)?;
                let digest = sha256_hex(&content);
                let snap_path = self.snapshot_path(session_id, &digest);
                if !snap_path.exists() {
                    orch_core::write_atomic(&snap_path, &content)?;
                }
                (Some(digest), Some(snap_path))
            } else {
                (None, None)
            };
            states.push(BeforeState { path: resolved, existed, hash, snapshot_path });
        }
        self.pending.insert(format!("{session_id}:{tool_call_id}"), states);
        Ok(())
    }

    /// Computes after-state for every tracked file, classifies each change,
    /// and (when `success` and something changed) persists a `PatchSet`.
    pub fn complete_tool_call(&mut self, session_id: &str, tool_call_id: &str, success: bool, summary: &str) -> Result<Option<PatchSet>> {
        let Some(before_states) = self.pending.remove(&format!("{session_id}:{tool_call_id}")) else {
            return Ok(None);
        };
        if !success {
            return Ok(None);
        }

        let mut changes = Vec::new();
        for before in before_states {
            let exists_after = before.path.exists();
            let after_hash = if exists_after {
                Some(sha256_hex(&std::fs::read(&before.path)?))
            } else {
                None
            };

            let action = match (before.existed, exists_after, &before.hash, &after_hash) {
                (false, true, _, _) => ChangeAction::Add,
                (true, false, _, _) => ChangeAction::Delete,
                (true, true, b, a) if b != a => ChangeAction::Modify,
                _ => ChangeAction::Unchanged,
            };
            if action == ChangeAction::Unchanged {
                continue;
            }

            changes.push(PatchChange {
                path: before.path.display().to_string(),
                action,
                before_hash: before.hash,
                after_hash,
                before_snapshot_path: before.snapshot_path.map(|p| p.display().to_string()),
            });
        }

        if changes.is_empty() {
            return Ok(None);
        }

        let patch_set = PatchSet {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
            summary: summary.to_string(),
            changes,
        };

        let mut history = self.load_history(session_id)?;
        history.push(patch_set.clone());
        self.save_history(&history)?;

        Ok(Some(patch_set))
    }

    /// LIFO rollback of the most recent patch set. Restores changes in
    /// reverse order: writes back `before` content for modifies/deletes,
    /// removes files that were added. A missing snapshot fails the whole
    /// rollback with `restore_failed`; the history entry is retained.
    pub fn rollback_last(&mut self, session_id: &str) -> Result<RollbackOutcome> {
        let mut history = self.load_history(session_id)?;
        let Some(patch_set) = history.pop_last() else {
            return Ok(RollbackOutcome { ok: false, reason: Some("no patch sets to roll back".to_string()), failed_paths: Vec::new() });
        };

        let mut failed_paths = Vec::new();
        for change in patch_set.changes.iter().rev() {
            let path = Path::new(&change.path);
            match change.action {
                ChangeAction::Add => {
                    if path.exists() {
                        if let Err(_) = std::fs::remove_file(path) {
                            failed_paths.push(change.path.clone());
                        }
                    }
                }
                ChangeAction::Modify | ChangeAction::Delete => {
                    let Some(snap) = &change.before_snapshot_path else {
                        failed_paths.push(change.path.clone());
                        continue;
                    };
                    match std::fs::read(snap).and_then(|content| std::fs::write(path, content)) {
                        Ok(()) => {}
                        Err(_) => failed_paths.push(change.path.clone()),
                    }
                }
                ChangeAction::Unchanged => {}
            }
        }

        if !failed_paths.is_empty() {
            // Keep the entry in history so a retry has something to act on.
            history.push(patch_set);
            self.save_history(&history)?;
            return Err(Error::RestoreFailed { reason: "one or more snapshots missing".to_string(), failed_paths });
        }

        self.save_history(&history)?;
        Ok(RollbackOutcome { ok: true, reason: None, failed_paths: Vec::new() })
    }

    /// Copies distinct patch sets and their snapshots from one session to
    /// another, preserving `created_at` order, then trims to `MAX_HISTORY`.
    pub fn import_session_history(&mut self, from: &str, to: &str) -> Result<()> {
        let source = self.load_history(from)?;
        let mut dest = self.load_history(to)?;
        let existing_ids: std::collections::HashSet<_> = dest.patch_sets.iter().map(|p| p.id.clone()).collect();

        for patch_set in &source.patch_sets {
            if existing_ids.contains(&patch_set.id) {
                continue;
            }
            for change in &patch_set.changes {
                if let Some(snap) = &change.before_snapshot_path {
                    if let Some(digest) = &change.before_hash {
                        let dest_snap = self.snapshot_path(to, digest);
                        if !dest_snap.exists() && Path::new(snap).exists() {
                            if let Some(parent) = dest_snap.parent() {
                                std::fs::create_dir_all(parent)?;
                            }
                            std::fs::copy(snap, &dest_snap)?;
                        }
                    }
                }
            }
            dest.push(patch_set.clone());
        }
        self.save_history(&dest)?;
        Ok(())
    }

    /// Deletes snapshot files no longer referenced by any session's patch
    /// history. Maintenance operation, safe to run opportunistically.
    pub fn gc_snapshots(&self, session_ids: &[String]) -> Result<usize> {
        let mut referenced = std::collections::HashSet::new();
        for session_id in session_ids {
            let history = self.load_history(session_id)?;
            for patch_set in &history.patch_sets {
                for change in &patch_set.changes {
                    if let Some(snap) = &change.before_snapshot_path {
                        referenced.insert(snap.clone());
                    }
                }
            }
        }

        let mut removed = 0;
        for session_id in session_ids {
            let dir = self.snapshots_root.join(session_id);
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if !referenced.contains(&path.display().to_string()) {
                    std::fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (tempfile::TempDir, tempfile::TempDir, FileChangeTracker) {
        let workspace = tempfile::tempdir().unwrap();
        let state = tempfile::tempdir().unwrap();
        let tracker = FileChangeTracker::new(workspace.path().to_path_buf(), state.path().to_path_buf());
        (workspace, state, tracker)
    }

    #[test]
    fn modify_produces_patch_set_with_before_snapshot() {
        let (workspace, _state, mut tracker) = tracker();
        let file = workspace.path().join("a.txt");
        std::fs::write(&file, "before").unwrap();

        let args = serde_json::json!({"file_path": "a.txt"});
        tracker.capture_before_tool_call("s1", "call1", &args).unwrap();
        std::fs::write(&file, "after").unwrap();
        let patch_set = tracker.complete_tool_call("s1", "call1", true, "edit a.txt").unwrap().unwrap();

        assert_eq!(patch_set.changes.len(), 1);
        assert_eq!(patch_set.changes[0].action, ChangeAction::Modify);
    }

    #[test]
    fn rollback_restores_modified_content() {
        let (workspace, _state, mut tracker) = tracker();
        let file = workspace.path().join("a.txt");
        std::fs::write(&file, "before").unwrap();

        tracker.capture_before_tool_call("s1", "call1", &serde_json::json!({"file_path": "a.txt"})).unwrap();
        std::fs::write(&file, "after").unwrap();
        tracker.complete_tool_call("s1", "call1", true, "edit").unwrap();

        let outcome = tracker.rollback_last("s1").unwrap();
        assert!(outcome.ok);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "before");
    }

    #[test]
    fn escaping_path_is_dropped_not_tracked() {
        let (_workspace, _state, mut tracker) = tracker();
        tracker.capture_before_tool_call("s1", "call1", &serde_json::json!({"file_path": "../../etc/passwd"})).unwrap();
        let result = tracker.complete_tool_call("s1", "call1", true, "noop").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn add_then_rollback_removes_file() {
        let (workspace, _state, mut tracker) = tracker();
        let file = workspace.path().join("new.txt");
        tracker.capture_before_tool_call("s1", "call1", &serde_json::json!({"file_path": "new.txt"})).unwrap();
        std::fs::write(&file, "hello").unwrap();
        let patch_set = tracker.complete_tool_call("s1", "call1", true, "add").unwrap().unwrap();
        assert_eq!(patch_set.changes[0].action, ChangeAction::Add);

        tracker.rollback_last("s1").unwrap();
        assert!(!file.exists());
    }
}
