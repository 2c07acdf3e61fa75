use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use orch_types::{Event, EventFilter};

use crate::error::Result;

/// Outcome of one `append`. `Degraded` means the event is observed by
/// in-process readers but was not durably written; the caller is
/// responsible for emitting a `persistence_error` event, per the
/// persistence error-handling contract (never silently dropped).
#[derive(Debug)]
pub enum AppendOutcome {
    Persisted,
    Degraded { io_error: String },
}

struct SessionLog {
    file: Option<File>,
    /// Copy-on-read in-memory tail; readers snapshot this plus the current
    /// on-disk file rather than sharing a live handle.
    tail: Vec<Event>,
}

/// Append-only per-session event log, one JSON-lines file per session under
/// `events/`. Append is atomic with respect to readers on the same process:
/// writers serialize per session via a per-session mutex; readers take a
/// consistent snapshot. No ordering guarantee across sessions; strict FIFO
/// within a session.
pub struct EventStore {
    root: PathBuf,
    sessions: RwLock<HashMap<String, Mutex<SessionLog>>>,
}

impl EventStore {
    pub fn open(workspace_root: &Path) -> Self {
        Self {
            root: workspace_root.join("events"),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{session_id}.jsonl"))
    }

    fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut SessionLog) -> R) -> R {
        {
            let sessions = self.sessions.read().unwrap();
            if let Some(log) = sessions.get(session_id) {
                return f(&mut log.lock().unwrap());
            }
        }
        let mut sessions = self.sessions.write().unwrap();
        let log = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Mutex::new(SessionLog { file: None, tail: Vec::new() }));
        f(&mut log.lock().unwrap())
    }

    pub fn append(&self, event: Event) -> AppendOutcome {
        let session_id = event.session_id.clone();
        let path = self.session_path(&session_id);
        let line = match serde_json::to_string(&event) {
            Ok(l) => l,
            Err(err) => {
                tracing::error!(session_id, error = %err, "failed to serialize event");
                return self.with_session(&session_id, |log| {
                    log.tail.push(event);
                    AppendOutcome::Degraded { io_error: err.to_string() }
                });
            }
        };

        self.with_session(&session_id, |log| {
            if log.file.is_none() {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                log.file = OpenOptions::new().create(true).append(true).open(&path).ok();
            }

            let outcome = match &mut log.file {
                Some(file) => match writeln!(file, "{line}").and_then(|_| file.flush()) {
                    Ok(()) => AppendOutcome::Persisted,
                    Err(err) => {
                        tracing::error!(session_id, error = %err, "event append failed");
                        log.file = None;
                        AppendOutcome::Degraded { io_error: err.to_string() }
                    }
                },
                None => AppendOutcome::Degraded { io_error: "could not open event log".to_string() },
            };

            log.tail.push(event);
            outcome
        })
    }

    /// List events for a session, newest appends included even if not yet
    /// flushed from the in-memory tail (a reader racing an in-flight append
    /// on another thread of this process still sees a consistent prefix:
    /// either before or after that append, never a torn line).
    pub fn list(&self, session_id: &str, filter: Option<&EventFilter>) -> Result<Vec<Event>> {
        let path = self.session_path(session_id);
        let mut events = if path.exists() {
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut events = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(&line) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        tracing::warn!(session_id, error = %err, "skipping corrupt event line");
                    }
                }
            }
            events
        } else {
            Vec::new()
        };

        // Merge in any in-memory-only (degraded) tail entries not yet on disk.
        self.with_session(session_id, |log| {
            let on_disk_ids: std::collections::HashSet<_> = events.iter().map(|e| e.id).collect();
            for event in &log.tail {
                if !on_disk_ids.contains(&event.id) {
                    events.push(event.clone());
                }
            }
        });

        if let Some(filter) = filter {
            events.retain(|e| filter.matches(e));
            if let Some(n) = filter.last_n {
                let start = events.len().saturating_sub(n);
                events = events.split_off(start);
            }
        }

        Ok(events)
    }

    /// Drop per-session in-memory caches (open file handle, tail buffer).
    /// On-disk state is untouched.
    pub fn clear_session_cache(&self, session_id: &str) {
        self.sessions.write().unwrap().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::EventKind;

    #[test]
    fn append_then_list_preserves_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path());
        for i in 0..5 {
            let event = Event::new("s1", EventKind::TurnStart, serde_json::json!({"i": i}));
            assert!(matches!(store.append(event), AppendOutcome::Persisted));
        }
        let events = store.list("s1", None).unwrap();
        assert_eq!(events.len(), 5);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.payload["i"], i);
        }
    }

    #[test]
    fn sessions_do_not_cross_contaminate() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path());
        store.append(Event::new("s1", EventKind::TurnStart, serde_json::Value::Null));
        store.append(Event::new("s2", EventKind::TurnStart, serde_json::Value::Null));
        assert_eq!(store.list("s1", None).unwrap().len(), 1);
        assert_eq!(store.list("s2", None).unwrap().len(), 1);
    }

    #[test]
    fn clear_session_cache_does_not_delete_on_disk_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path());
        store.append(Event::new("s1", EventKind::TurnStart, serde_json::Value::Null));
        store.clear_session_cache("s1");
        assert_eq!(store.list("s1", None).unwrap().len(), 1);
    }

    #[test]
    fn filter_by_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path());
        for i in 0..10 {
            store.append(Event::new("s1", EventKind::TurnStart, serde_json::json!({"i": i})));
        }
        let filter = EventFilter { last_n: Some(3), ..Default::default() };
        let events = store.list("s1", Some(&filter)).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload["i"], 7);
    }
}
