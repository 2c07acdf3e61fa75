use orch_types::{Blocker, TaskItem, TaskState, TaskStatus};

/// Folds task-list events into `TaskState`. Kept separate from `TruthSync`
/// because task edits come from the agent's own `task_update` events, not
/// from tool-outcome derivation, even though both converge on blockers.
#[derive(Default)]
pub struct TaskLedger {
    state: TaskState,
}

impl TaskLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_spec(&mut self, spec: impl Into<String>) {
        self.state.spec = spec.into();
    }

    pub fn upsert_item(&mut self, id: &str, text: &str, status: TaskStatus) {
        if let Some(item) = self.state.items.iter_mut().find(|i| i.id == id) {
            item.text = text.to_string();
            item.status = status;
        } else {
            self.state.items.push(TaskItem { id: id.to_string(), text: text.to_string(), status });
        }
    }

    pub fn add_blocker(&mut self, blocker: Blocker) {
        self.state.blockers.push(blocker);
    }

    pub fn resolve_blockers_for_fact(&mut self, truth_fact_id: &str) -> Vec<String> {
        self.state.resolve_blockers_for_fact(truth_fact_id)
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn restore(&mut self, state: TaskState) {
        self.state = state;
    }

    /// A task with no remaining blockers that naturally referenced them
    /// (i.e. it was marked `blocked` and now has none) moves back to `todo`.
    pub fn unblock_items_with_no_blockers(&mut self, item_ids: &[String]) {
        for id in item_ids {
            if let Some(item) = self.state.items.iter_mut().find(|i| &i.id == id) {
                if item.status == TaskStatus::Blocked {
                    item.status = TaskStatus::Todo;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_update_keeps_single_item() {
        let mut ledger = TaskLedger::new();
        ledger.upsert_item("1", "write tests", TaskStatus::Todo);
        ledger.upsert_item("1", "write tests", TaskStatus::Doing);
        assert_eq!(ledger.state().items.len(), 1);
        assert_eq!(ledger.state().items[0].status, TaskStatus::Doing);
    }

    #[test]
    fn resolving_blocker_frees_item() {
        let mut ledger = TaskLedger::new();
        ledger.upsert_item("1", "ship it", TaskStatus::Blocked);
        ledger.add_blocker(Blocker {
            id: "b1".into(),
            message: "ci red".into(),
            source: "truth_sync".into(),
            truth_fact_id: Some("fact-1".into()),
        });
        let cleared = ledger.resolve_blockers_for_fact("fact-1");
        ledger.unblock_items_with_no_blockers(&["1".to_string()]);
        assert_eq!(cleared, vec!["b1".to_string()]);
        assert_eq!(ledger.state().items[0].status, TaskStatus::Todo);
    }
}
