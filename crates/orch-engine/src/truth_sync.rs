use std::collections::HashMap;

use chrono::{DateTime, Utc};
use orch_types::{FactStatus, Severity, TaskState, TruthFact};

/// Observation about one completed tool call, the raw material TruthSync
/// derives facts from.
pub struct ToolOutcome<'a> {
    pub tool: &'a str,
    pub success: bool,
    pub evidence_id: &'a str,
    pub output_summary: &'a str,
    pub at: DateTime<Utc>,
}

/// Derives and tracks truth facts from tool artifacts (command failures,
/// diagnostic aggregates) and keeps task blockers synced to them. One
/// instance per session; folded purely from the event stream, no I/O.
#[derive(Default)]
pub struct TruthSync {
    facts: HashMap<String, TruthFact>,
}

impl TruthSync {
    pub fn new() -> Self {
        Self::default()
    }

    fn fact_id(tool: &str) -> String {
        format!("tool-failure:{tool}")
    }

    /// Upserts or resolves a fact for this tool outcome. A failing call
    /// opens or touches an `active` fact; a successful call resolves any
    /// existing active fact for that tool. Returns the affected fact, if
    /// any changed.
    pub fn observe_tool_outcome(&mut self, outcome: ToolOutcome) -> Option<TruthFact> {
        let id = Self::fact_id(outcome.tool);
        if outcome.success {
            if let Some(fact) = self.facts.get_mut(&id) {
                if fact.status == FactStatus::Active {
                    fact.resolve(outcome.at);
                    return Some(fact.clone());
                }
            }
            return None;
        }

        let fact = self.facts.entry(id.clone()).or_insert_with(|| TruthFact {
            id: id.clone(),
            kind: "tool_failure".to_string(),
            severity: Severity::Error,
            status: FactStatus::Active,
            summary: format!("{} is failing", outcome.tool),
            details: outcome.output_summary.to_string(),
            evidence_ids: Vec::new(),
            first_seen_at: outcome.at,
            last_seen_at: outcome.at,
        });
        if fact.status == FactStatus::Resolved {
            // Re-opening: a new occurrence under the same id, not a reverse
            // transition of the prior resolved occurrence.
            fact.status = FactStatus::Active;
            fact.first_seen_at = outcome.at;
            fact.evidence_ids.clear();
        }
        fact.details = outcome.output_summary.to_string();
        fact.touch(outcome.evidence_id, outcome.at);
        Some(fact.clone())
    }

    pub fn active_facts(&self) -> Vec<&TruthFact> {
        self.facts.values().filter(|f| f.status == FactStatus::Active).collect()
    }

    pub fn get(&self, id: &str) -> Option<&TruthFact> {
        self.facts.get(id)
    }

    /// Applies a resolved fact to task state, clearing any blocker that
    /// points at it. Returns the ids of blockers cleared.
    pub fn sync_task_blockers(&self, fact: &TruthFact, tasks: &mut TaskState) -> Vec<String> {
        if fact.status != FactStatus::Resolved {
            return Vec::new();
        }
        tasks.resolve_blockers_for_fact(&fact.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_types::{Blocker, TaskItem, TaskStatus};

    fn outcome(tool: &'static str, success: bool) -> ToolOutcome<'static> {
        ToolOutcome { tool, success, evidence_id: "ev1", output_summary: "boom", at: Utc::now() }
    }

    #[test]
    fn failure_opens_fact_success_resolves_it() {
        let mut sync = TruthSync::new();
        let fact = sync.observe_tool_outcome(outcome("bash", false)).unwrap();
        assert_eq!(fact.status, FactStatus::Active);
        assert_eq!(sync.active_facts().len(), 1);

        let resolved = sync.observe_tool_outcome(outcome("bash", true)).unwrap();
        assert_eq!(resolved.status, FactStatus::Resolved);
        assert_eq!(sync.active_facts().len(), 0);
    }

    #[test]
    fn success_with_no_active_fact_is_a_no_op() {
        let mut sync = TruthSync::new();
        assert!(sync.observe_tool_outcome(outcome("bash", true)).is_none());
    }

    #[test]
    fn resolved_fact_clears_matching_blocker() {
        let mut sync = TruthSync::new();
        let fact = sync.observe_tool_outcome(outcome("bash", false)).unwrap();
        let mut tasks = TaskState {
            spec: "fix it".to_string(),
            items: vec![TaskItem { id: "t1".into(), text: "fix bash".into(), status: TaskStatus::Blocked }],
            blockers: vec![Blocker {
                id: "b1".into(),
                message: "bash failing".into(),
                source: "truth_sync".into(),
                truth_fact_id: Some(fact.id.clone()),
            }],
        };
        let resolved = sync.observe_tool_outcome(outcome("bash", true)).unwrap();
        let cleared = sync.sync_task_blockers(&resolved, &mut tasks);
        assert_eq!(cleared, vec!["b1".to_string()]);
        assert!(tasks.blockers.is_empty());
    }
}
