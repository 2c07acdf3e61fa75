use std::collections::HashMap;

use orch_types::{
    AlertKind, BudgetAction, BudgetStatus, CostAlert, CostSnapshot, ModelTotals, SkillTotals,
    ToolTotals, UsageDelta,
};

/// Limits governing a single session's cost tracker. Mirrors the config
/// knobs a deployment sets in `RuntimeConfig`.
#[derive(Debug, Clone)]
pub struct CostLimits {
    pub max_cost_usd_per_session: f64,
    pub alert_threshold_ratio: f64,
    pub max_cost_usd_per_skill: HashMap<String, f64>,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            max_cost_usd_per_session: 5.0,
            alert_threshold_ratio: 0.8,
            max_cost_usd_per_skill: HashMap::new(),
        }
    }
}

pub struct UsageRecord {
    pub usage: UsageDelta,
    pub model: String,
    pub turn: u64,
    pub skill: Option<String>,
}

/// Accumulates token/cost usage per session, model, skill, and tool, and
/// raises budget alerts. Pure in-memory state; `restore` re-seats it from
/// a tape checkpoint so replaying the remaining event tail does not
/// double-fire alerts already recorded in the checkpoint.
pub struct CostTracker {
    limits: CostLimits,
    snapshot: CostSnapshot,
    session_threshold_alerted: bool,
    session_cap_alerted: bool,
    skill_cap_alerted: std::collections::HashSet<String>,
    /// Tool call counts for the current turn, reset on each `begin_turn`.
    calls_this_turn: HashMap<String, u64>,
}

impl CostTracker {
    pub fn new(limits: CostLimits) -> Self {
        Self {
            limits,
            snapshot: CostSnapshot::default(),
            session_threshold_alerted: false,
            session_cap_alerted: false,
            skill_cap_alerted: std::collections::HashSet::new(),
            calls_this_turn: HashMap::new(),
        }
    }

    pub fn begin_turn(&mut self) {
        self.calls_this_turn.clear();
    }

    pub fn record_tool_call(&mut self, tool_name: &str, skill: Option<&str>) {
        *self.calls_this_turn.entry(tool_name.to_string()).or_insert(0) += 1;
        self.snapshot.by_tool.entry(tool_name.to_string()).or_default().call_count += 1;
        if let Some(skill) = skill {
            self.snapshot.by_skill.entry(skill.to_string()).or_insert_with(SkillTotals::default).tool_call_count += 1;
        }
    }

    /// Tool calls recorded so far under `skill`'s name, for `maxToolCalls`
    /// admission checks.
    pub fn skill_tool_calls(&self, skill: &str) -> u64 {
        self.snapshot.by_skill.get(skill).map(|t| t.tool_call_count).unwrap_or(0)
    }

    /// Tokens attributed to `skill` so far, for `maxTokens` admission
    /// checks.
    pub fn skill_tokens(&self, skill: &str) -> u64 {
        self.snapshot.by_skill.get(skill).map(|t| t.totals.total_tokens).unwrap_or(0)
    }

    /// Records LLM usage and attributes it across the tools called on this
    /// turn in proportion to their call counts; a single virtual `"llm"`
    /// tool absorbs it when no tool calls are on record for the turn.
    pub fn record_usage(&mut self, record: UsageRecord) -> Vec<CostAlert> {
        self.snapshot.session.add_usage(&record.usage);
        self.snapshot
            .by_model
            .entry(record.model.clone())
            .or_insert_with(ModelTotals::default)
            .totals
            .add_usage(&record.usage);

        if let Some(skill) = &record.skill {
            let totals = self.snapshot.by_skill.entry(skill.clone()).or_insert_with(SkillTotals::default);
            totals.totals.add_usage(&record.usage);
            totals.usage_count += 1;
            totals.turn_count = record.turn;
        }

        self.attribute_to_tools(&record.usage);

        let mut fired = Vec::new();
        let session_cost = self.snapshot.session.total_cost_usd;
        let threshold = self.limits.max_cost_usd_per_session * self.limits.alert_threshold_ratio;

        if !self.session_cap_alerted && session_cost >= self.limits.max_cost_usd_per_session {
            self.session_cap_alerted = true;
            let alert = CostAlert { kind: AlertKind::SessionCap, scope: None, at_cost_usd: session_cost };
            self.snapshot.alerts.push(alert.clone());
            fired.push(alert);
        } else if !self.session_threshold_alerted && session_cost >= threshold {
            self.session_threshold_alerted = true;
            let alert = CostAlert { kind: AlertKind::SessionThreshold, scope: None, at_cost_usd: session_cost };
            self.snapshot.alerts.push(alert.clone());
            fired.push(alert);
        }

        if let Some(skill) = &record.skill {
            if let Some(cap) = self.limits.max_cost_usd_per_skill.get(skill) {
                let skill_cost = self.snapshot.by_skill[skill].totals.total_cost_usd;
                if !self.skill_cap_alerted.contains(skill) && skill_cost >= *cap {
                    self.skill_cap_alerted.insert(skill.clone());
                    let alert = CostAlert {
                        kind: AlertKind::SkillCap,
                        scope: Some(skill.clone()),
                        at_cost_usd: skill_cost,
                    };
                    self.snapshot.alerts.push(alert.clone());
                    fired.push(alert);
                }
            }
        }

        fired
    }

    fn attribute_to_tools(&mut self, usage: &UsageDelta) {
        let total_calls: u64 = self.calls_this_turn.values().sum();
        if total_calls == 0 {
            let entry = self.snapshot.by_tool.entry("llm".to_string()).or_insert_with(ToolTotals::default);
            entry.allocated_tokens += usage.total_tokens;
            entry.allocated_cost_usd += usage.cost_usd;
            return;
        }
        for (tool, calls) in &self.calls_this_turn {
            let share = *calls as f64 / total_calls as f64;
            let entry = self.snapshot.by_tool.entry(tool.clone()).or_insert_with(ToolTotals::default);
            entry.allocated_tokens += (usage.total_tokens as f64 * share).round() as u64;
            entry.allocated_cost_usd += usage.cost_usd * share;
        }
    }

    pub fn budget_status(&self) -> BudgetStatus {
        let session_exceeded = self.snapshot.session.total_cost_usd >= self.limits.max_cost_usd_per_session;
        let skill_exceeded = !self.skill_cap_alerted.is_empty();
        let (action, reason) = if session_exceeded {
            (BudgetAction::BlockTools, Some("session cost cap reached".to_string()))
        } else if self.session_threshold_alerted {
            (BudgetAction::Warn, Some("session cost threshold reached".to_string()))
        } else {
            (BudgetAction::Ok, None)
        };
        BudgetStatus { action, session_exceeded, skill_exceeded, blocked: session_exceeded, reason }
    }

    pub fn snapshot(&self) -> CostSnapshot {
        self.snapshot.clone()
    }

    /// Re-seats totals from a checkpoint and reconstructs the `*_alerted`
    /// flags from the restored alert list, so replaying events after the
    /// checkpoint does not re-fire alerts already recorded in it.
    pub fn restore(&mut self, snapshot: CostSnapshot) {
        self.session_threshold_alerted =
            snapshot.alerts.iter().any(|a| a.kind == AlertKind::SessionThreshold);
        self.session_cap_alerted = snapshot.alerts.iter().any(|a| a.kind == AlertKind::SessionCap);
        self.skill_cap_alerted = snapshot
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::SkillCap)
            .filter_map(|a| a.scope.clone())
            .collect();
        self.snapshot = snapshot;
        self.calls_this_turn.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(cost: f64) -> UsageDelta {
        UsageDelta { input_tokens: 100, output_tokens: 50, total_tokens: 150, cost_usd: cost, ..Default::default() }
    }

    #[test]
    fn threshold_then_cap_each_fire_once() {
        let mut limits = CostLimits::default();
        limits.max_cost_usd_per_session = 1.0;
        limits.alert_threshold_ratio = 0.5;
        let mut tracker = CostTracker::new(limits);

        let first = tracker.record_usage(UsageRecord { usage: usage(0.6), model: "m".into(), turn: 1, skill: None });
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, AlertKind::SessionThreshold);

        let second = tracker.record_usage(UsageRecord { usage: usage(0.1), model: "m".into(), turn: 1, skill: None });
        assert!(second.is_empty());

        let third = tracker.record_usage(UsageRecord { usage: usage(0.5), model: "m".into(), turn: 1, skill: None });
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].kind, AlertKind::SessionCap);
    }

    #[test]
    fn tool_attribution_splits_by_call_count() {
        let mut tracker = CostTracker::new(CostLimits::default());
        tracker.begin_turn();
        tracker.record_tool_call("bash", None);
        tracker.record_tool_call("bash", None);
        tracker.record_tool_call("edit", None);
        tracker.record_usage(UsageRecord { usage: usage(0.3), model: "m".into(), turn: 1, skill: None });

        let snap = tracker.snapshot();
        let bash_cost = snap.by_tool["bash"].allocated_cost_usd;
        let edit_cost = snap.by_tool["edit"].allocated_cost_usd;
        assert!((bash_cost - 0.2).abs() < 1e-9);
        assert!((edit_cost - 0.1).abs() < 1e-9);
    }

    #[test]
    fn skill_tool_call_count_is_tracked_per_skill() {
        let mut tracker = CostTracker::new(CostLimits::default());
        tracker.record_tool_call("bash", Some("editor"));
        tracker.record_tool_call("grep", Some("editor"));
        tracker.record_tool_call("bash", Some("reviewer"));
        assert_eq!(tracker.skill_tool_calls("editor"), 2);
        assert_eq!(tracker.skill_tool_calls("reviewer"), 1);
        assert_eq!(tracker.skill_tool_calls("unknown"), 0);
    }

    #[test]
    fn restore_prevents_double_alert() {
        let mut limits = CostLimits::default();
        limits.max_cost_usd_per_session = 1.0;
        let mut tracker = CostTracker::new(limits.clone());
        tracker.record_usage(UsageRecord { usage: usage(1.5), model: "m".into(), turn: 1, skill: None });
        let snapshot = tracker.snapshot();

        let mut restored = CostTracker::new(limits);
        restored.restore(snapshot);
        let fired = restored.record_usage(UsageRecord { usage: usage(0.0), model: "m".into(), turn: 2, skill: None });
        assert!(fired.is_empty());
    }
}
