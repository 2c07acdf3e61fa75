use orch_engine::{ContextBudget, CostLimits, CostTracker};
use orch_store::{EventStore, Ledger, NewEvidence, Verdict};
use orch_types::{BudgetAction, Event, EventKind, SkillContract};

use crate::file_change_tracker::FileChangeTracker;
use crate::skill_registry::SkillRegistry;
use crate::truth_bridge::truth_outcome_from_result;

pub const ALWAYS_ALLOWED_LIFECYCLE_TOOLS: &[&str] = &["turn_start", "turn_end", "session_compact", "session_shutdown"];

pub enum AllowMode {
    Off,
    Warn,
    Enforce,
}

#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl AdmissionDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    fn block(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: Some(reason.into()) }
    }
}

pub struct ToolCallRequest<'a> {
    pub session_id: &'a str,
    pub tool_call_id: &'a str,
    pub tool_name: &'a str,
    pub args: serde_json::Value,
    pub turn: u64,
    pub skill: Option<&'a SkillContract>,
}

pub struct ToolCallResult {
    pub success: bool,
    pub output_summary: String,
}

/// Admission → before-snapshot → dispatch → result recording → sync, per
/// tool invocation. The caller supplies dispatch via a closure so the
/// pipeline stays agnostic to how a tool is actually executed.
pub struct ToolPipeline<'a> {
    pub events: &'a EventStore,
    pub ledger: &'a Ledger,
    pub files: &'a mut FileChangeTracker,
    pub skills: &'a SkillRegistry,
    pub cost: &'a mut CostTracker,
    pub budget: &'a ContextBudget,
    pub allow_mode: AllowMode,
}

impl<'a> ToolPipeline<'a> {
    pub fn admit(&self, request: &ToolCallRequest) -> AdmissionDecision {
        if ALWAYS_ALLOWED_LIFECYCLE_TOOLS.contains(&request.tool_name) {
            return AdmissionDecision::allow();
        }

        if let Some(skill) = request.skill {
            if skill.is_denied(request.tool_name) {
                return AdmissionDecision::block(format!("{} denies tool {}", skill.name, request.tool_name));
            }
            match self.allow_mode {
                AllowMode::Enforce if !skill.is_allowed(request.tool_name) => {
                    return AdmissionDecision::block(format!("{} does not allow-list tool {}", skill.name, request.tool_name));
                }
                _ => {}
            }

            let calls_so_far = self.cost.skill_tool_calls(&skill.name);
            if calls_so_far >= skill.budget.max_tool_calls as u64 {
                self.events.append(Event::new(
                    request.session_id,
                    EventKind::SkillBudgetWarning,
                    serde_json::json!({"skill": skill.name, "limit": "max_tool_calls", "limit_value": skill.budget.max_tool_calls, "observed": calls_so_far}),
                ).with_turn(request.turn));
                return AdmissionDecision::block(format!("{} exceeded max_tool_calls budget ({})", skill.name, skill.budget.max_tool_calls));
            }

            let tokens_so_far = self.cost.skill_tokens(&skill.name);
            if tokens_so_far >= skill.budget.max_tokens {
                self.events.append(Event::new(
                    request.session_id,
                    EventKind::SkillBudgetWarning,
                    serde_json::json!({"skill": skill.name, "limit": "max_tokens", "limit_value": skill.budget.max_tokens, "observed": tokens_so_far}),
                ).with_turn(request.turn));
                return AdmissionDecision::block(format!("{} exceeded max_tokens budget ({})", skill.name, skill.budget.max_tokens));
            }
        }

        let budget_status = self.cost.budget_status();
        if budget_status.action == BudgetAction::BlockTools {
            return AdmissionDecision::block(budget_status.reason.unwrap_or_else(|| "cost cap reached".to_string()));
        }

        if let Err(reason) = self.budget.check_tool_gate(request.tool_name, ALWAYS_ALLOWED_LIFECYCLE_TOOLS) {
            return AdmissionDecision::block(reason);
        }

        AdmissionDecision::allow()
    }

    /// Runs the full pipeline for one tool call: admission, before
    /// snapshot, the caller-supplied `dispatch`, then result recording and
    /// synchronization. `dispatch` is never called when admission blocks.
    pub fn run(
        &mut self,
        request: ToolCallRequest,
        dispatch: impl FnOnce() -> ToolCallResult,
    ) -> PipelineOutcome {
        let decision = self.admit(&request);
        if !decision.allowed {
            self.events.append(Event::new(
                request.session_id,
                EventKind::ToolCallBlocked,
                serde_json::json!({"tool": request.tool_name, "reason": decision.reason}),
            ).with_turn(request.turn));
            return PipelineOutcome::Blocked { reason: decision.reason.unwrap_or_default() };
        }

        if let Err(err) = self.files.capture_before_tool_call(request.session_id, request.tool_call_id, &request.args) {
            tracing::warn!(error = %err, "before-snapshot capture failed");
        }

        self.cost.record_tool_call(request.tool_name, request.skill.map(|s| s.name.as_str()));
        let result = dispatch();

        let verdict = if result.success { Verdict::Pass } else { Verdict::Fail };
        let evidence = self.ledger.append(NewEvidence {
            session_id: request.session_id.to_string(),
            turn: request.turn,
            tool: request.tool_name.to_string(),
            args_summary: request.args.to_string(),
            output_hash: orch_core::sha256_hex(result.output_summary.as_bytes()),
            output_summary: result.output_summary.clone(),
            verdict,
            skill: request.skill.map(|s| s.name.clone()),
        });

        self.events.append(Event::new(
            request.session_id,
            EventKind::ToolResultRecorded,
            serde_json::json!({"tool": request.tool_name, "success": result.success}),
        ).with_turn(request.turn));

        let truth_outcome = evidence.ok().map(|row| truth_outcome_from_result(&row, result.success, &result.output_summary));

        let patch_set = match self.files.complete_tool_call(request.session_id, request.tool_call_id, result.success, request.tool_name) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "complete_tool_call failed");
                None
            }
        };

        PipelineOutcome::Completed { success: result.success, patch_set, truth_outcome }
    }
}

pub enum PipelineOutcome {
    Blocked {
        reason: String,
    },
    Completed {
        success: bool,
        patch_set: Option<orch_types::PatchSet>,
        truth_outcome: Option<crate::truth_bridge::TruthOutcomeEvidence>,
    },
}

/// Placeholder used only when constructing a `CostTracker` for the
/// pipeline in contexts that don't already own one (tests, CLI wiring).
pub fn default_cost_tracker() -> CostTracker {
    CostTracker::new(CostLimits::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_engine::ContextBudgetLimits;
    use orch_types::{SkillBudget, Stability, Tier, ToolAccess};
    use std::collections::BTreeSet;

    fn skill_with_budget(max_tool_calls: u32, max_tokens: u64) -> SkillContract {
        SkillContract {
            name: "reviewer".into(),
            tier: Tier::Base,
            tags: BTreeSet::new(),
            anti_tags: BTreeSet::new(),
            tools: ToolAccess::default(),
            budget: SkillBudget { max_tool_calls, max_tokens },
            max_parallel: 4,
            stability: Stability::Stable,
            cost_hint: None,
            instructions: String::new(),
        }
    }

    #[test]
    fn admit_blocks_once_skill_exhausts_its_tool_call_budget() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventStore::open(dir.path());
        let ledger = Ledger::open(dir.path()).unwrap();
        let mut files = FileChangeTracker::new(dir.path().to_path_buf(), dir.path().to_path_buf());
        let skills = SkillRegistry::new(Vec::new(), Vec::new());
        let mut cost = CostTracker::new(CostLimits::default());
        let budget = ContextBudget::new(ContextBudgetLimits::default());
        let skill = skill_with_budget(1, u64::MAX);

        let request_one = ToolCallRequest {
            session_id: "s1",
            tool_call_id: "c1",
            tool_name: "bash",
            args: serde_json::json!({}),
            turn: 1,
            skill: Some(&skill),
        };
        {
            let pipeline = ToolPipeline {
                events: &events,
                ledger: &ledger,
                files: &mut files,
                skills: &skills,
                cost: &mut cost,
                budget: &budget,
                allow_mode: AllowMode::Off,
            };
            assert!(pipeline.admit(&request_one).allowed);
        }

        cost.record_tool_call("bash", Some("reviewer"));

        let request_two = ToolCallRequest {
            session_id: "s1",
            tool_call_id: "c2",
            tool_name: "bash",
            args: serde_json::json!({}),
            turn: 1,
            skill: Some(&skill),
        };
        let pipeline = ToolPipeline {
            events: &events,
            ledger: &ledger,
            files: &mut files,
            skills: &skills,
            cost: &mut cost,
            budget: &budget,
            allow_mode: AllowMode::Off,
        };
        let decision = pipeline.admit(&request_two);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("max_tool_calls"));

        let logged = events.list("s1", None).unwrap();
        assert!(logged.iter().any(|e| e.kind == EventKind::SkillBudgetWarning));
    }

    #[test]
    fn admit_blocks_once_skill_exhausts_its_token_budget() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventStore::open(dir.path());
        let ledger = Ledger::open(dir.path()).unwrap();
        let mut files = FileChangeTracker::new(dir.path().to_path_buf(), dir.path().to_path_buf());
        let skills = SkillRegistry::new(Vec::new(), Vec::new());
        let mut cost = CostTracker::new(CostLimits::default());
        let budget = ContextBudget::new(ContextBudgetLimits::default());
        let skill = skill_with_budget(u32::MAX, 100);

        cost.record_usage(orch_engine::UsageRecord {
            usage: orch_types::UsageDelta { total_tokens: 150, ..Default::default() },
            model: "m".into(),
            turn: 1,
            skill: Some("reviewer".to_string()),
        });

        let request = ToolCallRequest {
            session_id: "s1",
            tool_call_id: "c1",
            tool_name: "bash",
            args: serde_json::json!({}),
            turn: 1,
            skill: Some(&skill),
        };
        let pipeline = ToolPipeline {
            events: &events,
            ledger: &ledger,
            files: &mut files,
            skills: &skills,
            cost: &mut cost,
            budget: &budget,
            allow_mode: AllowMode::Off,
        };
        let decision = pipeline.admit(&request);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("max_tokens"));
    }
}
