use orch_engine::{CompactionGateStatus, ToolOutcome};
use orch_runtime::{
    ParallelSlotGuard, PipelineOutcome, RankedHit, RetrievalWeights, SlotOutcome, ToolCallRequest,
    ToolCallResult, ToolPipeline,
};
use orch_types::{
    BudgetStatus, ContextInjectionEntry, CostSnapshot, Event, EventKind, FactStatus, RollbackOutcome,
    SkillContract,
};

use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// A handle scoped to one session id, borrowing the shared `Runtime`. Every
/// method that mutates session state takes `&self`: the underlying state
/// lives behind the runtime's mutexes, not in this handle.
pub struct Session<'a> {
    pub(crate) runtime: &'a Runtime,
    pub(crate) session_id: String,
}

impl<'a> Session<'a> {
    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Bumps the turn counter past whatever hydration found and emits
    /// `turn_start`.
    pub fn start_turn(&self) -> Result<u64> {
        let next_turn = {
            let mut lifecycle = self.runtime.lifecycle.lock().unwrap();
            let next_turn = lifecycle
                .state_mut(&self.session_id)
                .map(|s| s.current_turn + 1)
                .unwrap_or(1);
            lifecycle.on_turn_start(&self.session_id, &self.runtime.events, self.runtime.cost_limits(), next_turn)?;
            next_turn
        };
        if let Some(extras) = self.runtime.sessions.lock().unwrap().get_mut(&self.session_id) {
            extras.budget.begin_turn(next_turn);
        }
        Ok(next_turn)
    }

    pub fn end_turn(&self, turn: u64) {
        self.runtime.events.append(Event::new(&self.session_id, EventKind::TurnEnd, serde_json::json!({})).with_turn(turn));
    }

    /// Tries to acquire a parallel execution slot for this session without
    /// blocking. `skill`, when given, also bounds concurrency to that
    /// skill's own `max_parallel`. Callers should back off and retry later
    /// on `Err(Busy)`.
    pub fn try_acquire_slot(&self, skill: Option<&SkillContract>) -> Result<ParallelSlotGuard> {
        match self.runtime.parallel.try_acquire(&self.session_id, skill) {
            SlotOutcome::Acquired(guard) => Ok(guard),
            SlotOutcome::Busy => Err(Error::Busy),
            SlotOutcome::SkillBusy(skill_name) => {
                self.runtime.events.append(
                    Event::new(&self.session_id, EventKind::SkillParallelWarning, serde_json::json!({"skill": skill_name})),
                );
                Err(Error::Busy)
            }
        }
    }

    /// Runs the admission -> before-snapshot -> dispatch -> result -> sync
    /// pipeline for one tool call, then folds any derived truth fact back
    /// into in-process state and the event log.
    pub fn call_tool(
        &self,
        tool_call_id: &str,
        tool_name: &str,
        args: serde_json::Value,
        turn: u64,
        skill: Option<&SkillContract>,
        dispatch: impl FnOnce() -> ToolCallResult,
    ) -> Result<PipelineOutcome> {
        let mut lifecycle = self.runtime.lifecycle.lock().unwrap();
        let mut files = self.runtime.files.lock().unwrap();
        let mut sessions = self.runtime.sessions.lock().unwrap();

        let extras = sessions.get_mut(&self.session_id).ok_or_else(|| Error::UnknownSession(self.session_id.clone()))?;
        let folded = lifecycle.state_mut(&self.session_id).ok_or_else(|| Error::UnknownSession(self.session_id.clone()))?;

        let mut pipeline = ToolPipeline {
            events: &self.runtime.events,
            ledger: &self.runtime.ledger,
            files: &mut files,
            skills: &self.runtime.skills,
            cost: &mut folded.cost,
            budget: &extras.budget,
            allow_mode: self.runtime.allow_mode(),
        };

        let request = ToolCallRequest { session_id: &self.session_id, tool_call_id, tool_name, args, turn, skill };
        let outcome = pipeline.run(request, dispatch);

        if let PipelineOutcome::Completed { truth_outcome: Some(evidence), .. } = &outcome {
            let fact = folded.truth.observe_tool_outcome(ToolOutcome {
                tool: &evidence.tool,
                success: evidence.success,
                evidence_id: &evidence.evidence_id,
                output_summary: &evidence.output_summary,
                at: chrono::Utc::now(),
            });
            self.runtime.events.append(
                Event::new(
                    &self.session_id,
                    EventKind::TruthEvent,
                    serde_json::json!({
                        "tool": evidence.tool,
                        "success": evidence.success,
                        "evidence_id": evidence.evidence_id,
                        "summary": evidence.output_summary,
                    }),
                )
                .with_turn(turn),
            );
            if let Some(fact) = fact {
                if fact.status == FactStatus::Resolved {
                    folded.tasks.resolve_blockers_for_fact(&fact.id);
                }
            }
        }

        let due = extras.checkpointer.on_event_appended(|| orch_engine::TapeCheckpointPayload {
            cost: folded.cost.snapshot(),
            cost_skill_last_turn_by_name: Default::default(),
        });
        if let Some(payload) = due {
            self.runtime.events.append(
                Event::new(&self.session_id, EventKind::TapeCheckpoint, serde_json::to_value(&payload).unwrap_or_default())
                    .with_turn(turn),
            );
        }

        Ok(outcome)
    }

    pub fn observe_context_usage(&self, tokens: u64, context_window: u64) -> orch_engine::Pressure {
        let mut sessions = self.runtime.sessions.lock().unwrap();
        let extras = sessions.get_mut(&self.session_id).expect("session() ensures extras exist");
        let percent = if context_window == 0 { 0.0 } else { tokens as f64 / context_window as f64 };
        extras.budget.observe_usage(orch_engine::UsageObservation { tokens, context_window, percent })
    }

    pub fn compaction_gate_status(&self) -> CompactionGateStatus {
        self.runtime.sessions.lock().unwrap().get(&self.session_id).expect("session() ensures extras exist").budget.compaction_gate_status()
    }

    /// Marks compaction as having run: resets the context-budget clock and
    /// records the turn in folded state for replay.
    pub fn mark_compacted(&self, turn: u64) {
        {
            let mut sessions = self.runtime.sessions.lock().unwrap();
            sessions.get_mut(&self.session_id).expect("session() ensures extras exist").budget.mark_compacted();
        }
        if let Some(folded) = self.runtime.lifecycle.lock().unwrap().state_mut(&self.session_id) {
            folded.compaction_turns.push(turn);
        }
        self.runtime.events.append(Event::new(&self.session_id, EventKind::ContextCompacted, serde_json::json!({})).with_turn(turn));
    }

    pub fn inject_context(&self, entry: ContextInjectionEntry) -> orch_arena::AppendResult {
        self.runtime.sessions.lock().unwrap().get_mut(&self.session_id).expect("session() ensures extras exist").arena.append(entry)
    }

    /// Builds a `ContextInjectionEntry` from raw text, estimating its token
    /// cost with the configured `TokenEstimator` rather than requiring the
    /// caller to count tokens itself, then appends it.
    pub fn inject_text(
        &self,
        source: impl Into<String>,
        id: impl Into<String>,
        content: impl Into<String>,
        priority: orch_types::Priority,
    ) -> orch_arena::AppendResult {
        use orch_core::TokenEstimator;
        let content = content.into();
        let estimated_tokens = orch_core::CharBasedEstimator.estimate(&content);
        self.inject_context(ContextInjectionEntry {
            source: source.into(),
            id: id.into(),
            content,
            priority,
            estimated_tokens,
            timestamp: chrono::Utc::now(),
            once_per_session: false,
            truncated: false,
        })
    }

    pub fn plan_context(&self, total_token_budget: u32) -> orch_arena::PlanOutput {
        let mut sessions = self.runtime.sessions.lock().unwrap();
        let extras = sessions.get_mut(&self.session_id).expect("session() ensures extras exist");
        let output = extras.arena.plan(total_token_budget, orch_arena::PlanOptions::default());
        extras.arena.commit(&output.consumed_keys);
        output
    }

    pub fn upsert_memory(&self, unit: orch_runtime::MemoryUnit) {
        self.runtime.sessions.lock().unwrap().get_mut(&self.session_id).expect("session() ensures extras exist").memory.upsert_unit(unit);
    }

    pub fn retrieve_memory(&self, query: &str, weights: RetrievalWeights, limit: usize) -> Vec<RankedHit> {
        self.runtime
            .sessions
            .lock()
            .unwrap()
            .get(&self.session_id)
            .expect("session() ensures extras exist")
            .memory
            .retrieve(query, weights, limit, chrono::Utc::now())
    }

    pub fn rollback_last(&self) -> Result<RollbackOutcome> {
        let outcome = self.runtime.files.lock().unwrap().rollback_last(&self.session_id)?;
        self.runtime.events.append(Event::new(&self.session_id, EventKind::Rollback, serde_json::json!({"ok": outcome.ok})));
        Ok(outcome)
    }

    pub fn cost_snapshot(&self) -> CostSnapshot {
        self.runtime.lifecycle.lock().unwrap().state_mut(&self.session_id).expect("session() ensures extras exist").cost.snapshot()
    }

    pub fn budget_status(&self) -> BudgetStatus {
        self.runtime.lifecycle.lock().unwrap().state_mut(&self.session_id).expect("session() ensures extras exist").cost.budget_status()
    }

    pub fn active_truth_facts(&self) -> Vec<orch_types::TruthFact> {
        self.runtime
            .lifecycle
            .lock()
            .unwrap()
            .state_mut(&self.session_id)
            .expect("session() ensures extras exist")
            .truth
            .active_facts()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn events(&self) -> Result<Vec<Event>> {
        Ok(self.runtime.events.list(&self.session_id, None)?)
    }

    pub fn shutdown(&self) {
        self.runtime.events.append(Event::new(&self.session_id, EventKind::SessionShutdown, serde_json::json!({})));
        self.runtime.lifecycle.lock().unwrap().clear_session_state(&self.session_id, &self.runtime.events);
        self.runtime.sessions.lock().unwrap().remove(&self.session_id);
    }
}
