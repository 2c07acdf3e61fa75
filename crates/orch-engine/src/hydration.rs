use orch_types::{Event, EventKind, UsageDelta};

use crate::cost::{CostLimits, CostTracker, UsageRecord};
use crate::tape::TapeCheckpointer;
use crate::task_ledger::TaskLedger;
use crate::truth_sync::{ToolOutcome, TruthSync};

/// Folded per-session state, rebuilt by replaying the event log from the
/// last valid checkpoint forward. Hydration is idempotent and monotone:
/// replaying the same prefix twice yields the same state.
pub struct SessionFoldedState {
    pub cost: CostTracker,
    pub truth: TruthSync,
    pub tasks: TaskLedger,
    pub current_turn: u64,
    pub compaction_turns: Vec<u64>,
}

impl SessionFoldedState {
    pub fn new(cost_limits: CostLimits) -> Self {
        Self {
            cost: CostTracker::new(cost_limits),
            truth: TruthSync::new(),
            tasks: TaskLedger::new(),
            current_turn: 0,
            compaction_turns: Vec::new(),
        }
    }

    /// Hydrates from a full event slice per the session-lifecycle
    /// procedure: find the latest checkpoint, restore cost from it, then
    /// replay everything at-or-after the checkpoint to fold task state,
    /// truth facts, and compaction turns. Events strictly before the
    /// checkpoint are not re-folded for cost (already captured in the
    /// snapshot) but still fold into truth/task state, since those have no
    /// checkpoint representation of their own.
    pub fn hydrate(cost_limits: CostLimits, events: &[Event]) -> Self {
        let mut state = Self::new(cost_limits);
        let cost_replay_start_index = match TapeCheckpointer::latest_checkpoint(events) {
            Some((index, payload)) => {
                state.cost.restore(payload.cost);
                index + 1
            }
            None => 0,
        };

        for (i, event) in events.iter().enumerate() {
            state.fold_non_cost(event);
            if i >= cost_replay_start_index {
                state.fold_cost(event);
            }
        }
        state
    }

    fn fold_non_cost(&mut self, event: &Event) {
        match &event.kind {
            EventKind::TurnStart => {
                if let Some(turn) = event.turn {
                    self.current_turn = self.current_turn.max(turn);
                }
            }
            EventKind::LedgerCompacted | EventKind::ContextCompacted => {
                if let Some(turn) = event.turn {
                    self.compaction_turns.push(turn);
                }
            }
            EventKind::TruthEvent => {
                if let (Some(tool), Some(success)) =
                    (event.payload.get("tool").and_then(|v| v.as_str()), event.payload.get("success").and_then(|v| v.as_bool()))
                {
                    let evidence_id = event.payload.get("evidence_id").and_then(|v| v.as_str()).unwrap_or("");
                    let summary = event.payload.get("summary").and_then(|v| v.as_str()).unwrap_or("");
                    self.truth.observe_tool_outcome(ToolOutcome {
                        tool,
                        success,
                        evidence_id,
                        output_summary: summary,
                        at: event.timestamp,
                    });
                }
            }
            _ => {}
        }
    }

    fn fold_cost(&mut self, event: &Event) {
        if event.kind != EventKind::CostUpdate && event.kind != EventKind::CognitiveUsageRecorded {
            return;
        }
        let payload = &event.payload;
        let usage = UsageDelta {
            input_tokens: payload.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            output_tokens: payload.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            cache_read_tokens: payload.get("cache_read").and_then(|v| v.as_u64()).unwrap_or(0),
            cache_write_tokens: payload.get("cache_write").and_then(|v| v.as_u64()).unwrap_or(0),
            total_tokens: payload.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0),
            cost_usd: payload.get("cost_usd").and_then(|v| v.as_f64()).unwrap_or(0.0),
        };
        let model = payload.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string();
        let skill = payload.get("skill").and_then(|v| v.as_str()).map(str::to_string);
        self.cost.record_usage(UsageRecord { usage, model, turn: event.turn.unwrap_or(self.current_turn), skill });
    }
}
