use orch_types::{CostSnapshot, Event, EventKind};
use serde::{Deserialize, Serialize};

/// Compact, canonical snapshot of folded state written into a
/// `tape_checkpoint` event's payload every `checkpoint_interval_entries`
/// appended events. Checkpoint events participate in the evidence hash
/// chain the same as any other evidence-producing event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapeCheckpointPayload {
    pub cost: CostSnapshot,
    pub cost_skill_last_turn_by_name: std::collections::HashMap<String, u64>,
}

pub struct TapeCheckpointer {
    interval_entries: u64,
    entries_since_checkpoint: u64,
}

impl TapeCheckpointer {
    pub fn new(interval_entries: u64) -> Self {
        Self { interval_entries, entries_since_checkpoint: 0 }
    }

    /// Call once per appended event. Returns `Some(payload)` when a
    /// checkpoint is due; the caller is responsible for constructing and
    /// appending the `tape_checkpoint` event (and feeding it back through
    /// the ledger so it participates in the hash chain).
    pub fn on_event_appended(&mut self, payload_if_due: impl FnOnce() -> TapeCheckpointPayload) -> Option<TapeCheckpointPayload> {
        self.entries_since_checkpoint += 1;
        if self.entries_since_checkpoint >= self.interval_entries {
            self.entries_since_checkpoint = 0;
            Some(payload_if_due())
        } else {
            None
        }
    }

    /// Finds the most recent `tape_checkpoint` event in an event slice, the
    /// fold origin for hydration.
    pub fn latest_checkpoint(events: &[Event]) -> Option<(usize, TapeCheckpointPayload)> {
        events.iter().enumerate().rev().find_map(|(i, e)| {
            if e.kind == EventKind::TapeCheckpoint {
                serde_json::from_value(e.payload.clone()).ok().map(|p| (i, p))
            } else {
                None
            }
        })
    }
}
