use std::collections::HashMap;

use orch_engine::{CostLimits, SessionFoldedState};
use orch_store::EventStore;
use orch_types::{Event, EventKind};

/// Tracks which sessions have been hydrated this process, and owns the
/// turn counter. Hydration runs at most once per process per session;
/// subsequent `on_turn_start` calls reuse the cached folded state.
#[derive(Default)]
pub struct SessionLifecycle {
    hydrated: HashMap<String, SessionFoldedState>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hydrated(&self, session_id: &str) -> bool {
        self.hydrated.contains_key(session_id)
    }

    /// Hydration from events, per the documented procedure: load the
    /// event log, find the latest checkpoint, restore cost from it, then
    /// replay everything to fold task/truth/compaction state.
    pub fn hydrate(&mut self, session_id: &str, events: &EventStore, cost_limits: CostLimits) -> Result<(), orch_store::Error> {
        if self.hydrated.contains_key(session_id) {
            return Ok(());
        }
        let log = events.list(session_id, None)?;
        let folded = SessionFoldedState::hydrate(cost_limits, &log);
        self.hydrated.insert(session_id.to_string(), folded);
        Ok(())
    }

    pub fn state_mut(&mut self, session_id: &str) -> Option<&mut SessionFoldedState> {
        self.hydrated.get_mut(session_id)
    }

    /// Ensures hydration, bumps the turn counter monotonically, and emits
    /// the `turn_start` event.
    pub fn on_turn_start(&mut self, session_id: &str, events: &EventStore, cost_limits: CostLimits, turn_index: u64) -> Result<(), orch_store::Error> {
        self.hydrate(session_id, events, cost_limits)?;
        if let Some(state) = self.hydrated.get_mut(session_id) {
            state.current_turn = state.current_turn.max(turn_index);
            state.cost.begin_turn();
        }
        events.append(Event::new(session_id, EventKind::TurnStart, serde_json::json!({})).with_turn(turn_index));
        Ok(())
    }

    /// Tears down every per-session in-memory cache. On-disk state (event
    /// log, ledger, patch history, snapshots) is untouched.
    pub fn clear_session_state(&mut self, session_id: &str, events: &EventStore) {
        self.hydrated.remove(session_id);
        events.clear_session_cache(session_id);
    }
}
