//! Shared fixtures and builders for tests across the workspace. Nothing
//! here is exercised by production code paths.

use orch_types::{Event, EventKind};
use serde_json::json;
use tempfile::TempDir;

/// A scratch workspace directory plus a distinct state directory, both
/// torn down when the returned `TempDir`s drop.
pub struct Fixture {
    pub workspace: TempDir,
    pub state: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self { workspace: tempfile::tempdir().unwrap(), state: tempfile::tempdir().unwrap() }
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a minimal, internally-consistent session: `session_start`,
/// `turn_start`, a tool call and its result, `turn_end`.
pub fn sample_session_events(session_id: &str) -> Vec<Event> {
    vec![
        Event::new(session_id, EventKind::SessionStart, json!({})),
        Event::new(session_id, EventKind::TurnStart, json!({})).with_turn(1),
        Event::new(session_id, EventKind::ToolCall, json!({"tool": "bash", "args": {"command": "echo hi"}})).with_turn(1),
        Event::new(session_id, EventKind::ToolResultRecorded, json!({"tool": "bash", "success": true})).with_turn(1),
        Event::new(session_id, EventKind::TurnEnd, json!({})).with_turn(1),
    ]
}

pub fn cost_update_event(session_id: &str, turn: u64, total_tokens: u64, cost_usd: f64) -> Event {
    Event::new(
        session_id,
        EventKind::CostUpdate,
        json!({"model": "test-model", "total_tokens": total_tokens, "cost_usd": cost_usd}),
    )
    .with_turn(turn)
}

pub fn failing_tool_event(session_id: &str, turn: u64, tool: &str) -> Event {
    Event::new(
        session_id,
        EventKind::TruthEvent,
        json!({"tool": tool, "success": false, "evidence_id": "ev-1", "summary": format!("{tool} failed")}),
    )
    .with_turn(turn)
}
