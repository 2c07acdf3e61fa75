use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Closed taxonomy of event kinds, mirroring the on-disk event log schema.
///
/// `Other` keeps the type forward-compatible with event kinds a future
/// extension introduces; only folding sites demand the closed variants be
/// exhaustive, per the runtime's re-architecture guidance around duck-typed
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SessionStart,
    SessionShutdown,
    SessionInterrupted,
    SessionBeforeCompact,
    SessionCompact,
    SessionBootstrap,
    TurnStart,
    TurnEnd,
    AgentStart,
    AgentEnd,
    MessageStart,
    MessageUpdate,
    MessageEnd,
    ToolCall,
    ToolResultRecorded,
    ToolCallMarked,
    ToolCallBlocked,
    ToolExecutionStart,
    ToolExecutionUpdate,
    ToolExecutionEnd,
    ToolExecutionError,
    PatchRecorded,
    Rollback,
    CostUpdate,
    CognitiveUsageRecorded,
    ContextInjected,
    ContextInjectionDropped,
    ContextCompactionRequested,
    ContextCompacted,
    ContextCompactionSkipped,
    ContextCompactionGateBlockedTool,
    ContextArenaFloorUnmetUnrecoverable,
    ContextExternalRecallSkipped,
    TruthEvent,
    VerificationOutcomeRecorded,
    SkillActivated,
    SkillCompleted,
    SkillBudgetWarning,
    SkillParallelWarning,
    ToolContractWarning,
    LedgerCompacted,
    TapeAnchor,
    TapeCheckpoint,
    FileSnapshotCaptured,
    IdentityParseWarning,
    PersistenceError,
    HydrationWarning,
    ConfigParseError,
    Other(String),
}

impl EventKind {
    fn as_str(&self) -> &str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::SessionShutdown => "session_shutdown",
            EventKind::SessionInterrupted => "session_interrupted",
            EventKind::SessionBeforeCompact => "session_before_compact",
            EventKind::SessionCompact => "session_compact",
            EventKind::SessionBootstrap => "session_bootstrap",
            EventKind::TurnStart => "turn_start",
            EventKind::TurnEnd => "turn_end",
            EventKind::AgentStart => "agent_start",
            EventKind::AgentEnd => "agent_end",
            EventKind::MessageStart => "message_start",
            EventKind::MessageUpdate => "message_update",
            EventKind::MessageEnd => "message_end",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResultRecorded => "tool_result_recorded",
            EventKind::ToolCallMarked => "tool_call_marked",
            EventKind::ToolCallBlocked => "tool_call_blocked",
            EventKind::ToolExecutionStart => "tool_execution_start",
            EventKind::ToolExecutionUpdate => "tool_execution_update",
            EventKind::ToolExecutionEnd => "tool_execution_end",
            EventKind::ToolExecutionError => "tool_execution_error",
            EventKind::PatchRecorded => "patch_recorded",
            EventKind::Rollback => "rollback",
            EventKind::CostUpdate => "cost_update",
            EventKind::CognitiveUsageRecorded => "cognitive_usage_recorded",
            EventKind::ContextInjected => "context_injected",
            EventKind::ContextInjectionDropped => "context_injection_dropped",
            EventKind::ContextCompactionRequested => "context_compaction_requested",
            EventKind::ContextCompacted => "context_compacted",
            EventKind::ContextCompactionSkipped => "context_compaction_skipped",
            EventKind::ContextCompactionGateBlockedTool => "context_compaction_gate_blocked_tool",
            EventKind::ContextArenaFloorUnmetUnrecoverable => {
                "context_arena_floor_unmet_unrecoverable"
            }
            EventKind::ContextExternalRecallSkipped => "context_external_recall_skipped",
            EventKind::TruthEvent => "truth_event",
            EventKind::VerificationOutcomeRecorded => "verification_outcome_recorded",
            EventKind::SkillActivated => "skill_activated",
            EventKind::SkillCompleted => "skill_completed",
            EventKind::SkillBudgetWarning => "skill_budget_warning",
            EventKind::SkillParallelWarning => "skill_parallel_warning",
            EventKind::ToolContractWarning => "tool_contract_warning",
            EventKind::LedgerCompacted => "ledger_compacted",
            EventKind::TapeAnchor => "tape_anchor",
            EventKind::TapeCheckpoint => "tape_checkpoint",
            EventKind::FileSnapshotCaptured => "file_snapshot_captured",
            EventKind::IdentityParseWarning => "identity_parse_warning",
            EventKind::PersistenceError => "persistence_error",
            EventKind::HydrationWarning => "hydration_warning",
            EventKind::ConfigParseError => "config_parse_error",
            EventKind::Other(s) => s,
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "session_start" => EventKind::SessionStart,
            "session_shutdown" => EventKind::SessionShutdown,
            "session_interrupted" => EventKind::SessionInterrupted,
            "session_before_compact" => EventKind::SessionBeforeCompact,
            "session_compact" => EventKind::SessionCompact,
            "session_bootstrap" => EventKind::SessionBootstrap,
            "turn_start" => EventKind::TurnStart,
            "turn_end" => EventKind::TurnEnd,
            "agent_start" => EventKind::AgentStart,
            "agent_end" => EventKind::AgentEnd,
            "message_start" => EventKind::MessageStart,
            "message_update" => EventKind::MessageUpdate,
            "message_end" => EventKind::MessageEnd,
            "tool_call" => EventKind::ToolCall,
            "tool_result_recorded" => EventKind::ToolResultRecorded,
            "tool_call_marked" => EventKind::ToolCallMarked,
            "tool_call_blocked" => EventKind::ToolCallBlocked,
            "tool_execution_start" => EventKind::ToolExecutionStart,
            "tool_execution_update" => EventKind::ToolExecutionUpdate,
            "tool_execution_end" => EventKind::ToolExecutionEnd,
            "tool_execution_error" => EventKind::ToolExecutionError,
            "patch_recorded" => EventKind::PatchRecorded,
            "rollback" => EventKind::Rollback,
            "cost_update" => EventKind::CostUpdate,
            "cognitive_usage_recorded" => EventKind::CognitiveUsageRecorded,
            "context_injected" => EventKind::ContextInjected,
            "context_injection_dropped" => EventKind::ContextInjectionDropped,
            "context_compaction_requested" => EventKind::ContextCompactionRequested,
            "context_compacted" => EventKind::ContextCompacted,
            "context_compaction_skipped" => EventKind::ContextCompactionSkipped,
            "context_compaction_gate_blocked_tool" => {
                EventKind::ContextCompactionGateBlockedTool
            }
            "context_arena_floor_unmet_unrecoverable" => {
                EventKind::ContextArenaFloorUnmetUnrecoverable
            }
            "context_external_recall_skipped" => EventKind::ContextExternalRecallSkipped,
            "truth_event" => EventKind::TruthEvent,
            "verification_outcome_recorded" => EventKind::VerificationOutcomeRecorded,
            "skill_activated" => EventKind::SkillActivated,
            "skill_completed" => EventKind::SkillCompleted,
            "skill_budget_warning" => EventKind::SkillBudgetWarning,
            "skill_parallel_warning" => EventKind::SkillParallelWarning,
            "tool_contract_warning" => EventKind::ToolContractWarning,
            "ledger_compacted" => EventKind::LedgerCompacted,
            "tape_anchor" => EventKind::TapeAnchor,
            "tape_checkpoint" => EventKind::TapeCheckpoint,
            "file_snapshot_captured" => EventKind::FileSnapshotCaptured,
            "identity_parse_warning" => EventKind::IdentityParseWarning,
            "persistence_error" => EventKind::PersistenceError,
            "hydration_warning" => EventKind::HydrationWarning,
            "config_parse_error" => EventKind::ConfigParseError,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// True for events that must invalidate an incremental turn-replay
    /// cache rather than fold in incrementally (truth/task/checkpoint
    /// events per the reference implementation's documented variance;
    /// callers may widen this via configuration).
    pub fn invalidates_turn_replay(&self) -> bool {
        matches!(
            self,
            EventKind::TruthEvent | EventKind::TapeCheckpoint | EventKind::SessionCompact
        )
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventKind::SessionStart
                | EventKind::SessionShutdown
                | EventKind::SessionInterrupted
                | EventKind::SessionBootstrap
        )
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(EventKind::from_str(&raw))
    }
}

/// An immutable append-only event record. The single source of truth for a
/// session; all folded state is a pure function of the event prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Event {
    pub fn new(session_id: impl Into<String>, kind: EventKind, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            kind,
            timestamp: Utc::now(),
            turn: None,
            payload,
        }
    }

    pub fn with_turn(mut self, turn: u64) -> Self {
        self.turn = Some(turn);
        self
    }
}

/// A filter applied to `EventStore::list`.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Option<Vec<EventKind>>,
    pub since_turn: Option<u64>,
    pub last_n: Option<usize>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = self.since_turn {
            if event.turn.is_none_or(|t| t < since) {
                return false;
            }
        }
        true
    }
}
