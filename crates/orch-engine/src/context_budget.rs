use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pressure {
    Low,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextBudgetLimits {
    pub compaction_threshold_percent: f64,
    pub hard_limit_percent: f64,
    pub pressure_bypass_percent: f64,
    pub min_turns_between_compaction: u64,
    pub min_seconds_between_compaction: u64,
}

impl Default for ContextBudgetLimits {
    fn default() -> Self {
        Self {
            compaction_threshold_percent: 0.70,
            hard_limit_percent: 0.92,
            pressure_bypass_percent: 0.97,
            min_turns_between_compaction: 4,
            min_seconds_between_compaction: 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UsageObservation {
    pub tokens: u64,
    pub context_window: u64,
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub struct CompactionGateStatus {
    pub required: bool,
    pub pressure: Pressure,
    pub recent_compaction: bool,
    pub window_turns: u64,
    pub last_compaction_turn: Option<u64>,
    pub turns_since_compaction: u64,
}

/// Tracks context-window pressure for one session and decides when
/// compaction is required and which tools the compaction gate blocks.
pub struct ContextBudget {
    limits: ContextBudgetLimits,
    current_turn: u64,
    last_percent: f64,
    last_compaction_turn: Option<u64>,
    last_compaction_at: Option<Instant>,
}

impl ContextBudget {
    pub fn new(limits: ContextBudgetLimits) -> Self {
        Self {
            limits,
            current_turn: 0,
            last_percent: 0.0,
            last_compaction_turn: None,
            last_compaction_at: None,
        }
    }

    pub fn begin_turn(&mut self, turn: u64) {
        self.current_turn = turn;
    }

    pub fn observe_usage(&mut self, observation: UsageObservation) -> Pressure {
        self.last_percent = observation.percent;
        self.classify(observation.percent)
    }

    fn classify(&self, percent: f64) -> Pressure {
        if percent >= self.limits.hard_limit_percent {
            Pressure::Critical
        } else if percent >= self.limits.compaction_threshold_percent {
            Pressure::High
        } else {
            Pressure::Low
        }
    }

    pub fn compaction_gate_status(&self) -> CompactionGateStatus {
        let pressure = self.classify(self.last_percent);
        let turns_since_compaction = match self.last_compaction_turn {
            Some(t) => self.current_turn.saturating_sub(t),
            None => self.current_turn,
        };
        let turns_elapsed = turns_since_compaction >= self.limits.min_turns_between_compaction;
        let seconds_elapsed = match self.last_compaction_at {
            Some(at) => at.elapsed() >= Duration::from_secs(self.limits.min_seconds_between_compaction),
            None => true,
        };
        let bypass = self.last_percent >= self.limits.pressure_bypass_percent;

        let required = matches!(pressure, Pressure::High | Pressure::Critical)
            && (bypass || (turns_elapsed && seconds_elapsed));

        CompactionGateStatus {
            required,
            pressure,
            recent_compaction: self.last_compaction_turn.is_some() && !turns_elapsed,
            window_turns: self.limits.min_turns_between_compaction,
            last_compaction_turn: self.last_compaction_turn,
            turns_since_compaction,
        }
    }

    /// Per the compaction tool gate: at `critical` pressure every tool
    /// except `session_compact` and the always-allowed lifecycle set is
    /// blocked, with a structured reason.
    pub fn check_tool_gate(&self, tool_name: &str, always_allowed: &[&str]) -> Result<(), String> {
        if self.classify(self.last_percent) != Pressure::Critical {
            return Ok(());
        }
        if tool_name == "session_compact" || always_allowed.contains(&tool_name) {
            return Ok(());
        }
        Err("requires session_compact".to_string())
    }

    pub fn mark_compacted(&mut self) {
        self.last_compaction_turn = Some(self.current_turn);
        self.last_compaction_at = Some(Instant::now());
        // Compaction freshly ran, so percent drops back under the hard
        // limit; callers re-observe usage on the next turn regardless.
        self.last_percent = self.limits.compaction_threshold_percent * 0.5;
    }
}
