//! Zone-partitioned, priority-ranked context injection planning. One
//! `Arena` per session: accumulates append-only `(source, id)` candidates
//! and selects a token-bounded, zone-balanced subset on each `plan` call.

mod adaptive;
mod arena;

pub use adaptive::{AdaptiveConfig, AdaptiveController};
pub use arena::{
    Arena, AppendResult, ArenaConfig, FloorRelaxationConfig, PlanOptions, PlanOutput, PlanTelemetry,
    SloEnforcement, SloPolicy, StrategyArm, ZoneTelemetry,
};
