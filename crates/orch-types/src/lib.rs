//! Core event and domain types shared across the orchestration runtime.
//!
//! These types are pure data: no I/O, no component behavior. Folding and
//! planning logic live in `orch-engine` and `orch-arena`; storage lives in
//! `orch-store`.

pub mod context;
pub mod cost;
pub mod error;
pub mod event;
pub mod patch;
pub mod skill;
pub mod task;
pub mod truth;

pub use context::{ContextInjectionEntry, EntryKey, Priority, TruncationStrategy, Zone, ZoneBudget, ZoneMap};
pub use cost::{
    AlertKind, BudgetAction, BudgetStatus, CostAlert, CostSnapshot, CostTotals, ModelTotals,
    SkillTotals, ToolTotals, UsageDelta,
};
pub use error::{Error, Result};
pub use event::{Event, EventFilter, EventKind};
pub use patch::{ChangeAction, PatchChange, PatchHistory, PatchSet, RollbackOutcome};
pub use skill::{SkillBudget, SkillContract, Stability, Tier, ToolAccess};
pub use task::{Blocker, TaskItem, TaskState, TaskStatus};
pub use truth::{FactStatus, Severity, TruthFact};
