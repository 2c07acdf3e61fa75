//! Pure, synchronous folding logic shared by the runtime: cost accounting,
//! context-budget pressure classification, truth/task derivation, and tape
//! checkpointing. Nothing here performs I/O or suspends; all state is a
//! pure function of an event prefix.

pub mod context_budget;
pub mod cost;
pub mod hydration;
pub mod tape;
pub mod task_ledger;
pub mod truth_sync;

pub use context_budget::{CompactionGateStatus, ContextBudget, ContextBudgetLimits, Pressure, UsageObservation};
pub use cost::{CostLimits, CostTracker, UsageRecord};
pub use hydration::SessionFoldedState;
pub use tape::{TapeCheckpointPayload, TapeCheckpointer};
pub use task_ledger::TaskLedger;
pub use truth_sync::{ToolOutcome, TruthSync};
