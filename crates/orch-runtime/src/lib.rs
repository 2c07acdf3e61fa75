//! Everything that turns the pure folding logic in `orch-engine` into a
//! running session: skill discovery, file-change tracking with reversible
//! patch sets, the tool pipeline, session lifecycle/hydration, working
//! memory, and parallel-slot concurrency control.

mod concurrency;
mod config;
mod error;
mod file_change_tracker;
mod memory;
mod session_lifecycle;
mod skill_registry;
mod tool_pipeline;
mod truth_bridge;

pub use concurrency::{CancellationToken, ParallelSlotGuard, ParallelSlots, SlotOutcome};
pub use config::{ContextBudgetConfig, CostConfig, ParallelConfig, RuntimeConfig};
pub use error::{Error, Result};
pub use file_change_tracker::FileChangeTracker;
pub use memory::{tokenize, Crystal, MemoryStatus, MemoryStore, MemoryUnit, RankedHit, RebuildMode, RetrievalWeights};
pub use session_lifecycle::SessionLifecycle;
pub use skill_registry::{SkillRegistry, SkillRoot};
pub use tool_pipeline::{
    AdmissionDecision, AllowMode, PipelineOutcome, ToolCallRequest, ToolCallResult, ToolPipeline,
    ALWAYS_ALLOWED_LIFECYCLE_TOOLS,
};
pub use truth_bridge::TruthOutcomeEvidence;
