//! Public facade for embedding the orchestration runtime in a host
//! application: open a workspace once as a `Runtime`, then borrow
//! `Session` handles per conversation. Everything below this crate
//! (`orch-store`, `orch-engine`, `orch-arena`, `orch-runtime`) is an
//! implementation detail a host should not need to reach past.

mod error;
mod runtime;
mod session;

pub use error::{Error, Result};
pub use runtime::{AllowModeConfig, Runtime};
pub use session::Session;

// Re-exported so a host can build requests/entries without depending on
// the lower crates directly.
pub use orch_arena::{AppendResult, PlanOptions, PlanOutput};
pub use orch_core::{CharBasedEstimator, TokenEstimator};
pub use orch_engine::{CompactionGateStatus, Pressure};
pub use orch_runtime::{MemoryUnit, RankedHit, RetrievalWeights, ToolCallResult};
pub use orch_types::{
    BudgetStatus, ContextInjectionEntry, CostSnapshot, Event, Priority, RollbackOutcome, SkillContract,
    TruthFact, Zone,
};

#[cfg(test)]
mod tests {
    use super::*;
    use orch_runtime::ToolCallResult as TCR;

    #[test]
    fn opens_workspace_and_hydrates_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::open(dir.path()).unwrap();
        let session = runtime.session("s1").unwrap();
        assert_eq!(session.id(), "s1");
        let turn = session.start_turn().unwrap();
        assert_eq!(turn, 1);
    }

    #[test]
    fn call_tool_records_evidence_and_truth_fact_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::open(dir.path()).unwrap();
        let session = runtime.session("s1").unwrap();
        let turn = session.start_turn().unwrap();

        session
            .call_tool("call-1", "bash", serde_json::json!({"command": "false"}), turn, None, || TCR {
                success: false,
                output_summary: "exit code 1".to_string(),
            })
            .unwrap();

        let facts = session.active_truth_facts();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].kind, "tool_failure");
    }

    #[test]
    fn resuming_a_session_rehydrates_prior_cost() {
        let dir = tempfile::tempdir().unwrap();
        {
            let runtime = Runtime::open(dir.path()).unwrap();
            let session = runtime.session("s1").unwrap();
            let turn = session.start_turn().unwrap();
            session
                .call_tool("call-1", "bash", serde_json::json!({}), turn, None, || TCR { success: true, output_summary: "ok".into() })
                .unwrap();
        }
        let runtime = Runtime::open(dir.path()).unwrap();
        let session = runtime.session("s1").unwrap();
        let events = session.events().unwrap();
        assert!(events.iter().any(|e| e.kind == orch_types::EventKind::ToolResultRecorded));
    }
}
