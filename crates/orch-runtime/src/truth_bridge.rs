use orch_store::EvidenceRow;

/// Evidence handed to `TruthSync` after a tool call completes, carrying
/// just enough of the evidence row to derive/resolve a fact.
pub struct TruthOutcomeEvidence {
    pub tool: String,
    pub success: bool,
    pub evidence_id: String,
    pub output_summary: String,
}

pub fn truth_outcome_from_result(row: &EvidenceRow, success: bool, output_summary: &str) -> TruthOutcomeEvidence {
    TruthOutcomeEvidence {
        tool: row.tool.clone(),
        success,
        evidence_id: row.id.clone(),
        output_summary: output_summary.to_string(),
    }
}
