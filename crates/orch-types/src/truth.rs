use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    Active,
    Resolved,
}

/// A fact derived from tool artifacts (command failures, diagnostics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruthFact {
    pub id: String,
    pub kind: String,
    pub severity: Severity,
    pub status: FactStatus,
    pub summary: String,
    pub details: String,
    pub evidence_ids: Vec<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl TruthFact {
    /// `status` may only transition `active -> resolved`, never the reverse
    /// within the same logical fact; a new `active` upsert under the same
    /// id re-opens it as a fresh occurrence instead.
    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = FactStatus::Resolved;
        self.last_seen_at = at;
    }

    pub fn touch(&mut self, evidence_id: impl Into<String>, at: DateTime<Utc>) {
        self.evidence_ids.push(evidence_id.into());
        self.last_seen_at = at;
    }
}
