use serde::{Deserialize, Serialize};

/// Priority ordering for context injections. Declared low-to-high in source
/// order but compared by the numeric rank below (`critical` sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// The closed set of context zones. Declaration order is allocation order
/// in the arena's planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Identity,
    Truth,
    TaskState,
    ToolFailures,
    MemoryWorking,
    MemoryRecall,
    RagExternal,
}

impl Zone {
    pub const ALL_IN_ORDER: [Zone; 7] = [
        Zone::Identity,
        Zone::Truth,
        Zone::TaskState,
        Zone::ToolFailures,
        Zone::MemoryWorking,
        Zone::MemoryRecall,
        Zone::RagExternal,
    ];

    /// Zones that remain eligible at `critical_only` degradation regardless
    /// of their configured floor.
    pub fn is_always_critical_eligible(self) -> bool {
        matches!(self, Zone::Identity | Zone::Truth | Zone::TaskState)
    }
}

/// A source maps to exactly one zone. Sources are free-form strings
/// (`"brewva.truth-facts"`, `"memory.recall"`, ...); this table is supplied
/// by configuration, not hardcoded, since new sources get added without a
/// code change.
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    table: std::collections::HashMap<String, Zone>,
}

impl ZoneMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: impl Into<String>, zone: Zone) -> &mut Self {
        self.table.insert(source.into(), zone);
        self
    }

    pub fn zone_of(&self, source: &str) -> Option<Zone> {
        self.table.get(source).copied()
    }
}

/// Per-zone token budget: a soft guarantee (`min`) and a hard ceiling (`max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneBudget {
    pub min: u32,
    pub max: u32,
}

impl ZoneBudget {
    pub fn disabled() -> Self {
        Self { min: 0, max: 0 }
    }

    pub fn is_disabled(&self) -> bool {
        self.max == 0
    }
}

/// Truncation behavior applied when a zone's remaining budget can't fit an
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationStrategy {
    DropEntry,
    Summarize,
    Tail,
}

/// The identity of one context candidate. Re-appending the same key
/// supersedes the previous value at plan time (last-write-wins) while the
/// arena keeps a bounded audit trail of historical appends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub source: String,
    pub id: String,
}

impl EntryKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextInjectionEntry {
    pub source: String,
    pub id: String,
    pub content: String,
    pub priority: Priority,
    pub estimated_tokens: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub once_per_session: bool,
    #[serde(default)]
    pub truncated: bool,
}

impl ContextInjectionEntry {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.source.clone(), self.id.clone())
    }
}
