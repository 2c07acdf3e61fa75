use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

impl CostTotals {
    pub fn add_usage(&mut self, usage: &UsageDelta) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        self.cache_write_tokens += usage.cache_write_tokens;
        self.total_tokens += usage.total_tokens;
        self.total_cost_usd += usage.cost_usd;
    }
}

#[derive(Debug, Clone, Default)]
pub struct UsageDelta {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelTotals {
    pub totals: CostTotals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillTotals {
    pub totals: CostTotals,
    pub usage_count: u64,
    pub turn_count: u64,
    pub tool_call_count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolTotals {
    pub call_count: u64,
    pub allocated_tokens: u64,
    pub allocated_cost_usd: f64,
}

/// Full cost snapshot for one session, restorable from a tape checkpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub session: CostTotals,
    pub by_model: HashMap<String, ModelTotals>,
    pub by_skill: HashMap<String, SkillTotals>,
    pub by_tool: HashMap<String, ToolTotals>,
    pub alerts: Vec<CostAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAlert {
    pub kind: AlertKind,
    pub scope: Option<String>,
    pub at_cost_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SessionThreshold,
    SessionCap,
    SkillCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAction {
    Ok,
    Warn,
    BlockTools,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub action: BudgetAction,
    pub session_exceeded: bool,
    pub skill_exceeded: bool,
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
