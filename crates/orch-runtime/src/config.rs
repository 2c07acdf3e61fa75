use std::path::Path;

use serde::{Deserialize, Serialize};

use orch_engine::{ContextBudgetLimits, CostLimits};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub workspace_root: String,
    pub cost: CostConfig,
    pub context_budget: ContextBudgetConfig,
    pub parallel: ParallelConfig,
    pub checkpoint_interval_entries: u64,
    pub skill_roots: Vec<String>,
    pub disabled_skills: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workspace_root: ".".to_string(),
            cost: CostConfig::default(),
            context_budget: ContextBudgetConfig::default(),
            parallel: ParallelConfig::default(),
            checkpoint_interval_entries: 200,
            skill_roots: Vec::new(),
            disabled_skills: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub max_cost_usd_per_session: f64,
    pub alert_threshold_ratio: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self { max_cost_usd_per_session: 5.0, alert_threshold_ratio: 0.8 }
    }
}

impl From<&CostConfig> for CostLimits {
    fn from(c: &CostConfig) -> Self {
        CostLimits {
            max_cost_usd_per_session: c.max_cost_usd_per_session,
            alert_threshold_ratio: c.alert_threshold_ratio,
            max_cost_usd_per_skill: std::collections::HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudgetConfig {
    pub compaction_threshold_percent: f64,
    pub hard_limit_percent: f64,
    pub pressure_bypass_percent: f64,
    pub min_turns_between_compaction: u64,
    pub min_seconds_between_compaction: u64,
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        let d = ContextBudgetLimits::default();
        Self {
            compaction_threshold_percent: d.compaction_threshold_percent,
            hard_limit_percent: d.hard_limit_percent,
            pressure_bypass_percent: d.pressure_bypass_percent,
            min_turns_between_compaction: d.min_turns_between_compaction,
            min_seconds_between_compaction: d.min_seconds_between_compaction,
        }
    }
}

impl From<&ContextBudgetConfig> for ContextBudgetLimits {
    fn from(c: &ContextBudgetConfig) -> Self {
        ContextBudgetLimits {
            compaction_threshold_percent: c.compaction_threshold_percent,
            hard_limit_percent: c.hard_limit_percent,
            pressure_bypass_percent: c.pressure_bypass_percent,
            min_turns_between_compaction: c.min_turns_between_compaction,
            min_seconds_between_compaction: c.min_seconds_between_compaction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub max_concurrent: usize,
    pub max_total: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self { max_concurrent: 2, max_total: 8 }
    }
}

impl RuntimeConfig {
    /// Loads from a TOML file; falls back to defaults (with a logged
    /// warning) when the file is missing or fails to parse, rather than
    /// failing startup over a malformed config.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
