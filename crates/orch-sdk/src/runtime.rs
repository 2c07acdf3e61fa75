use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use orch_arena::{Arena, ArenaConfig, FloorRelaxationConfig, SloPolicy};
use orch_engine::{ContextBudget, ContextBudgetLimits, CostLimits, TapeCheckpointer};
use orch_runtime::{
    AllowMode, FileChangeTracker, MemoryStore, ParallelSlots, RuntimeConfig, SessionLifecycle,
    SkillRegistry, SkillRoot,
};
use orch_store::{EventStore, Index, Ledger};
use orch_types::{Priority, TruncationStrategy, Zone, ZoneBudget, ZoneMap};

use crate::error::Result;
use crate::session::Session;

/// Per-session state that has no representation in the folded event log:
/// the context arena, working memory, and the tape checkpoint cadence.
/// Lost on process restart and rebuilt empty; nothing here is load-bearing
/// for correctness, only for injection quality within a live process.
pub(crate) struct SessionExtras {
    pub budget: ContextBudget,
    pub arena: Arena,
    pub memory: MemoryStore,
    pub checkpointer: TapeCheckpointer,
}

fn default_zone_map() -> ZoneMap {
    let mut map = ZoneMap::new();
    map.insert("identity.card", Zone::Identity);
    map.insert("truth.facts", Zone::Truth);
    map.insert("task.state", Zone::TaskState);
    map.insert("tool.failures", Zone::ToolFailures);
    map.insert("memory.working", Zone::MemoryWorking);
    map.insert("memory.recall", Zone::MemoryRecall);
    map.insert("rag.external", Zone::RagExternal);
    map
}

fn default_zone_budgets() -> HashMap<Zone, ZoneBudget> {
    let mut budgets = HashMap::new();
    budgets.insert(Zone::Identity, ZoneBudget { min: 200, max: 800 });
    budgets.insert(Zone::Truth, ZoneBudget { min: 0, max: 1200 });
    budgets.insert(Zone::TaskState, ZoneBudget { min: 0, max: 800 });
    budgets.insert(Zone::ToolFailures, ZoneBudget { min: 0, max: 1500 });
    budgets.insert(Zone::MemoryWorking, ZoneBudget { min: 0, max: 1500 });
    budgets.insert(Zone::MemoryRecall, ZoneBudget { min: 0, max: 2000 });
    budgets.insert(Zone::RagExternal, ZoneBudget { min: 0, max: 2000 });
    budgets
}

fn default_arena_config() -> ArenaConfig {
    ArenaConfig {
        zone_map: default_zone_map(),
        zone_budgets: default_zone_budgets(),
        truncation_strategy: TruncationStrategy::Summarize,
        max_entries_per_session: 500,
        slo_policy: SloPolicy::DropLowPriority,
        floor_relaxation: FloorRelaxationConfig::default(),
        adaptive: orch_arena::AdaptiveConfig::default(),
    }
}

/// Owns every workspace-wide component (event log, evidence ledger, SQLite
/// index, skill registry, file-change tracker, parallel slot pool) and
/// lazily materializes per-session state on first use. One `Runtime` per
/// workspace; many `Session` handles borrow from it concurrently.
pub struct Runtime {
    pub(crate) workspace_root: PathBuf,
    pub config: RuntimeConfig,
    pub events: EventStore,
    pub ledger: Ledger,
    pub index: Index,
    pub skills: SkillRegistry,
    pub(crate) files: Mutex<FileChangeTracker>,
    pub(crate) lifecycle: Mutex<SessionLifecycle>,
    pub(crate) sessions: Mutex<HashMap<String, SessionExtras>>,
    pub(crate) parallel: ParallelSlots,
    pub(crate) allow_mode_cfg: AllowModeConfig,
}

#[derive(Debug, Clone, Copy)]
pub enum AllowModeConfig {
    Off,
    Warn,
    Enforce,
}

impl Runtime {
    /// Opens (or creates) a workspace: loads `orch.toml` if present, opens
    /// the event log and evidence ledger, builds the SQLite index, and
    /// discovers skills from every configured root.
    pub fn open(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(workspace_root, None)
    }

    /// Like `open`, but loads `orch.toml` from `config_path` instead of the
    /// workspace-root default when given.
    pub fn open_with_config(workspace_root: impl Into<PathBuf>, config_path: Option<PathBuf>) -> Result<Self> {
        let workspace_root = workspace_root.into();
        let config_path = config_path.unwrap_or_else(|| workspace_root.join("orch.toml"));
        let config = RuntimeConfig::load(&config_path);

        let events = EventStore::open(&workspace_root);
        let ledger = Ledger::open(&workspace_root)?;
        let index = Index::open(&workspace_root)?;

        let roots: Vec<SkillRoot> = if config.skill_roots.is_empty() {
            vec![SkillRoot { path: workspace_root.join(".orch").join("skills") }]
        } else {
            config.skill_roots.iter().map(|p| SkillRoot { path: PathBuf::from(p) }).collect()
        };
        let mut skills = SkillRegistry::new(roots, config.disabled_skills.clone());
        skills.refresh_skills()?;

        let files = FileChangeTracker::new(workspace_root.clone(), workspace_root.join(".orch"));
        let parallel = ParallelSlots::new(config.parallel.max_total, config.parallel.max_concurrent);

        Ok(Self {
            workspace_root,
            config,
            events,
            ledger,
            index,
            skills,
            files: Mutex::new(files),
            lifecycle: Mutex::new(SessionLifecycle::new()),
            sessions: Mutex::new(HashMap::new()),
            parallel,
            allow_mode_cfg: AllowModeConfig::Enforce,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub(crate) fn cost_limits(&self) -> CostLimits {
        CostLimits::from(&self.config.cost)
    }

    pub(crate) fn context_budget_limits(&self) -> ContextBudgetLimits {
        ContextBudgetLimits::from(&self.config.context_budget)
    }

    pub(crate) fn allow_mode(&self) -> AllowMode {
        match self.allow_mode_cfg {
            AllowModeConfig::Off => AllowMode::Off,
            AllowModeConfig::Warn => AllowMode::Warn,
            AllowModeConfig::Enforce => AllowMode::Enforce,
        }
    }

    pub fn set_allow_mode(&mut self, mode: AllowModeConfig) {
        self.allow_mode_cfg = mode;
    }

    /// Ensures a session's in-process state (folded event state, arena,
    /// memory, checkpointer) exists, hydrating from the event log when
    /// this is the first touch this process.
    pub fn session(&self, session_id: impl Into<String>) -> Result<Session<'_>> {
        let session_id = session_id.into();
        {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            lifecycle.hydrate(&session_id, &self.events, self.cost_limits())?;
        }
        {
            let mut sessions = self.sessions.lock().unwrap();
            sessions.entry(session_id.clone()).or_insert_with(|| SessionExtras {
                budget: ContextBudget::new(self.context_budget_limits()),
                arena: Arena::new(default_arena_config()),
                memory: MemoryStore::new(),
                checkpointer: TapeCheckpointer::new(self.config.checkpoint_interval_entries),
            });
        }
        Ok(Session { runtime: self, session_id })
    }

    pub fn list_sessions(&self) -> Result<Vec<String>> {
        Ok(self.index.list_session_ids()?)
    }
}
