use std::collections::{HashMap, HashSet, VecDeque};

use orch_types::{ContextInjectionEntry, EntryKey, Priority, TruncationStrategy, Zone, ZoneBudget, ZoneMap};

use crate::adaptive::{AdaptiveConfig, AdaptiveController};

const APPEND_HISTORY_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyArm {
    Managed,
    Hybrid,
    Passthrough,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    pub force_critical_only: bool,
    pub disable_adaptive_zones: bool,
    pub strategy_arm: Option<StrategyArm>,
}

#[derive(Debug, Clone)]
pub struct FloorRelaxationConfig {
    pub enabled: bool,
    pub relax_order: Vec<Zone>,
    pub request_compaction: bool,
}

impl Default for FloorRelaxationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            relax_order: vec![Zone::MemoryRecall, Zone::ToolFailures, Zone::MemoryWorking],
            request_compaction: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SloPolicy {
    DropRecall,
    DropLowPriority,
    ForceCompact,
}

#[derive(Debug, Clone)]
pub struct SloEnforcement {
    pub policy: SloPolicy,
    pub entries_before: usize,
    pub entries_after: usize,
    pub dropped: Vec<EntryKey>,
}

#[derive(Debug, Clone)]
pub struct AppendResult {
    pub accepted: bool,
    pub slo_enforced: Option<SloEnforcement>,
}

#[derive(Debug, Default, Clone)]
pub struct ZoneTelemetry {
    pub demand: u32,
    pub allocated: u32,
    pub accepted: u32,
}

#[derive(Debug, Default, Clone)]
pub struct PlanTelemetry {
    pub zone: HashMap<Zone, ZoneTelemetry>,
    pub adaptive_zones_disabled: bool,
    pub stability_forced: bool,
    pub floor_unmet: bool,
    pub applied_floor_relaxation: Vec<Zone>,
    pub degradation_applied: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub joined_content: String,
    pub consumed_keys: Vec<EntryKey>,
    pub telemetry: PlanTelemetry,
}

pub struct ArenaConfig {
    pub zone_map: ZoneMap,
    pub zone_budgets: HashMap<Zone, ZoneBudget>,
    pub truncation_strategy: TruncationStrategy,
    pub max_entries_per_session: usize,
    pub slo_policy: SloPolicy,
    pub floor_relaxation: FloorRelaxationConfig,
    pub adaptive: AdaptiveConfig,
}

/// Zone-partitioned, priority-ranked context injection planner. One
/// instance per session. `append` accumulates the latest-by-key entry
/// pool; `plan` selects a token-bounded subset without mutating the pool;
/// `commit` marks selected keys presented (and, for `once_per_session`
/// entries, consumed for good).
pub struct Arena {
    config: ArenaConfig,
    active_by_source_id: HashMap<EntryKey, ContextInjectionEntry>,
    append_history: VecDeque<EntryKey>,
    once_keys: HashSet<EntryKey>,
    epoch: u64,
    presented_keys: HashSet<EntryKey>,
    adaptive_state: AdaptiveController,
    adaptive_max: HashMap<Zone, u32>,
    floor_unmet_emitted_this_turn: bool,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Self {
        let adaptive_max = config.zone_budgets.iter().map(|(z, b)| (*z, b.max)).collect();
        let adaptive_state = AdaptiveController::new(config.adaptive);
        Self {
            config,
            active_by_source_id: HashMap::new(),
            append_history: VecDeque::new(),
            once_keys: HashSet::new(),
            epoch: 0,
            presented_keys: HashSet::new(),
            adaptive_state,
            adaptive_max,
            floor_unmet_emitted_this_turn: false,
        }
    }

    pub fn reset_epoch(&mut self) {
        self.epoch += 1;
        self.presented_keys.clear();
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn append(&mut self, entry: ContextInjectionEntry) -> AppendResult {
        let key = entry.key();
        if self.once_keys.contains(&key) {
            return AppendResult { accepted: false, slo_enforced: None };
        }

        let mut slo_enforced = None;
        if self.active_by_source_id.len() >= self.config.max_entries_per_session
            && !self.active_by_source_id.contains_key(&key)
        {
            slo_enforced = self.enforce_slo(&entry);
            if let Some(ref enforcement) = slo_enforced {
                if enforcement.policy == SloPolicy::DropRecall
                    && enforcement.dropped.is_empty()
                    && self.is_recall_zone(&entry)
                {
                    return AppendResult { accepted: false, slo_enforced };
                }
            }
        }

        self.active_by_source_id.insert(key.clone(), entry);
        self.append_history.push_back(key);
        if self.append_history.len() > APPEND_HISTORY_CAP {
            self.append_history.pop_front();
        }

        AppendResult { accepted: true, slo_enforced }
    }

    fn is_recall_zone(&self, entry: &ContextInjectionEntry) -> bool {
        matches!(self.config.zone_map.zone_of(&entry.source), Some(Zone::MemoryRecall) | Some(Zone::RagExternal))
    }

    fn enforce_slo(&mut self, incoming: &ContextInjectionEntry) -> Option<SloEnforcement> {
        let before = self.active_by_source_id.len();
        match self.config.slo_policy {
            SloPolicy::DropRecall => {
                if self.is_recall_zone(incoming) {
                    return Some(SloEnforcement {
                        policy: SloPolicy::DropRecall,
                        entries_before: before,
                        entries_after: before,
                        dropped: Vec::new(),
                    });
                }
                if let Some(victim) = self.oldest_low_priority_recall_key() {
                    self.active_by_source_id.remove(&victim);
                    return Some(SloEnforcement {
                        policy: SloPolicy::DropRecall,
                        entries_before: before,
                        entries_after: self.active_by_source_id.len(),
                        dropped: vec![victim],
                    });
                }
                None
            }
            SloPolicy::DropLowPriority => {
                let victim = self
                    .active_by_source_id
                    .iter()
                    .max_by_key(|(_, e)| e.priority.rank())
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    let victim_priority = self.active_by_source_id[&victim].priority;
                    if incoming.priority.rank() >= victim_priority.rank() {
                        return Some(SloEnforcement {
                            policy: SloPolicy::DropLowPriority,
                            entries_before: before,
                            entries_after: before,
                            dropped: Vec::new(),
                        });
                    }
                    self.active_by_source_id.remove(&victim);
                    Some(SloEnforcement {
                        policy: SloPolicy::DropLowPriority,
                        entries_before: before,
                        entries_after: self.active_by_source_id.len(),
                        dropped: vec![victim],
                    })
                } else {
                    None
                }
            }
            SloPolicy::ForceCompact => {
                let dropped: Vec<EntryKey> = self.active_by_source_id.keys().cloned().collect();
                self.active_by_source_id.clear();
                Some(SloEnforcement {
                    policy: SloPolicy::ForceCompact,
                    entries_before: before,
                    entries_after: 0,
                    dropped,
                })
            }
        }
    }

    fn oldest_low_priority_recall_key(&self) -> Option<EntryKey> {
        self.active_by_source_id
            .iter()
            .filter(|(_, e)| self.is_recall_zone(e) && e.priority == Priority::Low)
            .min_by_key(|(_, e)| e.timestamp)
            .map(|(k, _)| k.clone())
    }

    pub fn plan(&mut self, total_token_budget: u32, options: PlanOptions) -> PlanOutput {
        self.floor_unmet_emitted_this_turn = false;
        if options.force_critical_only {
            let mut telemetry = PlanTelemetry { stability_forced: true, ..Default::default() };
            return self.plan_critical_only(total_token_budget, &mut telemetry);
        }

        let use_static = options.disable_adaptive_zones
            || matches!(options.strategy_arm, Some(StrategyArm::Hybrid) | Some(StrategyArm::Passthrough));

        let zone_max: HashMap<Zone, u32> = if use_static {
            self.config.zone_budgets.iter().map(|(z, b)| (*z, b.max)).collect()
        } else {
            self.adaptive_max.clone()
        };

        let mut telemetry = PlanTelemetry { adaptive_zones_disabled: use_static, ..Default::default() };
        let (joined, consumed, floor_unmet) = self.allocate(total_token_budget, &zone_max, &HashSet::new(), &mut telemetry);

        if floor_unmet && self.config.floor_relaxation.enabled {
            telemetry.floor_unmet = true;
            if let Some(result) = self.try_floor_relaxation(total_token_budget, &zone_max, &mut telemetry) {
                return result;
            }
            return self.plan_critical_only(total_token_budget, &mut telemetry);
        }

        PlanOutput { joined_content: joined, consumed_keys: consumed, telemetry }
    }

    /// Relaxes zone floors one at a time, in `relax_order`, accumulating
    /// relaxations until the global/zone pass no longer reports unmet
    /// demand. `telemetry.applied_floor_relaxation` names exactly the
    /// zones whose floor was actually relaxed to reach that state.
    fn try_floor_relaxation(
        &self,
        total_token_budget: u32,
        zone_max: &HashMap<Zone, u32>,
        telemetry: &mut PlanTelemetry,
    ) -> Option<PlanOutput> {
        let mut relaxed = HashSet::new();
        for zone in &self.config.floor_relaxation.relax_order {
            relaxed.insert(*zone);
            let (joined, consumed, floor_unmet) = self.allocate(total_token_budget, zone_max, &relaxed, telemetry);
            if !floor_unmet {
                telemetry.applied_floor_relaxation = relaxed.into_iter().collect();
                return Some(PlanOutput { joined_content: joined, consumed_keys: consumed, telemetry: telemetry.clone() });
            }
        }
        None
    }

    fn plan_critical_only(&mut self, total_token_budget: u32, telemetry: &mut PlanTelemetry) -> PlanOutput {
        let mut spend = 0u32;
        let mut consumed = Vec::new();
        let mut pieces = Vec::new();
        for zone in Zone::ALL_IN_ORDER {
            if !zone.is_always_critical_eligible() {
                continue;
            }
            let mut entries: Vec<&ContextInjectionEntry> = self
                .active_by_source_id
                .values()
                .filter(|e| self.config.zone_map.zone_of(&e.source) == Some(zone))
                .filter(|e| e.priority == Priority::Critical)
                .collect();
            entries.sort_by(|a, b| a.priority.rank().cmp(&b.priority.rank()).then(a.timestamp.cmp(&b.timestamp)));
            for entry in entries {
                if spend + entry.estimated_tokens > total_token_budget {
                    continue;
                }
                spend += entry.estimated_tokens;
                consumed.push(entry.key());
                pieces.push(entry.content.clone());
            }
        }
        if self.config.floor_relaxation.request_compaction && !self.floor_unmet_emitted_this_turn {
            self.floor_unmet_emitted_this_turn = true;
        }
        PlanOutput { joined_content: pieces.join("\n\n"), consumed_keys: consumed, telemetry: telemetry.clone() }
    }

    /// Core allocation pass: walks zones in declaration order, greedily
    /// accepting entries within each zone's budget and the global budget.
    /// Zones in `relaxed_zones` have their `min` floor treated as 0 for this
    /// pass only. Returns `(joined_content, consumed_keys, floor_unmet)`.
    fn allocate(
        &self,
        total_token_budget: u32,
        zone_max: &HashMap<Zone, u32>,
        relaxed_zones: &HashSet<Zone>,
        telemetry: &mut PlanTelemetry,
    ) -> (String, Vec<EntryKey>, bool) {
        let mut global_spend = 0u32;
        let mut consumed = Vec::new();
        let mut pieces = Vec::new();
        let mut floor_unmet = false;

        for zone in Zone::ALL_IN_ORDER {
            let budget = self.config.zone_budgets.get(&zone).copied().unwrap_or(ZoneBudget::disabled());
            let max = zone_max.get(&zone).copied().unwrap_or(budget.max);
            let min = if relaxed_zones.contains(&zone) { 0 } else { budget.min };

            let mut candidates: Vec<&ContextInjectionEntry> = self
                .active_by_source_id
                .values()
                .filter(|e| self.config.zone_map.zone_of(&e.source) == Some(zone))
                .filter(|e| max > 0 || (e.priority == Priority::Critical && zone.is_always_critical_eligible()))
                .collect();
            candidates.sort_by(|a, b| a.priority.rank().cmp(&b.priority.rank()).then(a.timestamp.cmp(&b.timestamp)));

            let demand: u32 = candidates.iter().map(|e| e.estimated_tokens).sum();
            let mut zone_spend = 0u32;
            let mut zone_accepted = 0u32;
            let mut truncated_this_zone = false;

            for entry in &candidates {
                if truncated_this_zone && self.config.truncation_strategy == TruncationStrategy::Tail {
                    break;
                }
                let remaining_zone = max.saturating_sub(zone_spend);
                let remaining_global = total_token_budget.saturating_sub(global_spend);
                let remaining = remaining_zone.min(remaining_global);

                if entry.estimated_tokens <= remaining {
                    zone_spend += entry.estimated_tokens;
                    global_spend += entry.estimated_tokens;
                    zone_accepted += 1;
                    consumed.push(entry.key());
                    pieces.push(entry.content.clone());
                    continue;
                }

                match self.config.truncation_strategy {
                    TruncationStrategy::DropEntry => continue,
                    TruncationStrategy::Summarize => {
                        if remaining == 0 {
                            continue;
                        }
                        let stub = format!(
                            "[ContextTruncated] source={} id={} originalTokens={}",
                            entry.source, entry.id, entry.estimated_tokens
                        );
                        zone_spend += remaining;
                        global_spend += remaining;
                        zone_accepted += 1;
                        consumed.push(entry.key());
                        pieces.push(stub);
                    }
                    TruncationStrategy::Tail => {
                        if remaining == 0 {
                            truncated_this_zone = true;
                            continue;
                        }
                        let keep_from = entry.content.len().saturating_sub(remaining as usize);
                        let tail = entry.content[keep_from..].to_string();
                        zone_spend += remaining;
                        global_spend += remaining;
                        zone_accepted += 1;
                        consumed.push(entry.key());
                        pieces.push(tail);
                        truncated_this_zone = true;
                    }
                }
            }

            telemetry.zone.insert(zone, ZoneTelemetry { demand, allocated: max, accepted: zone_accepted });

            if min > 0 && zone_spend < min && zone_spend < demand {
                floor_unmet = true;
            }
        }

        (pieces.join("\n\n"), consumed, floor_unmet)
    }

    /// Marks entries consumed by a plan as presented; `once_per_session`
    /// entries are additionally recorded so they never resurface.
    pub fn commit(&mut self, consumed_keys: &[EntryKey]) {
        for key in consumed_keys {
            self.presented_keys.insert(key.clone());
            if let Some(entry) = self.active_by_source_id.get(key) {
                if entry.once_per_session {
                    self.once_keys.insert(key.clone());
                }
            }
        }
    }

    pub fn record_adaptive_observation(&mut self, zone_stats: HashMap<Zone, (u32, u32, u32)>) {
        self.adaptive_max = self.adaptive_state.observe_and_adjust(&zone_stats, &self.adaptive_max);
    }

    pub fn active_len(&self) -> usize {
        self.active_by_source_id.len()
    }

    pub fn is_presented(&self, key: &EntryKey) -> bool {
        self.presented_keys.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> ArenaConfig {
        let mut zone_map = ZoneMap::new();
        zone_map.insert("identity.card", Zone::Identity);
        zone_map.insert("truth.facts", Zone::Truth);
        zone_map.insert("memory.recall", Zone::MemoryRecall);

        let mut budgets = HashMap::new();
        budgets.insert(Zone::Identity, ZoneBudget { min: 10, max: 200 });
        budgets.insert(Zone::Truth, ZoneBudget { min: 0, max: 200 });
        budgets.insert(Zone::TaskState, ZoneBudget::disabled());
        budgets.insert(Zone::ToolFailures, ZoneBudget::disabled());
        budgets.insert(Zone::MemoryWorking, ZoneBudget::disabled());
        budgets.insert(Zone::MemoryRecall, ZoneBudget { min: 0, max: 100 });
        budgets.insert(Zone::RagExternal, ZoneBudget::disabled());

        ArenaConfig {
            zone_map,
            zone_budgets: budgets,
            truncation_strategy: TruncationStrategy::DropEntry,
            max_entries_per_session: 3,
            slo_policy: SloPolicy::DropLowPriority,
            floor_relaxation: FloorRelaxationConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }

    fn entry(source: &str, id: &str, priority: Priority, tokens: u32) -> ContextInjectionEntry {
        ContextInjectionEntry {
            source: source.to_string(),
            id: id.to_string(),
            content: "x".repeat(tokens as usize),
            priority,
            estimated_tokens: tokens,
            timestamp: Utc::now(),
            once_per_session: false,
            truncated: false,
        }
    }

    #[test]
    fn plan_returns_the_latest_write_for_a_key() {
        let mut arena = Arena::new(config());
        let mut old = entry("truth.facts", "tf", Priority::High, 10);
        old.content = "old".to_string();
        let mut new = entry("truth.facts", "tf", Priority::High, 10);
        new.content = "new".to_string();
        arena.append(old);
        arena.append(new);
        let output = arena.plan(10_000, PlanOptions::default());
        assert_eq!(output.consumed_keys.len(), 1);
        assert_eq!(output.joined_content, "new");
    }

    fn tight_global_budget_config() -> ArenaConfig {
        let mut zone_map = ZoneMap::new();
        zone_map.insert("identity.card", Zone::Identity);
        zone_map.insert("memory.recall", Zone::MemoryRecall);

        let mut budgets = HashMap::new();
        budgets.insert(Zone::Identity, ZoneBudget { min: 0, max: 50 });
        budgets.insert(Zone::Truth, ZoneBudget::disabled());
        budgets.insert(Zone::TaskState, ZoneBudget::disabled());
        budgets.insert(Zone::ToolFailures, ZoneBudget::disabled());
        budgets.insert(Zone::MemoryWorking, ZoneBudget::disabled());
        budgets.insert(Zone::MemoryRecall, ZoneBudget { min: 20, max: 100 });
        budgets.insert(Zone::RagExternal, ZoneBudget::disabled());

        ArenaConfig {
            zone_map,
            zone_budgets: budgets,
            truncation_strategy: TruncationStrategy::DropEntry,
            max_entries_per_session: 10,
            slo_policy: SloPolicy::DropLowPriority,
            floor_relaxation: FloorRelaxationConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }

    #[test]
    fn plan_relaxes_memory_recall_floor_when_global_budget_is_tight() {
        // Identity eats the whole global budget, leaving memory_recall's
        // floor unreachable; the cascade should relax memory_recall (the
        // first entry in the default relax order) and still produce a plan.
        let mut arena = Arena::new(tight_global_budget_config());
        arena.append(entry("identity.card", "1", Priority::Critical, 50));
        arena.append(entry("memory.recall", "1", Priority::Normal, 30));

        let output = arena.plan(60, PlanOptions::default());

        assert!(output.telemetry.floor_unmet, "an unmet floor is what triggers the relaxation cascade");
        assert_eq!(output.telemetry.applied_floor_relaxation, vec![Zone::MemoryRecall]);
        assert_eq!(output.consumed_keys.len(), 1);
        assert_eq!(output.consumed_keys[0].source, "identity.card");
    }

    #[test]
    fn plan_respects_zone_and_global_budget() {
        let mut arena = Arena::new(config());
        arena.append(entry("identity.card", "1", Priority::Critical, 50));
        arena.append(entry("truth.facts", "1", Priority::High, 80));
        let output = arena.plan(60, PlanOptions::default());
        // Global budget of 60 admits identity (50) but not truth (80).
        assert_eq!(output.consumed_keys.len(), 1);
    }

    #[test]
    fn commit_marks_once_per_session_entries_consumed() {
        let mut arena = Arena::new(config());
        let mut e = entry("identity.card", "1", Priority::Critical, 10);
        e.once_per_session = true;
        arena.append(e);
        let output = arena.plan(1000, PlanOptions::default());
        arena.commit(&output.consumed_keys);
        let key = EntryKey::new("identity.card", "1");
        let result = arena.append(entry("identity.card", "1", Priority::Critical, 10));
        assert!(!result.accepted);
        assert!(arena.is_presented(&key));
    }

    #[test]
    fn slo_drop_low_priority_evicts_lowest_when_over_cap() {
        let mut arena = Arena::new(config());
        arena.append(entry("identity.card", "1", Priority::Low, 5));
        arena.append(entry("identity.card", "2", Priority::Low, 5));
        arena.append(entry("identity.card", "3", Priority::Low, 5));
        let result = arena.append(entry("identity.card", "4", Priority::High, 5));
        assert!(result.accepted);
        assert!(result.slo_enforced.is_some());
        assert_eq!(arena.active_len(), 3);
    }

    #[test]
    fn force_critical_only_keeps_only_critical_zones() {
        let mut arena = Arena::new(config());
        arena.append(entry("identity.card", "1", Priority::Critical, 10));
        arena.append(entry("memory.recall", "1", Priority::Critical, 10));
        let output = arena.plan(1000, PlanOptions { force_critical_only: true, ..Default::default() });
        assert_eq!(output.consumed_keys.len(), 1);
        assert_eq!(output.consumed_keys[0].source, "identity.card");
    }

    #[test]
    fn reset_epoch_clears_presented_but_keeps_active() {
        let mut arena = Arena::new(config());
        arena.append(entry("identity.card", "1", Priority::Critical, 10));
        let output = arena.plan(1000, PlanOptions::default());
        arena.commit(&output.consumed_keys);
        let epoch_before = arena.epoch();
        arena.reset_epoch();
        assert_eq!(arena.epoch(), epoch_before + 1);
        assert_eq!(arena.active_len(), 1);
        assert!(!arena.is_presented(&EntryKey::new("identity.card", "1")));
    }
}
