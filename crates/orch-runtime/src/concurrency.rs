use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};

use orch_types::SkillContract;

/// Non-blocking per-session parallel-worker slot acquisition, bounded by a
/// per-session limit, a global limit, and (when a skill is named) that
/// skill's own `maxParallel`. `try_acquire` never blocks: the caller gets
/// a busy outcome and backs off rather than waiting.
pub struct ParallelSlots {
    global: Arc<Semaphore>,
    per_session: std::sync::Mutex<HashMap<String, Arc<Semaphore>>>,
    per_session_skill: std::sync::Mutex<HashMap<(String, String), Arc<Semaphore>>>,
    per_session_limit: usize,
}

pub enum SlotOutcome {
    Acquired(ParallelSlotGuard),
    Busy,
    SkillBusy(String),
}

pub struct ParallelSlotGuard {
    _global: tokio::sync::OwnedSemaphorePermit,
    _session: tokio::sync::OwnedSemaphorePermit,
    _skill: Option<tokio::sync::OwnedSemaphorePermit>,
}

impl ParallelSlots {
    pub fn new(max_total: usize, per_session_limit: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_total)),
            per_session: std::sync::Mutex::new(HashMap::new()),
            per_session_skill: std::sync::Mutex::new(HashMap::new()),
            per_session_limit,
        }
    }

    fn session_semaphore(&self, session_id: &str) -> Arc<Semaphore> {
        let mut sessions = self.per_session.lock().unwrap();
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_session_limit)))
            .clone()
    }

    fn skill_semaphore(&self, session_id: &str, skill: &SkillContract) -> Arc<Semaphore> {
        let mut skills = self.per_session_skill.lock().unwrap();
        skills
            .entry((session_id.to_string(), skill.name.clone()))
            .or_insert_with(|| Arc::new(Semaphore::new(skill.max_parallel as usize)))
            .clone()
    }

    /// `skill`, when given, additionally bounds concurrency to that
    /// skill's own `maxParallel` within the session, on top of the
    /// session-wide and global limits.
    pub fn try_acquire(&self, session_id: &str, skill: Option<&SkillContract>) -> SlotOutcome {
        let session_sem = self.session_semaphore(session_id);
        let Ok(session_permit) = session_sem.try_acquire_owned() else {
            return SlotOutcome::Busy;
        };
        let Ok(global_permit) = self.global.clone().try_acquire_owned() else {
            return SlotOutcome::Busy;
        };
        let skill_permit = match skill {
            Some(skill) => {
                let skill_sem = self.skill_semaphore(session_id, skill);
                match skill_sem.try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => return SlotOutcome::SkillBusy(skill.name.clone()),
                }
            }
            None => None,
        };
        SlotOutcome::Acquired(ParallelSlotGuard { _global: global_permit, _session: session_permit, _skill: skill_permit })
    }
}

/// Session-scoped cancellation, propagated to in-flight tool dispatches.
/// `trigger` flips the watch; every clone of `watcher()` observes it.
pub struct CancellationToken {
    tx: watch::Sender<bool>,
}

impl CancellationToken {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
        *rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquisition_past_session_limit_is_busy() {
        let slots = ParallelSlots::new(10, 1);
        let first = slots.try_acquire("s1", None);
        assert!(matches!(first, SlotOutcome::Acquired(_)));
        let second = slots.try_acquire("s1", None);
        assert!(matches!(second, SlotOutcome::Busy));
    }

    #[tokio::test]
    async fn global_cap_applies_across_sessions() {
        let slots = ParallelSlots::new(1, 5);
        let _a = slots.try_acquire("s1", None);
        let b = slots.try_acquire("s2", None);
        assert!(matches!(b, SlotOutcome::Busy));
    }

    #[tokio::test]
    async fn releasing_a_guard_frees_the_slot() {
        let slots = ParallelSlots::new(1, 1);
        {
            let _guard = slots.try_acquire("s1", None);
        }
        let second = slots.try_acquire("s1", None);
        assert!(matches!(second, SlotOutcome::Acquired(_)));
    }

    fn skill(max_parallel: u32) -> SkillContract {
        SkillContract {
            name: "reviewer".into(),
            tier: orch_types::Tier::Base,
            tags: Default::default(),
            anti_tags: Default::default(),
            tools: orch_types::ToolAccess::default(),
            budget: orch_types::SkillBudget::unbounded(),
            max_parallel,
            stability: orch_types::Stability::Stable,
            cost_hint: None,
            instructions: String::new(),
        }
    }

    #[tokio::test]
    async fn skill_parallel_cap_applies_within_session_even_under_session_limit() {
        let slots = ParallelSlots::new(10, 10);
        let limited = skill(1);
        let first = slots.try_acquire("s1", Some(&limited));
        assert!(matches!(first, SlotOutcome::Acquired(_)));
        let second = slots.try_acquire("s1", Some(&limited));
        assert!(matches!(second, SlotOutcome::SkillBusy(name) if name == "reviewer"));
    }

    #[tokio::test]
    async fn different_skills_in_the_same_session_have_independent_caps() {
        let slots = ParallelSlots::new(10, 10);
        let a = skill(1);
        let mut b = skill(1);
        b.name = "other".into();
        let first = slots.try_acquire("s1", Some(&a));
        assert!(matches!(first, SlotOutcome::Acquired(_)));
        let second = slots.try_acquire("s1", Some(&b));
        assert!(matches!(second, SlotOutcome::Acquired(_)));
    }

    #[tokio::test]
    async fn cancellation_token_propagates() {
        let (token, rx) = CancellationToken::new();
        assert!(!CancellationToken::is_cancelled(&rx));
        token.trigger();
        assert!(CancellationToken::is_cancelled(&rx));
    }
}
