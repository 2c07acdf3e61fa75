use std::collections::HashMap;

use orch_types::Zone;

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveConfig {
    pub ema_alpha: f64,
    pub min_turns_before_adapt: u32,
    pub upshift_truncation_ratio: f64,
    pub downshift_idle_ratio: f64,
    pub step_tokens: u32,
    pub max_shift_per_turn: u32,
    pub zone_max_absolute: u32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.3,
            min_turns_before_adapt: 3,
            upshift_truncation_ratio: 0.25,
            downshift_idle_ratio: 0.5,
            step_tokens: 64,
            max_shift_per_turn: 256,
            zone_max_absolute: 8192,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ZoneEma {
    truncation: f64,
    idle: f64,
}

/// Per-zone EMA of truncation/idle pressure, used to shift token budget
/// from idle zones to zones that are chronically truncating. Exposed via
/// `snapshot` for testability, per the spec's explicit callout.
#[derive(Debug, Clone)]
pub struct AdaptiveController {
    config: AdaptiveConfig,
    ema: HashMap<Zone, ZoneEma>,
    turns_observed: u32,
}

impl AdaptiveController {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config, ema: HashMap::new(), turns_observed: 0 }
    }

    /// Observes this turn's per-zone `(dropped_tokens, accepted_tokens, max)`
    /// and produces the adjusted per-zone `max` for the *next* plan, with a
    /// per-turn shift cap honored across all zones combined.
    pub fn observe_and_adjust(
        &mut self,
        zone_stats: &HashMap<Zone, (u32, u32, u32)>,
        current_max: &HashMap<Zone, u32>,
    ) -> HashMap<Zone, u32> {
        self.turns_observed += 1;
        let alpha = self.config.ema_alpha;

        for (zone, (dropped, accepted, max)) in zone_stats {
            let truncation_ratio = if dropped + accepted == 0 {
                0.0
            } else {
                *dropped as f64 / (*dropped + *accepted) as f64
            };
            let idle_ratio = if *max == 0 { 0.0 } else { (1.0 - *accepted as f64 / *max as f64).clamp(0.0, 1.0) };

            let entry = self.ema.entry(*zone).or_default();
            entry.truncation = alpha * truncation_ratio + (1.0 - alpha) * entry.truncation;
            entry.idle = alpha * idle_ratio + (1.0 - alpha) * entry.idle;
        }

        let mut adjusted = current_max.clone();
        if self.turns_observed < self.config.min_turns_before_adapt {
            return adjusted;
        }

        let mut remaining_shift = self.config.max_shift_per_turn;
        loop {
            let recipient = self
                .ema
                .iter()
                .filter(|(_, e)| e.truncation > self.config.upshift_truncation_ratio)
                .max_by(|(_, a), (_, b)| a.truncation.partial_cmp(&b.truncation).unwrap());
            let Some((&recipient_zone, _)) = recipient else { break };

            let donor = self
                .ema
                .iter()
                .filter(|(z, e)| **z != recipient_zone && e.idle > self.config.downshift_idle_ratio)
                .max_by(|(_, a), (_, b)| a.idle.partial_cmp(&b.idle).unwrap());
            let Some((&donor_zone, _)) = donor else { break };

            let step = self.config.step_tokens.min(remaining_shift);
            if step == 0 {
                break;
            }

            let donor_max = adjusted.entry(donor_zone).or_insert(0);
            let take = step.min(donor_max.saturating_sub(1));
            if take == 0 {
                break;
            }
            *donor_max -= take;

            let recipient_max = adjusted.entry(recipient_zone).or_insert(0);
            *recipient_max = (*recipient_max + take).min(self.config.zone_max_absolute);

            remaining_shift -= take;
            // One adjustment per zone pair per turn; further shifts wait for
            // the next observation so EMAs stay representative.
            break;
        }

        adjusted
    }

    pub fn snapshot(&self) -> HashMap<Zone, (f64, f64)> {
        self.ema.iter().map(|(z, e)| (*z, (e.truncation, e.idle))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_tokens_from_idle_to_truncating_zone_after_warmup() {
        let mut controller = AdaptiveController::new(AdaptiveConfig::default());
        let mut current_max = HashMap::new();
        current_max.insert(Zone::MemoryRecall, 1000);
        current_max.insert(Zone::ToolFailures, 200);

        let mut stats = HashMap::new();
        stats.insert(Zone::MemoryRecall, (0, 50, 1000)); // mostly idle
        stats.insert(Zone::ToolFailures, (300, 100, 200)); // heavily truncated

        let mut adjusted = current_max.clone();
        for _ in 0..4 {
            adjusted = controller.observe_and_adjust(&stats, &adjusted);
        }

        assert!(adjusted[&Zone::ToolFailures] > 200);
        assert!(adjusted[&Zone::MemoryRecall] < 1000);
    }

    #[test]
    fn no_adjustment_before_warmup() {
        let mut controller = AdaptiveController::new(AdaptiveConfig::default());
        let mut current_max = HashMap::new();
        current_max.insert(Zone::MemoryRecall, 1000);
        let mut stats = HashMap::new();
        stats.insert(Zone::MemoryRecall, (900, 100, 1000));
        let adjusted = controller.observe_and_adjust(&stats, &current_max);
        assert_eq!(adjusted[&Zone::MemoryRecall], 1000);
    }
}
