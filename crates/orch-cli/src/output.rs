use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use orch_sdk::{BudgetStatus, CostSnapshot, Event, RollbackOutcome, TruthFact};

use crate::args::OutputMode;

/// Whether to colorize text output. Disabled for non-terminals so piped
/// output (`orch run --print | grep ...`) stays clean.
fn colorize() -> bool {
    std::io::stdout().is_terminal()
}

pub fn emit_event(mode: OutputMode, event: &Event) {
    match mode {
        OutputMode::Json => {
            if let Ok(line) = serde_json::to_string(event) {
                println!("{line}");
            }
        }
        OutputMode::Text => {
            let label = format!("{:?}", event.kind);
            if colorize() {
                println!("{} {}", label.cyan(), event.payload);
            } else {
                println!("{label} {}", event.payload);
            }
        }
    }
}

pub fn emit_turn_summary(mode: OutputMode, turn: u64, cost: &CostSnapshot, budget: &BudgetStatus) {
    match mode {
        OutputMode::Json => {
            let payload = serde_json::json!({"turn": turn, "cost": cost, "budget": budget});
            if let Ok(line) = serde_json::to_string(&payload) {
                println!("{line}");
            }
        }
        OutputMode::Text => {
            let header = format!("turn {turn} complete");
            if colorize() {
                println!("{}", header.green().bold());
            } else {
                println!("{header}");
            }
            println!(
                "  tokens: {} total, ${:.4} spent",
                cost.session.total_tokens, cost.session.total_cost_usd
            );
            if budget.blocked {
                let warning = format!("  cost budget blocked tools: {}", budget.reason.as_deref().unwrap_or("cap reached"));
                if colorize() {
                    println!("{}", warning.red());
                } else {
                    println!("{warning}");
                }
            }
        }
    }
}

pub fn emit_rollback(mode: OutputMode, outcome: &RollbackOutcome) {
    match mode {
        OutputMode::Json => {
            if let Ok(line) = serde_json::to_string(outcome) {
                println!("{line}");
            }
        }
        OutputMode::Text => {
            if outcome.ok {
                if colorize() {
                    println!("{}", "rollback ok".green());
                } else {
                    println!("rollback ok");
                }
            } else {
                println!(
                    "rollback failed: {} ({} paths)",
                    outcome.reason.as_deref().unwrap_or("unknown"),
                    outcome.failed_paths.len()
                );
            }
        }
    }
}

pub fn emit_replay(mode: OutputMode, events: &[Event], facts: &[TruthFact], cost: &CostSnapshot) {
    match mode {
        OutputMode::Json => {
            let payload = serde_json::json!({"event_count": events.len(), "active_truth_facts": facts, "cost": cost});
            if let Ok(line) = serde_json::to_string(&payload) {
                println!("{line}");
            }
        }
        OutputMode::Text => {
            println!("replayed {} events", events.len());
            println!("active truth facts: {}", facts.len());
            for fact in facts {
                println!("  - [{}] {}", fact.kind, fact.summary);
            }
            println!("total cost: ${:.4}", cost.session.total_cost_usd);
        }
    }
}
