use std::path::PathBuf;

use orch_sdk::{Runtime, ToolCallResult};
use orch_types::{Event, EventKind};
use uuid::Uuid;

use crate::args::{Cli, OutputMode, RunArgs};
use crate::error::{Error, Result};
use crate::output;

fn resolve_workspace(cli: &Cli) -> PathBuf {
    cli.cwd.clone().unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn open_runtime(cli: &Cli) -> Result<Runtime> {
    let workspace_root = resolve_workspace(cli);
    Ok(Runtime::open_with_config(workspace_root, cli.config.clone())?)
}

fn most_recent_session(runtime: &Runtime) -> Result<String> {
    runtime.list_sessions()?.into_iter().next().ok_or(Error::NoSessionSpecified)
}

pub fn handle(cli: Cli, run: RunArgs) -> Result<()> {
    let runtime = open_runtime(&cli)?;

    if run.undo {
        return handle_undo(&runtime, &run);
    }
    if run.replay {
        return handle_replay(&runtime, &run);
    }

    let session_id = match &run.session {
        Some(id) => id.clone(),
        None => Uuid::new_v4().to_string(),
    };
    let session = runtime.session(session_id)?;

    runtime.events.append(Event::new(session.id(), EventKind::SessionStart, serde_json::json!({"model": run.model})));

    let turn = session.start_turn()?;

    if let Some(prompt) = &run.prompt {
        runtime.events.append(
            Event::new(session.id(), EventKind::MessageStart, serde_json::json!({"role": "user", "text": prompt})).with_turn(turn),
        );
        runtime.events.append(
            Event::new(session.id(), EventKind::MessageEnd, serde_json::json!({"role": "user"})).with_turn(turn),
        );

        // No model/tool harness is wired here: that's the embedding agent
        // loop's job, out of scope for this binary. Record the turn as a
        // no-op completion so cost/truth accounting stays consistent.
        session.call_tool(
            &Uuid::new_v4().to_string(),
            "noop",
            serde_json::json!({}),
            turn,
            None,
            || ToolCallResult { success: true, output_summary: "no dispatch harness attached".to_string() },
        )?;
    }

    session.end_turn(turn);

    let cost = session.cost_snapshot();
    let budget = session.budget_status();
    output::emit_turn_summary(run.mode, turn, &cost, &budget);

    if run.print {
        session.shutdown();
    }

    Ok(())
}

fn handle_undo(runtime: &Runtime, run: &RunArgs) -> Result<()> {
    let session_id = match &run.session {
        Some(id) => id.clone(),
        None => most_recent_session(runtime)?,
    };
    let session = runtime.session(session_id)?;
    let outcome = session.rollback_last()?;
    output::emit_rollback(run.mode, &outcome);
    if !outcome.ok {
        return Err(Error::Argument(format!("rollback failed: {}", outcome.reason.as_deref().unwrap_or("unknown"))));
    }
    Ok(())
}

fn handle_replay(runtime: &Runtime, run: &RunArgs) -> Result<()> {
    let session_id = match &run.session {
        Some(id) => id.clone(),
        None => most_recent_session(runtime)?,
    };
    let session = runtime.session(session_id)?;
    let events = session.events()?;
    let facts = session.active_truth_facts();
    let cost = session.cost_snapshot();

    if run.mode == OutputMode::Json {
        for event in &events {
            output::emit_event(OutputMode::Json, event);
        }
    }
    output::emit_replay(run.mode, &events, &facts, &cost);
    Ok(())
}
