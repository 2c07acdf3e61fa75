use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputMode {
    Text,
    Json,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Text => write!(f, "text"),
            OutputMode::Json => write!(f, "json"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "orch", version, about = "Drive and inspect agent orchestration sessions against a workspace")]
pub struct Cli {
    /// Workspace directory to operate against. Defaults to the current directory.
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Path to an orch.toml overriding the workspace-local one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start or continue a turn in a session, optionally with a one-shot prompt.
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Prompt text for a one-shot turn. Omit to just open/advance the session.
    pub prompt: Option<String>,

    /// Session id to operate on. Defaults to a freshly minted id for a new run.
    #[arg(long)]
    pub session: Option<String>,

    /// Print the turn's text output and exit, rather than staying attached.
    #[arg(long)]
    pub print: bool,

    /// Output rendering: human text (default) or newline-delimited JSON events.
    #[arg(long, value_enum, default_value_t = OutputMode::Text)]
    pub mode: OutputMode,

    /// Roll back the most recent tracked file mutation for the session.
    #[arg(long)]
    pub undo: bool,

    /// Replay and print the session's folded state from its event log.
    #[arg(long)]
    pub replay: bool,

    /// `provider/model` to record against cost accounting for this run.
    #[arg(long)]
    pub model: Option<String>,
}
