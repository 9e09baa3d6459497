use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use qualcode_core::api::{CommitDecision, TaskKind};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMode {
    /// Ask on stdin when something similar exists.
    Prompt,
    All,
    New,
    Abort,
}

impl DecisionMode {
    /// The fixed decision for non-interactive modes.
    pub fn fixed(self) -> Option<CommitDecision> {
        match self {
            Self::Prompt => None,
            Self::All => Some(CommitDecision::CommitAll),
            Self::New => Some(CommitDecision::CommitNonDuplicatesOnly),
            Self::Abort => Some(CommitDecision::Abort),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "qualcode", version, about = "Drive qualcode backend tasks from the terminal")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to `$QUALCODE_HOME/config.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// discovery-agent, suggestion-runner, sync-job or cleanup-job.
    #[arg(long)]
    pub kind: TaskKind,

    /// Task parameter (KEY=VALUE). Values that parse as JSON are sent as JSON.
    /// Can be specified multiple times.
    #[arg(long = "param", action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Base parameter object; `--param` entries are merged on top.
    #[arg(long)]
    pub params_json: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TaskRefArgs {
    #[arg(long)]
    pub kind: TaskKind,

    #[arg(long)]
    pub task_id: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "sync-job")]
    pub kind: TaskKind,

    #[arg(long)]
    pub task_id: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckCodesArgs {
    /// Similarity threshold in [0, 1]; defaults to `dedup.threshold`.
    #[arg(long)]
    pub threshold: Option<f32>,

    #[arg(long, value_enum, default_value_t = DecisionMode::Prompt)]
    pub decision: DecisionMode,

    #[arg(required = true)]
    pub codes: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Resume(TaskRefArgs),
    Watch(TaskRefArgs),
    Status(StatusArgs),
    CheckCodes(CheckCodesArgs),
    Ping,
}
