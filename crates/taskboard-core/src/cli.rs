use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::{DueFilter, PriorityFilter};
use crate::task::{Priority, Status};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "board",
    version,
    about = "Personal kanban board: tasks in To Do, In Progress and Done columns",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "taskrc")]
    pub taskrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a task
    Add(AddArgs),
    /// Change fields of an existing task
    Edit(EditArgs),
    /// Move a task from one column to another
    Move {
        id: String,
        from: Status,
        to: Status,
    },
    /// Delete a task
    Delete { id: String },
    /// Show every field of one task
    Show { id: String },
    /// Tasks grouped into columns
    Board(SearchArgs),
    /// Tasks as a table
    List(ListArgs),
    /// Tags in use with task counts
    Tags,
    /// Due dates for a month plus overdue, today and upcoming
    Agenda {
        /// Month as YYYY-MM; defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Print the stored document as JSON
    Export,
    /// Merge tasks from a JSON document
    Import { file: PathBuf },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub title: Vec<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub status: Option<Status>,

    #[arg(long)]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    #[arg(long)]
    pub clear_description: bool,

    #[arg(long)]
    pub status: Option<Status>,

    #[arg(long, conflicts_with = "clear_priority")]
    pub priority: Option<Priority>,

    #[arg(long)]
    pub clear_priority: bool,

    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,

    #[arg(long)]
    pub clear_due: bool,

    /// Add a tag
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,

    /// Remove a tag
    #[arg(long = "untag", action = ArgAction::Append)]
    pub untags: Vec<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchArgs {
    /// Case-insensitive title substring
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Required tag; repeat to require several
    #[arg(long = "tag", action = ArgAction::Append)]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    #[arg(long)]
    pub status: Option<Status>,

    /// low, medium, high or none
    #[arg(long, value_parser = parse_priority_filter)]
    pub priority: Option<PriorityFilter>,

    /// any, has or none
    #[arg(long, value_parser = parse_due_filter)]
    pub due: Option<DueFilter>,
}

fn parse_priority_filter(raw: &str) -> anyhow::Result<PriorityFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "any" => Ok(PriorityFilter::Any),
        "none" => Ok(PriorityFilter::None),
        other => Ok(PriorityFilter::Is(other.parse::<Priority>()?)),
    }
}

fn parse_due_filter(raw: &str) -> anyhow::Result<DueFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "any" => Ok(DueFilter::Any),
        "has" | "has_due" | "set" => Ok(DueFilter::HasDue),
        "none" | "no_due" | "unset" => Ok(DueFilter::NoDue),
        other => Err(anyhow!("invalid due filter: {other} (expected any, has or none)")),
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}
