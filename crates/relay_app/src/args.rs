use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_core::ItemId;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "relay")]
#[command(version, about = "Submits a queue of prompts to a browser chat tab, one at a time")]
pub struct Args {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Queue and settings directory
    #[arg(long, global = true, default_value = "relay-data")]
    pub data_dir: PathBuf,

    /// Process state and image slots (defaults to <tmp>/relay-session)
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    /// Automation host base URL
    #[arg(long, global = true)]
    pub agent_url: Option<String>,

    /// Destination tab URL pattern
    #[arg(long, global = true)]
    pub target: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also log to ./engine.log
    #[arg(long, global = true)]
    pub log_file: bool,
}

impl Args {
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("relay-session"))
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Append a prompt to the queue
    Add {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Tool to select for this item
        #[arg(long)]
        tool: Option<String>,
        /// Mode to select for this item
        #[arg(long)]
        mode: Option<String>,
    },

    /// Show the queue and any armed schedule
    List,

    /// Put finished items back to pending (all of them when no ids are given)
    Reset {
        ids: Vec<ItemId>,
        /// Only reset failed items
        #[arg(long = "failed")]
        failed_only: bool,
    },

    /// Start a run at an epoch-millisecond time
    Schedule {
        at_ms: i64,
        /// Repeat every 24 hours
        #[arg(long)]
        daily: bool,
    },

    /// Disable the stored schedule
    Unschedule,

    /// Check that a destination tab is ready
    Probe,

    /// Process the queue (or one item) until the run ends
    Run {
        /// Process only this pending item
        #[arg(long)]
        item: Option<ItemId>,
    },

    /// Keep the engine alive so schedules fire, until Ctrl-C
    Watch,
}
