use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `DashClaw` - governance client for autonomous agent actions.
#[derive(Parser, Debug)]
#[command(name = "dashclaw")]
#[command(version)]
#[command(about = "Guard, approve and monitor agent actions against a DashClaw service.", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.dashclaw/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate an action context against guard policies
    Guard {
        /// Action type to evaluate (e.g. deploy)
        action_type: String,

        /// Risk score 0-100
        #[arg(long)]
        risk_score: Option<u8>,

        /// Declared goal of the action
        #[arg(long)]
        goal: Option<String>,

        /// System the action touches (repeatable)
        #[arg(long = "system")]
        systems: Vec<String>,

        /// Whether the action can be undone
        #[arg(long)]
        reversible: Option<bool>,

        /// Include live signals in the evaluation
        #[arg(long)]
        include_signals: bool,
    },

    /// Allow or deny a pending action
    Approve {
        action_id: String,

        /// allow or deny
        decision: String,

        #[arg(long)]
        reasoning: Option<String>,
    },

    /// List actions waiting for operator approval
    Pending {
        #[arg(long, default_value = "20")]
        limit: u32,

        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Block until a pending action is approved, denied or times out
    Wait { action_id: String },

    /// Send a single liveness report
    Heartbeat {
        /// online, busy or error
        #[arg(long, default_value = "online")]
        status: String,

        /// Task currently being worked on
        #[arg(long)]
        task: Option<String>,
    },
}
