//! CLI definitions for Crontaber.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Crontaber CLI.
#[derive(Parser)]
#[command(name = "crontaber")]
#[command(about = "Recurring shell command scheduler")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: <config dir>/crontaber/config.toml)
    #[arg(short, long, global = true, env = "CRONTABER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler and its IPC bridge in the foreground (default)
    Run {
        /// Bridge host (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Bridge port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Manage jobs of a running scheduler
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Schedule expression helpers
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum JobAction {
    /// List all jobs with their status
    List {
        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show one job and its execution history
    Get {
        /// Job ID
        job_id: String,
    },

    /// Create a job
    Create {
        /// Job name
        #[arg(long)]
        name: String,

        /// Shell command line
        #[arg(long)]
        command: String,

        /// Cron expression or nickname (e.g. "*/5 * * * *", "@daily")
        #[arg(long)]
        frequency: String,

        /// Working directory of the command
        #[arg(long)]
        work_dir: Option<String>,

        /// IANA timezone (default: local time)
        #[arg(long)]
        timezone: Option<String>,

        /// Arm the job right away
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        auto_start: bool,

        /// Stop after this many runs
        #[arg(long)]
        max_executions: Option<u32>,
    },

    /// Update fields of a job
    Update {
        /// Job ID
        job_id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        command: Option<String>,

        #[arg(long)]
        frequency: Option<String>,

        /// Working directory; pass an empty string to clear it
        #[arg(long)]
        work_dir: Option<String>,

        /// IANA timezone; pass an empty string to use local time
        #[arg(long)]
        timezone: Option<String>,

        #[arg(long, action = ArgAction::Set)]
        auto_start: Option<bool>,

        #[arg(long)]
        max_executions: Option<u32>,
    },

    /// Delete a job
    Delete {
        /// Job ID
        job_id: String,
    },

    /// Start or resume a job
    Run {
        /// Job ID
        job_id: String,
    },

    /// Pause a job
    Pause {
        /// Job ID
        job_id: String,
    },

    /// Stop a job and clear its auto-start flag
    Stop {
        /// Job ID
        job_id: String,
    },
}

#[derive(Subcommand)]
pub(crate) enum ScheduleAction {
    /// Check an expression and preview its next fire times
    Validate {
        /// Cron expression or nickname
        expression: String,

        /// IANA timezone (default: local time)
        #[arg(long)]
        timezone: Option<String>,
    },
}
