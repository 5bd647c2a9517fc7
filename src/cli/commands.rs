use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "repo-warden")]
#[command(author, version, about = "Repository control plane for autonomous coding agents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize repo-warden in the current repository
    Init,

    /// Run the PR cleanup daemon
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Log intended actions without mutating anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one reaper sweep (expired leases + orphaned worktrees)
    Sweep {
        /// Report what would be cleaned without deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a task's complexity and show the routed executor/model
    Classify {
        /// Task title
        title: String,

        /// Task description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Explicit size label (xs/s/m/l/xl/xxl)
        #[arg(short, long)]
        size: Option<String>,

        /// Story points
        #[arg(short, long)]
        points: Option<u32>,

        /// Executor type to route for
        #[arg(short, long, default_value = "claude")]
        executor: String,
    },

    /// Manage agent lifecycle hooks
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Manage the shared workspace lease registry
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
}

#[derive(Subcommand)]
pub enum HooksAction {
    /// List registered hooks by event
    List,

    /// Fire one event's hooks and report their outcomes
    Run {
        /// Lifecycle event name (kebab-case)
        event: String,

        /// SDK identity for hook filtering
        #[arg(long)]
        sdk: Option<String>,

        /// Hooks file to load before running
        #[arg(long)]
        hooks_file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceAction {
    /// List workspaces and their lease state
    List {
        /// Also show the audit log tail
        #[arg(long)]
        audit: bool,
    },

    /// Claim a workspace lease
    Claim {
        /// Workspace id
        id: String,

        /// Lease owner
        #[arg(long)]
        owner: String,

        /// Lease TTL in minutes (default: registry default)
        #[arg(long)]
        ttl: Option<i64>,

        /// Free-form note recorded with the lease
        #[arg(long)]
        note: Option<String>,
    },

    /// Extend an existing lease
    Renew {
        /// Workspace id
        id: String,

        /// Reassign the lease to this owner
        #[arg(long)]
        owner: Option<String>,

        /// Lease TTL in minutes (default: registry default)
        #[arg(long)]
        ttl: Option<i64>,
    },

    /// Release a lease
    Release {
        /// Workspace id
        id: String,
    },
}
