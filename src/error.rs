use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Git error: {0}")]
    Git(String),

    #[error("Worktree error: {message}")]
    Worktree { message: String, path: PathBuf },

    #[error("Hosting platform error: {0}")]
    Host(String),

    #[error("Unknown hook event: {0}")]
    UnknownHookEvent(String),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Workspace {id} is already leased by {owner}")]
    WorkspaceLeased { id: String, owner: String },

    #[error("Workspace {0} has no active lease")]
    LeaseMissing(String),

    #[error("Command failed: {command}: {detail}")]
    Command { command: String, detail: String },

    #[error("Agent delegate failed: {0}")]
    AgentDelegate(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("Project not initialized. Run 'repo-warden init' first.")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl WardenError {
    /// Rate-limit responses from the hosting platform are degraded, not
    /// propagated: a rate-limited listing call yields an empty PR set and
    /// the next cycle retries.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::Host(msg) | Self::Command { detail: msg, .. } => {
                let lower = msg.to_lowercase();
                lower.contains("rate limit") || lower.contains("429")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
