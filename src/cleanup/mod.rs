mod conflict;
mod daemon;
mod types;

pub use conflict::{
    ConflictResolution, ConflictResolver, EscalationReason, ResolutionPathway,
    LINES_PER_CONFLICTED_FILE,
};
pub use daemon::{classify_issues, CleanupDaemon};
pub use types::{
    ActiveCleanup, CleanupConfig, DaemonStats, IssueKind, PrIssue, RunWindow, StatsSnapshot,
};
