use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::PullRequest;

/// Cleanup-daemon section of the warden config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub interval_ms: u64,
    pub max_concurrent_cleanups: usize,
    /// Strategy hint forwarded to the agent delegate.
    pub conflict_strategy: String,
    pub auto_merge: bool,
    pub dry_run: bool,
    /// PRs carrying any of these labels are never touched.
    pub exclude_labels: Vec<String>,
    /// Estimated conflicting lines beyond which resolution is escalated
    /// instead of attempted.
    pub max_conflict_size: u32,
    pub post_conflict_recheck_attempts: u32,
    pub post_conflict_recheck_delay_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
            max_concurrent_cleanups: 3,
            conflict_strategy: "safe-merge".to_string(),
            auto_merge: true,
            dry_run: false,
            exclude_labels: vec!["do-not-merge".to_string(), "wip".to_string()],
            max_conflict_size: 500,
            post_conflict_recheck_attempts: 3,
            post_conflict_recheck_delay_ms: 5_000,
        }
    }
}

/// Why a PR was admitted for cleanup. Conflicts outrank CI failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Conflict,
    CiFailure,
}

impl IssueKind {
    pub fn priority(&self) -> u8 {
        match self {
            Self::Conflict => 1,
            Self::CiFailure => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::CiFailure => "ci_failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrIssue {
    pub pr: PullRequest,
    pub kind: IssueKind,
}

/// Entry in the active-cleanups map while a PR is being worked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCleanup {
    pub pr_number: u64,
    pub kind: IssueKind,
    pub started_at: DateTime<Utc>,
}

/// Cumulative daemon counters, shared across spawned cleanup tasks.
#[derive(Debug, Default)]
pub struct DaemonStats {
    prs_processed: AtomicU64,
    conflicts_resolved: AtomicU64,
    ci_retriggers: AtomicU64,
    auto_merges: AtomicU64,
    escalations: AtomicU64,
    errors: AtomicU64,
}

impl DaemonStats {
    pub fn inc_prs_processed(&self) {
        self.prs_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conflicts_resolved(&self) {
        self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ci_retriggers(&self) {
        self.ci_retriggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auto_merges(&self) {
        self.auto_merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalations(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            prs_processed: self.prs_processed.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            ci_retriggers: self.ci_retriggers.load(Ordering::Relaxed),
            auto_merges: self.auto_merges.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub prs_processed: u64,
    pub conflicts_resolved: u64,
    pub ci_retriggers: u64,
    pub auto_merges: u64,
    pub escalations: u64,
    pub errors: u64,
}

/// Start/finish window of the last cycle, recorded even when it errors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunWindow {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}
