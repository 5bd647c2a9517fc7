//! Periodic sweep reclaiming expired leases and deleting orphaned
//! worktree directories.
//!
//! The two phases are independent: a lease-phase failure never prevents
//! the worktree phase from running, and vice versa.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::{Channel, EventBus};

use super::registry::WorkspaceRegistry;

pub const PID_MARKER_FILE: &str = ".agent.pid";

/// Reaper section of the warden config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Directories whose children are worktree candidates.
    pub search_paths: Vec<PathBuf>,
    /// Candidates modified within this window are left alone.
    pub orphan_threshold_hours: i64,
    pub dry_run: bool,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".warden/worktrees")],
            orphan_threshold_hours: 24,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseSweep {
    pub expired: u32,
    pub cleaned: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorktreeSweep {
    pub scanned: u32,
    pub cleaned: u32,
    pub skipped: u32,
    pub errors: u32,
    pub skipped_reasons: HashMap<String, u32>,
    pub cleaned_paths: Vec<PathBuf>,
}

/// Produced fresh per sweep; purely additive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    pub leases: LeaseSweep,
    pub worktrees: WorktreeSweep,
}

pub struct Reaper {
    registry: Arc<WorkspaceRegistry>,
    config: ReaperConfig,
    pid_probe: fn(u32) -> bool,
    bus: Option<EventBus>,
}

impl Reaper {
    pub fn new(registry: Arc<WorkspaceRegistry>, config: ReaperConfig) -> Self {
        Self {
            registry,
            config,
            pid_probe: pid_is_alive,
            bus: None,
        }
    }

    /// Substitute the PID liveness probe (deterministic tests).
    pub fn with_pid_probe(mut self, probe: fn(u32) -> bool) -> Self {
        self.pid_probe = probe;
        self
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepResult {
        let leases = self.sweep_leases(now).await;
        let worktrees = self.clean_orphaned_worktrees(now).await;

        let result = SweepResult { leases, worktrees };
        info!(
            leases_cleaned = result.leases.cleaned,
            worktrees_cleaned = result.worktrees.cleaned,
            worktrees_skipped = result.worktrees.skipped,
            dry_run = self.config.dry_run,
            "Reaper sweep finished"
        );
        if let Some(bus) = &self.bus {
            let mut channels = Vec::new();
            if result.leases.cleaned > 0 {
                channels.push(Channel::Workspaces);
            }
            if result.worktrees.cleaned > 0 {
                channels.push(Channel::Worktrees);
            }
            if !channels.is_empty() {
                bus.publish(channels);
            }
        }
        result
    }

    async fn sweep_leases(&self, now: DateTime<Utc>) -> LeaseSweep {
        let mut sweep = LeaseSweep::default();
        match self.registry.release_expired(now).await {
            Ok(released) => {
                sweep.expired = released.len() as u32;
                sweep.cleaned = released.len() as u32;
                for id in &released {
                    debug!(workspace = %id, "Reaped expired lease");
                }
            }
            Err(e) => {
                warn!(error = %e, "Lease expiry phase failed");
                sweep.errors += 1;
            }
        }
        sweep
    }

    /// Scan the configured search paths for stale worktree directories.
    pub async fn clean_orphaned_worktrees(&self, now: DateTime<Utc>) -> WorktreeSweep {
        let mut sweep = WorktreeSweep::default();
        let threshold = Duration::hours(self.config.orphan_threshold_hours);

        for search_path in &self.config.search_paths {
            let mut entries = match fs::read_dir(search_path).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %search_path.display(), error = %e, "Cannot scan search path");
                    sweep.errors += 1;
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %search_path.display(), error = %e, "Directory walk failed");
                        sweep.errors += 1;
                        break;
                    }
                };
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                sweep.scanned += 1;

                match self.assess_candidate(&path, now, threshold).await {
                    Ok(Some(reason)) => {
                        debug!(path = %path.display(), reason, "Skipping worktree");
                        sweep.skipped += 1;
                        *sweep.skipped_reasons.entry(reason.to_string()).or_default() += 1;
                    }
                    Ok(None) => {
                        if self.config.dry_run {
                            info!(path = %path.display(), "Would clean worktree (dry run)");
                        } else if let Err(e) = fs::remove_dir_all(&path).await {
                            warn!(path = %path.display(), error = %e, "Failed to remove worktree");
                            sweep.errors += 1;
                            continue;
                        } else {
                            info!(path = %path.display(), "Cleaned orphaned worktree");
                        }
                        sweep.cleaned += 1;
                        sweep.cleaned_paths.push(path);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot assess worktree");
                        sweep.errors += 1;
                    }
                }
            }
        }

        sweep
    }

    async fn assess_candidate(
        &self,
        path: &Path,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<Option<&'static str>> {
        worktree_skip_reason(path, now, threshold, self.pid_probe).await
    }
}

/// `Ok(Some(reason))` means leave the directory alone; `Ok(None)` means it
/// is fair game for deletion. Shared by the reaper sweep and the cleanup
/// daemon's startup prune so both honor the same guards.
pub async fn worktree_skip_reason(
    path: &Path,
    now: DateTime<Utc>,
    threshold: Duration,
    pid_probe: fn(u32) -> bool,
) -> Result<Option<&'static str>> {
    let metadata = fs::metadata(path).await?;
    if let Ok(modified) = metadata.modified() {
        let modified: DateTime<Utc> = modified.into();
        if now - modified < threshold {
            return Ok(Some("recently_modified"));
        }
    }

    let marker = path.join(PID_MARKER_FILE);
    if let Ok(content) = fs::read_to_string(&marker).await {
        // A stale or unparseable marker does not protect a worktree.
        if let Ok(pid) = content.trim().parse::<u32>()
            && pid_probe(pid)
        {
            return Ok(Some("active_process"));
        }
    }

    Ok(None)
}

pub fn pid_is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
    system.process(pid).is_some()
}

/// Human-readable sweep summary for logs and the CLI.
pub fn format_reaper_results(result: &SweepResult) -> String {
    let mut lines = vec![
        format!(
            "leases: {} expired, {} cleaned, {} errors",
            result.leases.expired, result.leases.cleaned, result.leases.errors
        ),
        format!(
            "worktrees: {} scanned, {} cleaned, {} skipped, {} errors",
            result.worktrees.scanned,
            result.worktrees.cleaned,
            result.worktrees.skipped,
            result.worktrees.errors
        ),
    ];

    let mut reasons: Vec<_> = result.worktrees.skipped_reasons.iter().collect();
    reasons.sort();
    for (reason, count) in reasons {
        lines.push(format!("  skipped {count} ({reason})"));
    }
    for path in &result.worktrees.cleaned_paths {
        lines.push(format!("  cleaned {}", path.display()));
    }
    lines.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReaperMetrics {
    pub leases_cleaned: u32,
    pub worktrees_cleaned: u32,
    pub total_errors: u32,
    /// Cleaned share of scanned worktrees, 0.0 when nothing was scanned.
    pub clean_ratio: f64,
}

pub fn calculate_reaper_metrics(result: &SweepResult) -> ReaperMetrics {
    let scanned = result.worktrees.scanned;
    ReaperMetrics {
        leases_cleaned: result.leases.cleaned,
        worktrees_cleaned: result.worktrees.cleaned,
        total_errors: result.leases.errors + result.worktrees.errors,
        clean_ratio: if scanned == 0 {
            0.0
        } else {
            f64::from(result.worktrees.cleaned) / f64::from(scanned)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_divide_safely() {
        let metrics = calculate_reaper_metrics(&SweepResult::default());
        assert_eq!(metrics.clean_ratio, 0.0);

        let result = SweepResult {
            worktrees: WorktreeSweep {
                scanned: 4,
                cleaned: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(calculate_reaper_metrics(&result).clean_ratio, 0.25);
    }

    #[test]
    fn format_lists_reasons_and_paths() {
        let mut result = SweepResult::default();
        result.worktrees.scanned = 3;
        result.worktrees.skipped = 2;
        result
            .worktrees
            .skipped_reasons
            .insert("recently_modified".into(), 2);
        result.worktrees.cleaned = 1;
        result.worktrees.cleaned_paths.push(PathBuf::from("/tmp/wt-1"));

        let text = format_reaper_results(&result);
        assert!(text.contains("3 scanned"));
        assert!(text.contains("skipped 2 (recently_modified)"));
        assert!(text.contains("cleaned /tmp/wt-1"));
    }
}
