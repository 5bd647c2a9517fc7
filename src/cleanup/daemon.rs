//! PR cleanup daemon: a fixed-interval control loop that discovers
//! problematic pull requests, dispatches bounded concurrent cleanups, and
//! merges green PRs. Admission is keyed by PR number so an overlapping
//! timer fire can never double-process the same PR.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::GitConfig;
use crate::error::Result;
use crate::events::{Channel, EventBus};
use crate::git::GitRunner;
use crate::host::{HostClient, MergeableState, PullRequest};
use crate::notification::{EventType, Notifier, WardenEvent};
use crate::workspace::{ReaperConfig, pid_is_alive, worktree_skip_reason};

use super::conflict::{ConflictResolver, EscalationReason, ResolutionPathway};
use super::types::{ActiveCleanup, CleanupConfig, DaemonStats, IssueKind, PrIssue, RunWindow};

/// Backoff before the single mergeability re-read in `attempt_auto_merge`.
const UNKNOWN_MERGEABLE_RETRY_MS: u64 = 2_000;

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PrIssue>,
    queued: HashSet<u64>,
}

pub struct CleanupDaemon {
    host: Arc<dyn HostClient>,
    resolver: ConflictResolver,
    git: GitRunner,
    git_config: GitConfig,
    config: CleanupConfig,
    reaper_config: ReaperConfig,
    stats: Arc<DaemonStats>,
    notifier: Arc<Notifier>,
    bus: EventBus,
    queue: Mutex<QueueState>,
    active: DashMap<u64, ActiveCleanup>,
    permits: Arc<Semaphore>,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    last_run: Mutex<Option<RunWindow>>,
}

impl CleanupDaemon {
    pub fn new(
        host: Arc<dyn HostClient>,
        resolver: ConflictResolver,
        git: GitRunner,
        git_config: GitConfig,
        config: CleanupConfig,
        reaper_config: ReaperConfig,
        notifier: Arc<Notifier>,
        bus: EventBus,
    ) -> Arc<Self> {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_cleanups));
        Arc::new(Self {
            host,
            resolver,
            git,
            git_config,
            config,
            reaper_config,
            stats: Arc::new(DaemonStats::default()),
            notifier,
            bus,
            queue: Mutex::new(QueueState::default()),
            active: DashMap::new(),
            permits,
            tasks: AsyncMutex::new(Vec::new()),
            last_run: Mutex::new(None),
        })
    }

    pub fn stats(&self) -> Arc<DaemonStats> {
        Arc::clone(&self.stats)
    }

    pub fn last_run(&self) -> Option<RunWindow> {
        self.last_run.lock().clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Fixed-interval loop. Runs until cancelled by the caller.
    pub async fn run(self: Arc<Self>) {
        self.prune_scratch_worktrees().await;
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.interval_ms));
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One discovery/dispatch cycle followed by waiting for every
    /// dispatched cleanup to finish. Used by `run --once` and tests.
    pub async fn run_once(self: &Arc<Self>) {
        self.prune_scratch_worktrees().await;
        self.run_cycle().await;
        self.wait_idle().await;
    }

    /// One cycle of the control loop. The run window is recorded even
    /// when the cycle errors.
    pub async fn run_cycle(self: &Arc<Self>) {
        let started = Utc::now();
        if let Err(e) = self.cycle_inner().await {
            self.stats.inc_errors();
            error!(error = %e, "Cleanup cycle failed");
            self.notifier
                .notify(
                    &WardenEvent::new(EventType::DaemonError)
                        .with_message(format!("cleanup cycle failed: {e}")),
                )
                .await;
        }
        *self.last_run.lock() = Some(RunWindow {
            started,
            finished: Utc::now(),
        });

        let snapshot = self.stats.snapshot();
        info!(
            processed = snapshot.prs_processed,
            conflicts_resolved = snapshot.conflicts_resolved,
            ci_retriggers = snapshot.ci_retriggers,
            auto_merges = snapshot.auto_merges,
            escalations = snapshot.escalations,
            errors = snapshot.errors,
            "Cleanup cycle complete"
        );
        self.bus.publish(vec![Channel::Stats]);
    }

    async fn cycle_inner(self: &Arc<Self>) -> Result<()> {
        let open_prs = self.host.list_open_prs().await?;
        let issues = classify_issues(&open_prs, &self.config.exclude_labels);
        debug!(open = open_prs.len(), problematic = issues.len(), "Scanned open PRs");

        self.enqueue_new(issues);
        self.dispatch_queue().await;
        self.merge_green_prs(&open_prs).await;
        Ok(())
    }

    /// Admit only PRs that are neither queued nor actively being cleaned.
    fn enqueue_new(&self, issues: Vec<PrIssue>) {
        let mut state = self.queue.lock();
        for issue in issues {
            let number = issue.pr.number;
            if state.queued.contains(&number) || self.active.contains_key(&number) {
                continue;
            }
            state.queued.insert(number);
            state.queue.push_back(issue);
        }
    }

    /// Drain the queue while capacity remains, dispatching each issue as
    /// independent non-awaited work.
    async fn dispatch_queue(self: &Arc<Self>) {
        let mut handles = self.tasks.lock().await;
        handles.retain(|h| !h.is_finished());

        loop {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            let issue = {
                let mut state = self.queue.lock();
                match state.queue.pop_front() {
                    Some(issue) => {
                        state.queued.remove(&issue.pr.number);
                        issue
                    }
                    None => break,
                }
            };
            // The active entry goes in before the spawn so a concurrent
            // cycle cannot re-admit this PR.
            self.active.insert(
                issue.pr.number,
                ActiveCleanup {
                    pr_number: issue.pr.number,
                    kind: issue.kind,
                    started_at: Utc::now(),
                },
            );
            let daemon = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                daemon.process_pr(issue).await;
                drop(permit);
            }));
        }
    }

    /// Await every dispatched cleanup.
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().await);
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Cleanup task panicked");
            }
        }
    }

    /// Per-PR processing. All errors are caught and counted here; the
    /// active entry is always removed.
    async fn process_pr(self: Arc<Self>, issue: PrIssue) {
        let number = issue.pr.number;
        self.stats.inc_prs_processed();
        info!(pr = number, kind = issue.kind.as_str(), "Processing PR");

        let attempted = match issue.kind {
            IssueKind::Conflict => self.handle_conflict(&issue.pr).await,
            IssueKind::CiFailure => self.handle_ci_failure(&issue.pr).await,
        };
        match attempted {
            Ok(true) if self.config.auto_merge => self.attempt_auto_merge(number).await,
            Ok(_) => {}
            Err(e) => {
                self.stats.inc_errors();
                error!(pr = number, error = %e, "Cleanup failed");
            }
        }

        self.active.remove(&number);
    }

    /// Returns whether a follow-up auto-merge attempt makes sense.
    async fn handle_conflict(&self, pr: &PullRequest) -> Result<bool> {
        let resolution = self.resolver.resolve(pr).await?;
        if let Some(reason) = &resolution.escalation {
            self.escalate(pr, reason).await;
            return Ok(false);
        }
        if resolution.pathway == Some(ResolutionPathway::DryRun) {
            return Ok(false);
        }
        if resolution.resolved {
            self.stats.inc_conflicts_resolved();
            self.bus.publish(vec![Channel::Prs]);
            self.notifier
                .notify(
                    &WardenEvent::new(EventType::ConflictResolved)
                        .with_pr(pr.number)
                        .with_message(pr.title.clone())
                        .with_context(
                            "pathway",
                            resolution
                                .pathway
                                .map(|p| p.as_str())
                                .unwrap_or("unknown"),
                        ),
                )
                .await;
        }
        Ok(resolution.resolved)
    }

    async fn handle_ci_failure(&self, pr: &PullRequest) -> Result<bool> {
        if self.fix_ci(pr).await? {
            self.stats.inc_ci_retriggers();
            self.notifier
                .notify(
                    &WardenEvent::new(EventType::CiRetrigger)
                        .with_pr(pr.number)
                        .with_message(pr.title.clone()),
                )
                .await;
        }
        // CI needs time to rerun; an immediate auto-merge would just see
        // the old failing checks.
        Ok(false)
    }

    /// Push an empty commit to the PR's head branch to re-trigger CI.
    async fn fix_ci(&self, pr: &PullRequest) -> Result<bool> {
        if self.config.dry_run {
            info!(pr = pr.number, "Dry run: would push empty commit to retrigger CI");
            return Ok(false);
        }
        if self.git.branch_checked_out(&pr.head_ref).await? {
            warn!(
                pr = pr.number,
                branch = %pr.head_ref,
                "Branch already checked out in another worktree, skipping CI retrigger"
            );
            return Ok(false);
        }

        let remote = &self.git_config.remote;
        let path = self
            .git_config
            .scratch_dir
            .join(format!("ci-{}", pr.number));
        self.git.fetch(remote, &[&pr.head_ref]).await?;
        self.git
            .worktree_add(&path, &format!("{remote}/{}", pr.head_ref))
            .await?;

        let worktree = self.git.with_dir(&path);
        let result = async {
            worktree
                .checkout_branch(&pr.head_ref, &format!("{remote}/{}", pr.head_ref))
                .await?;
            worktree.commit_empty("Retrigger CI").await?;
            worktree.push(remote, &pr.head_ref).await
        }
        .await;

        if let Err(e) = self.git.worktree_remove(&path).await {
            warn!(pr = pr.number, error = %e, "Scratch worktree cleanup failed");
        }
        result.map(|()| true)
    }

    /// Squash-merge once the PR is mergeable and every check succeeded.
    /// One short-backoff retry covers the platform still computing
    /// mergeability. Failures are logged, not retried.
    async fn attempt_auto_merge(&self, number: u64) {
        let pr = match self.host.view_pr(number).await {
            Ok(pr) if pr.mergeable == MergeableState::Unknown => {
                tokio::time::sleep(Duration::from_millis(UNKNOWN_MERGEABLE_RETRY_MS)).await;
                match self.host.view_pr(number).await {
                    Ok(pr) => pr,
                    Err(e) => {
                        warn!(pr = number, error = %e, "Auto-merge recheck failed");
                        return;
                    }
                }
            }
            Ok(pr) => pr,
            Err(e) => {
                warn!(pr = number, error = %e, "Auto-merge lookup failed");
                return;
            }
        };

        if pr.mergeable != MergeableState::Mergeable {
            debug!(pr = number, state = ?pr.mergeable, "Not mergeable, skipping auto-merge");
            return;
        }
        if pr.has_failing_check() || pr.has_pending_check() {
            debug!(pr = number, "Checks not fully green, skipping auto-merge");
            return;
        }
        if self.config.dry_run {
            info!(pr = number, "Dry run: would squash-merge");
            return;
        }

        match self.host.merge_pr(number, false).await {
            Ok(()) => {
                self.stats.inc_auto_merges();
                info!(pr = number, "Auto-merged");
                self.bus.publish(vec![Channel::Prs]);
                self.notifier
                    .notify(
                        &WardenEvent::new(EventType::AutoMerge)
                            .with_pr(number)
                            .with_message(pr.title.clone()),
                    )
                    .await;
            }
            Err(e) => warn!(pr = number, error = %e, "Auto-merge failed"),
        }
    }

    /// Separate pass over all open PRs: merge green ones outright, queue
    /// an auto-merge request for PRs still waiting on checks.
    async fn merge_green_prs(&self, open_prs: &[PullRequest]) {
        if !self.config.auto_merge {
            return;
        }
        for pr in open_prs {
            if pr.auto_merge_requested || self.is_excluded(pr) {
                continue;
            }
            if pr.mergeable != MergeableState::Mergeable || pr.has_failing_check() {
                continue;
            }
            if self.config.dry_run {
                info!(pr = pr.number, "Dry run: would merge green PR");
                continue;
            }

            if pr.has_pending_check() {
                match self.host.merge_pr(pr.number, true).await {
                    Ok(()) => info!(pr = pr.number, "Queued auto-merge request"),
                    Err(e) => warn!(pr = pr.number, error = %e, "Auto-merge request failed"),
                }
                continue;
            }

            match self.host.merge_pr(pr.number, false).await {
                Ok(()) => {
                    self.stats.inc_auto_merges();
                    info!(pr = pr.number, "Merged green PR");
                    self.bus.publish(vec![Channel::Prs]);
                }
                Err(e) => {
                    warn!(pr = pr.number, error = %e, "Immediate merge failed, requesting auto-merge");
                    if let Err(e) = self.host.merge_pr(pr.number, true).await {
                        warn!(pr = pr.number, error = %e, "Auto-merge request failed");
                    }
                }
            }
        }
    }

    async fn escalate(&self, pr: &PullRequest, reason: &EscalationReason) {
        self.stats.inc_escalations();
        warn!(pr = pr.number, reason = reason.as_str(), "Escalating PR to a human");

        let mut event = WardenEvent::new(EventType::Escalation)
            .with_pr(pr.number)
            .with_message(pr.title.clone())
            .with_context("reason", reason.as_str());
        match reason {
            EscalationReason::LargeConflict {
                estimated_lines,
                max_conflict_size,
            } => {
                event = event
                    .with_context("estimated_lines", estimated_lines.to_string())
                    .with_context("max_conflict_size", max_conflict_size.to_string());
            }
            EscalationReason::ConflictStillPresent {
                last_mergeable,
                pathway,
            } => {
                event = event.with_context("last_mergeable", format!("{last_mergeable:?}"));
                if let Some(pathway) = pathway {
                    event = event.with_context("pathway", pathway.as_str());
                }
            }
        }
        self.notifier.notify_escalation(&event).await;
    }

    fn is_excluded(&self, pr: &PullRequest) -> bool {
        self.config
            .exclude_labels
            .iter()
            .any(|label| pr.has_label(label))
    }

    /// Startup janitor: leftover scratch worktrees from a previous run
    /// are removed before the first cycle. Honors the same guards as the
    /// reaper sweep: recently-modified directories and directories with a
    /// live PID marker are left alone.
    async fn prune_scratch_worktrees(&self) {
        let dir = &self.git_config.scratch_dir;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        let now = Utc::now();
        let threshold = chrono::Duration::hours(self.reaper_config.orphan_threshold_hours);
        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match worktree_skip_reason(&path, now, threshold, pid_is_alive).await {
                Ok(Some(reason)) => {
                    debug!(path = %path.display(), reason, "Keeping scratch worktree");
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot assess scratch worktree");
                    continue;
                }
            }
            match self.git.worktree_remove(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Stale worktree removal failed"),
            }
        }
        if removed > 0 {
            info!(removed, "Pruned leftover scratch worktrees");
            self.git.worktree_prune().await.ok();
        }
    }
}

/// Classify open PRs into cleanup issues, excluded labels dropped,
/// conflicts sorted ahead of CI failures.
pub fn classify_issues(open_prs: &[PullRequest], exclude_labels: &[String]) -> Vec<PrIssue> {
    let mut issues: Vec<PrIssue> = open_prs
        .iter()
        .filter(|pr| !exclude_labels.iter().any(|label| pr.has_label(label)))
        .filter_map(|pr| {
            if pr.mergeable == MergeableState::Conflicting {
                Some(PrIssue {
                    pr: pr.clone(),
                    kind: IssueKind::Conflict,
                })
            } else if pr.has_failing_check() {
                Some(PrIssue {
                    pr: pr.clone(),
                    kind: IssueKind::CiFailure,
                })
            } else {
                None
            }
        })
        .collect();
    issues.sort_by_key(|issue| issue.kind.priority());
    issues
}
