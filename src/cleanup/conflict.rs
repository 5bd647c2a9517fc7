//! Multi-stage conflict-resolution state machine.
//!
//! Size gate → dry-run short-circuit → remote-agent delegation → local
//! deterministic fallback → mergeability verification. Local git work
//! happens in disposable scratch worktrees that are always removed, and
//! only machine-generated file classes are ever auto-resolved.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::{AgentDelegate, ConflictRequest};
use crate::config::GitConfig;
use crate::error::{Result, WardenError};
use crate::git::{GitRunner, MergeOutcome};
use crate::host::{HostClient, MergeableState, PullRequest};

use super::types::CleanupConfig;

/// Estimated conflicting lines per file when only the trial merge's
/// conflicted-file count is available.
pub const LINES_PER_CONFLICTED_FILE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPathway {
    RemoteAgent,
    LocalFallback,
    DryRun,
}

impl ResolutionPathway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteAgent => "remote_agent",
            Self::LocalFallback => "local_fallback",
            Self::DryRun => "dry_run",
        }
    }
}

#[derive(Debug, Clone)]
pub enum EscalationReason {
    LargeConflict {
        estimated_lines: u32,
        max_conflict_size: u32,
    },
    ConflictStillPresent {
        last_mergeable: MergeableState,
        pathway: Option<ResolutionPathway>,
    },
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LargeConflict { .. } => "large_conflict",
            Self::ConflictStillPresent { .. } => "conflict_still_present_after_resolution",
        }
    }
}

/// Terminal outcome of one resolution attempt. `resolved` and
/// `escalation` are mutually exclusive.
#[derive(Debug, Clone)]
pub struct ConflictResolution {
    pub resolved: bool,
    pub pathway: Option<ResolutionPathway>,
    pub last_mergeable: MergeableState,
    pub escalation: Option<EscalationReason>,
}

/// Which side wins for an auto-resolvable conflicted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictClass {
    /// Dependency lockfiles: take the incoming/base side.
    TakeTheirs,
    /// Coverage/result artifacts and changelogs: keep the head side.
    TakeOurs,
}

const LOCKFILE_NAMES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "uv.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
];

fn classify_conflict_file(path: &str) -> Option<ConflictClass> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if LOCKFILE_NAMES.contains(&file_name) {
        return Some(ConflictClass::TakeTheirs);
    }
    let lowered = path.to_lowercase();
    if lowered.contains("coverage")
        || lowered.contains("test-results")
        || lowered.contains("test_results")
        || lowered.ends_with(".lcov")
        || file_name.eq_ignore_ascii_case("CHANGELOG.md")
    {
        return Some(ConflictClass::TakeOurs);
    }
    None
}

pub struct ConflictResolver {
    git: GitRunner,
    host: Arc<dyn HostClient>,
    delegate: Option<Arc<dyn AgentDelegate>>,
    config: CleanupConfig,
    git_config: GitConfig,
}

impl ConflictResolver {
    pub fn new(
        git: GitRunner,
        host: Arc<dyn HostClient>,
        delegate: Option<Arc<dyn AgentDelegate>>,
        config: CleanupConfig,
        git_config: GitConfig,
    ) -> Self {
        Self {
            git,
            host,
            delegate,
            config,
            git_config,
        }
    }

    /// Drive a conflicting PR to a terminal outcome: resolved, or an
    /// escalation the daemon hands to a human.
    pub async fn resolve(&self, pr: &PullRequest) -> Result<ConflictResolution> {
        // Size gate. An oversized conflict escalates before any git
        // mutation happens.
        let estimated = self.estimate_conflict_size(pr).await;
        if estimated > self.config.max_conflict_size {
            warn!(
                pr = pr.number,
                estimated, max = self.config.max_conflict_size,
                "Conflict too large for automated resolution"
            );
            return Ok(ConflictResolution {
                resolved: false,
                pathway: None,
                last_mergeable: pr.mergeable,
                escalation: Some(EscalationReason::LargeConflict {
                    estimated_lines: estimated,
                    max_conflict_size: self.config.max_conflict_size,
                }),
            });
        }

        if self.config.dry_run {
            info!(pr = pr.number, "Dry run: would resolve conflicts");
            return Ok(ConflictResolution {
                resolved: true,
                pathway: Some(ResolutionPathway::DryRun),
                last_mergeable: pr.mergeable,
                escalation: None,
            });
        }

        // Remote agent first; deterministic local fallback when it is
        // unavailable or fails.
        let pathway = match self.delegate_resolution(pr).await {
            Ok(()) => ResolutionPathway::RemoteAgent,
            Err(e) => {
                warn!(pr = pr.number, error = %e, "Remote agent unavailable, running local fallback");
                match self.local_fallback(pr).await {
                    Ok(()) => ResolutionPathway::LocalFallback,
                    Err(e) => {
                        warn!(pr = pr.number, error = %e, "Local fallback failed");
                        return Ok(ConflictResolution {
                            resolved: false,
                            pathway: Some(ResolutionPathway::LocalFallback),
                            last_mergeable: pr.mergeable,
                            escalation: Some(EscalationReason::ConflictStillPresent {
                                last_mergeable: pr.mergeable,
                                pathway: Some(ResolutionPathway::LocalFallback),
                            }),
                        });
                    }
                }
            }
        };

        // Verification: poll the platform's computed mergeability.
        let mut last_mergeable = self.poll_mergeable(pr.number).await;

        // A remote-agent resolution that did not settle gets exactly one
        // local attempt before giving up.
        let mut final_pathway = pathway;
        if pathway == ResolutionPathway::RemoteAgent && last_mergeable != MergeableState::Mergeable
        {
            info!(pr = pr.number, "Remote resolution unsettled, trying one local fallback");
            if self.local_fallback(pr).await.is_ok() {
                final_pathway = ResolutionPathway::LocalFallback;
                last_mergeable = self.poll_mergeable(pr.number).await;
            }
        }

        if last_mergeable == MergeableState::Mergeable {
            info!(pr = pr.number, pathway = final_pathway.as_str(), "Conflicts resolved");
            return Ok(ConflictResolution {
                resolved: true,
                pathway: Some(final_pathway),
                last_mergeable,
                escalation: None,
            });
        }

        Ok(ConflictResolution {
            resolved: false,
            pathway: Some(final_pathway),
            last_mergeable,
            escalation: Some(EscalationReason::ConflictStillPresent {
                last_mergeable,
                pathway: Some(final_pathway),
            }),
        })
    }

    /// Changed-lines heuristic from the platform's file list, falling
    /// back to a disposable trial merge when the listing is unavailable.
    pub async fn estimate_conflict_size(&self, pr: &PullRequest) -> u32 {
        match self.host.pr_files(pr.number).await {
            Ok(files) => files.iter().map(|f| f.changed_lines()).sum(),
            Err(e) => {
                debug!(pr = pr.number, error = %e, "File listing unavailable, probing with trial merge");
                match self.trial_merge_estimate(pr).await {
                    Ok(estimate) => estimate,
                    Err(e) => {
                        warn!(pr = pr.number, error = %e, "Trial merge estimate failed, assuming zero");
                        0
                    }
                }
            }
        }
    }

    /// Probe conflict size with a `--no-commit --no-ff` merge in a
    /// scratch worktree: count conflicted files, abort, remove the
    /// worktree.
    pub async fn trial_merge_estimate(&self, pr: &PullRequest) -> Result<u32> {
        let path = self.scratch_path("trial", pr.number);
        let remote = &self.git_config.remote;
        self.git
            .fetch(remote, &[&pr.base_ref, &pr.head_ref])
            .await?;
        self.git
            .worktree_add(&path, &format!("{remote}/{}", pr.head_ref))
            .await?;

        let worktree = self.git.with_dir(&path);
        let result = async {
            match worktree
                .merge_no_commit(&format!("{remote}/{}", pr.base_ref))
                .await?
            {
                MergeOutcome::Clean => {
                    worktree.merge_abort().await.ok();
                    Ok(0)
                }
                MergeOutcome::Conflicted(files) => {
                    worktree.merge_abort().await?;
                    Ok(files.len() as u32 * LINES_PER_CONFLICTED_FILE)
                }
            }
        }
        .await;

        self.git.worktree_remove(&path).await.ok();
        result
    }

    async fn delegate_resolution(&self, pr: &PullRequest) -> Result<()> {
        let Some(delegate) = &self.delegate else {
            return Err(WardenError::AgentDelegate(
                "no agent delegate configured".to_string(),
            ));
        };
        delegate
            .resolve_conflicts(&ConflictRequest {
                pr_number: pr.number,
                branch: pr.head_ref.clone(),
                strategy: self.config.conflict_strategy.clone(),
                wait_for_ci: true,
            })
            .await
    }

    /// Deterministic fallback: merge base into head in a scratch
    /// worktree, auto-resolving only machine-generated file classes.
    pub async fn local_fallback(&self, pr: &PullRequest) -> Result<()> {
        // Advisory claim guard: never race a branch already checked out.
        if self.git.branch_checked_out(&pr.head_ref).await? {
            warn!(
                pr = pr.number,
                branch = %pr.head_ref,
                "Branch already checked out in another worktree, skipping local fallback"
            );
            return Err(WardenError::Worktree {
                message: format!("branch {} already checked out", pr.head_ref),
                path: PathBuf::new(),
            });
        }

        let path = self.scratch_path("pr", pr.number);
        let remote = &self.git_config.remote;
        self.git
            .fetch(remote, &[&pr.base_ref, &pr.head_ref])
            .await?;
        self.git
            .worktree_add(&path, &format!("{remote}/{}", pr.head_ref))
            .await?;

        let worktree = self.git.with_dir(&path);
        let result = self.merge_base_into_head(&worktree, pr).await;

        // The scratch worktree goes away on every path.
        if let Err(e) = self.git.worktree_remove(&path).await {
            warn!(pr = pr.number, error = %e, "Scratch worktree cleanup failed");
        }
        result
    }

    async fn merge_base_into_head(&self, worktree: &GitRunner, pr: &PullRequest) -> Result<()> {
        let remote = &self.git_config.remote;
        worktree
            .checkout_branch(&pr.head_ref, &format!("{remote}/{}", pr.head_ref))
            .await?;

        match worktree
            .merge_no_commit(&format!("{remote}/{}", pr.base_ref))
            .await?
        {
            MergeOutcome::Clean => {
                worktree
                    .commit(&format!("Merge {} into {}", pr.base_ref, pr.head_ref))
                    .await?;
            }
            MergeOutcome::Conflicted(files) => {
                let mut theirs = Vec::new();
                let mut ours = Vec::new();
                for file in &files {
                    match classify_conflict_file(file) {
                        Some(ConflictClass::TakeTheirs) => theirs.push(file.clone()),
                        Some(ConflictClass::TakeOurs) => ours.push(file.clone()),
                        None => {
                            // A hand-written file is conflicting; this is
                            // not ours to resolve.
                            warn!(pr = pr.number, file = %file, "Non-generated conflict, aborting merge");
                            worktree.merge_abort().await.ok();
                            return Err(WardenError::Git(format!(
                                "unresolvable conflict in {file}"
                            )));
                        }
                    }
                }

                debug!(
                    pr = pr.number,
                    theirs = theirs.len(),
                    ours = ours.len(),
                    "Auto-resolving generated-file conflicts"
                );
                worktree.checkout_theirs(&theirs).await?;
                worktree.checkout_ours(&ours).await?;
                worktree.add(&files).await?;
                worktree
                    .commit(&format!(
                        "Merge {} into {} (auto-resolved generated files)",
                        pr.base_ref, pr.head_ref
                    ))
                    .await?;
            }
        }

        worktree.push(remote, &pr.head_ref).await?;
        Ok(())
    }

    /// Poll computed mergeability up to the configured attempts, stopping
    /// early on `MERGEABLE`.
    async fn poll_mergeable(&self, number: u64) -> MergeableState {
        let mut last = MergeableState::Unknown;
        for attempt in 0..self.config.post_conflict_recheck_attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(
                    self.config.post_conflict_recheck_delay_ms,
                ))
                .await;
            }
            match self.host.view_pr(number).await {
                Ok(pr) => {
                    last = pr.mergeable;
                    if last == MergeableState::Mergeable {
                        return last;
                    }
                }
                Err(e) => {
                    warn!(pr = number, error = %e, "Mergeability recheck failed");
                }
            }
        }
        last
    }

    fn scratch_path(&self, prefix: &str, number: u64) -> PathBuf {
        self.git_config
            .scratch_dir
            .join(format!("{prefix}-{number}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockfiles_take_theirs() {
        assert_eq!(
            classify_conflict_file("Cargo.lock"),
            Some(ConflictClass::TakeTheirs)
        );
        assert_eq!(
            classify_conflict_file("web/package-lock.json"),
            Some(ConflictClass::TakeTheirs)
        );
    }

    #[test]
    fn artifacts_and_changelogs_take_ours() {
        assert_eq!(
            classify_conflict_file("coverage/lcov.info"),
            Some(ConflictClass::TakeOurs)
        );
        assert_eq!(
            classify_conflict_file("reports/test-results.xml"),
            Some(ConflictClass::TakeOurs)
        );
        assert_eq!(
            classify_conflict_file("CHANGELOG.md"),
            Some(ConflictClass::TakeOurs)
        );
    }

    #[test]
    fn source_files_are_never_auto_resolved() {
        assert_eq!(classify_conflict_file("src/main.rs"), None);
        assert_eq!(classify_conflict_file("docs/locks.md"), None);
    }
}
