//! Hosting-platform PR API via the `gh` CLI.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, WardenError};
use crate::exec::{CommandRequest, CommandRunner};

use super::types::{CheckState, MergeableState, PrFile, PullRequest, StatusCheck};

const PR_JSON_FIELDS: &str =
    "number,title,mergeable,labels,statusCheckRollup,headRefName,baseRefName,autoMergeRequest";

/// Injectable hosting-platform capability.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// All open PRs. A rate-limited listing degrades to an empty result.
    async fn list_open_prs(&self) -> Result<Vec<PullRequest>>;

    /// Live view of one PR (fresh mergeability and checks).
    async fn view_pr(&self, number: u64) -> Result<PullRequest>;

    /// Changed files with per-file line counts.
    async fn pr_files(&self, number: u64) -> Result<Vec<PrFile>>;

    /// Squash-merge with branch deletion. `auto=true` queues an
    /// auto-merge request instead of merging immediately.
    async fn merge_pr(&self, number: u64, auto: bool) -> Result<()>;
}

pub struct GhClient {
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
}

impl GhClient {
    pub fn new(runner: Arc<dyn CommandRunner>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            working_dir: working_dir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<crate::exec::CommandOutput> {
        let request = CommandRequest::new("gh")
            .with_args(args.iter().map(|s| s.to_string()))
            .with_cwd(&self.working_dir);
        debug!(args = ?args, "Running gh command");
        self.runner.run(request).await
    }
}

#[async_trait]
impl HostClient for GhClient {
    async fn list_open_prs(&self) -> Result<Vec<PullRequest>> {
        let output = self
            .run(&["pr", "list", "--state", "open", "--json", PR_JSON_FIELDS])
            .await?;

        if !output.success() {
            if is_rate_limited(&output.stderr) {
                warn!("PR listing rate-limited, degrading to empty result");
                return Ok(Vec::new());
            }
            return Err(WardenError::Host(output.stderr.trim().to_string()));
        }

        let wire: Vec<WirePr> = serde_json::from_str(&output.stdout)?;
        Ok(wire.into_iter().map(Into::into).collect())
    }

    async fn view_pr(&self, number: u64) -> Result<PullRequest> {
        let number_arg = number.to_string();
        let output = self
            .run(&["pr", "view", &number_arg, "--json", PR_JSON_FIELDS])
            .await?;
        if !output.success() {
            return Err(WardenError::Host(output.stderr.trim().to_string()));
        }
        let wire: WirePr = serde_json::from_str(&output.stdout)?;
        Ok(wire.into())
    }

    async fn pr_files(&self, number: u64) -> Result<Vec<PrFile>> {
        let number_arg = number.to_string();
        let output = self
            .run(&["pr", "view", &number_arg, "--json", "files"])
            .await?;
        if !output.success() {
            return Err(WardenError::Host(output.stderr.trim().to_string()));
        }
        let wire: WireFiles = serde_json::from_str(&output.stdout)?;
        Ok(wire
            .files
            .into_iter()
            .map(|f| PrFile {
                path: f.path,
                additions: f.additions,
                deletions: f.deletions,
            })
            .collect())
    }

    async fn merge_pr(&self, number: u64, auto: bool) -> Result<()> {
        let number_arg = number.to_string();
        let mut args = vec!["pr", "merge", &number_arg, "--squash", "--delete-branch"];
        if auto {
            args.push("--auto");
        }
        let output = self.run(&args).await?;
        if !output.success() {
            return Err(WardenError::Host(output.stderr.trim().to_string()));
        }
        Ok(())
    }
}

fn is_rate_limited(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("rate limit") || stderr.contains("http 403")
}

// Wire shapes as `gh --json` emits them.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePr {
    number: u64,
    title: String,
    head_ref_name: String,
    base_ref_name: String,
    #[serde(default)]
    mergeable: MergeableState,
    #[serde(default)]
    labels: Vec<WireLabel>,
    #[serde(default)]
    status_check_rollup: Vec<WireCheck>,
    #[serde(default)]
    auto_merge_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
}

/// Rollup entries are a union of check runs (`name` + `conclusion`) and
/// commit statuses (`context` + `state`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCheck {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFiles {
    #[serde(default)]
    files: Vec<WireFile>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    path: String,
    #[serde(default)]
    additions: u32,
    #[serde(default)]
    deletions: u32,
}

impl From<WirePr> for PullRequest {
    fn from(wire: WirePr) -> Self {
        let status_checks = wire
            .status_check_rollup
            .into_iter()
            .map(|c| {
                let verdict = c.conclusion.or(c.state).unwrap_or_default();
                StatusCheck {
                    name: c.name.or(c.context).unwrap_or_default(),
                    state: match verdict.as_str() {
                        "SUCCESS" => CheckState::Success,
                        "FAILURE" | "ERROR" | "TIMED_OUT" | "CANCELLED" => CheckState::Failure,
                        _ => CheckState::Pending,
                    },
                }
            })
            .collect();

        Self {
            number: wire.number,
            title: wire.title,
            head_ref: wire.head_ref_name,
            base_ref: wire.base_ref_name,
            mergeable: wire.mergeable,
            status_checks,
            labels: wire.labels.into_iter().map(|l| l.name).collect(),
            auto_merge_requested: wire
                .auto_merge_request
                .is_some_and(|v| !v.is_null()),
        }
    }
}
