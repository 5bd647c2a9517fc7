use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, WardenError};
use crate::exec::{CommandOutput, CommandRequest, CommandRunner};

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// Short branch name, `None` for detached checkouts.
    pub branch: Option<String>,
}

/// Outcome of a `merge --no-commit` probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Clean,
    /// Paths left in the unmerged state.
    Conflicted(Vec<String>),
}

/// Git porcelain wrapper. All subprocess work goes through the injected
/// [`CommandRunner`] so the whole surface is fakeable in tests.
#[derive(Clone)]
pub struct GitRunner {
    runner: Arc<dyn CommandRunner>,
    working_dir: PathBuf,
}

impl GitRunner {
    pub fn new(runner: Arc<dyn CommandRunner>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            working_dir: working_dir.into(),
        }
    }

    /// Same runner, different working directory (scratch worktrees).
    pub fn with_dir(&self, dir: &Path) -> Self {
        Self::new(self.runner.clone(), dir)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let request = CommandRequest::new("git")
            .with_args(args.iter().map(|s| s.to_string()))
            .with_cwd(&self.working_dir);

        debug!(args = ?args, dir = %self.working_dir.display(), "Running git command");
        let output = self.runner.run(request).await?;

        if !output.success() {
            warn!(args = ?args, stderr = %output.stderr.trim(), "Git command failed");
        }
        Ok(output)
    }

    pub async fn run_checked(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args).await?;
        if !output.success() {
            return Err(WardenError::Git(output.stderr.trim().to_string()));
        }
        Ok(output)
    }

    pub async fn fetch(&self, remote: &str, refs: &[&str]) -> Result<()> {
        let mut args = vec!["fetch", remote];
        args.extend_from_slice(refs);
        self.run_checked(&args).await?;
        Ok(())
    }

    pub async fn checkout_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        self.run_checked(&["checkout", "-B", branch, start_point])
            .await?;
        Ok(())
    }

    /// Attempt a merge without committing. A conflicted result leaves the
    /// index mid-merge; the caller decides between per-path resolution and
    /// [`Self::merge_abort`].
    pub async fn merge_no_commit(&self, branch: &str) -> Result<MergeOutcome> {
        let output = self
            .run(&["merge", "--no-commit", "--no-ff", branch])
            .await?;
        if output.success() {
            return Ok(MergeOutcome::Clean);
        }
        Ok(MergeOutcome::Conflicted(self.unmerged_paths().await?))
    }

    pub async fn unmerged_paths(&self) -> Result<Vec<String>> {
        let output = self
            .run_checked(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    pub async fn merge_abort(&self) -> Result<()> {
        self.run_checked(&["merge", "--abort"]).await?;
        Ok(())
    }

    /// Path-scoped conflict resolution: keep our side of the given paths.
    pub async fn checkout_ours(&self, paths: &[String]) -> Result<()> {
        self.checkout_side("--ours", paths).await
    }

    /// Path-scoped conflict resolution: take the incoming side.
    pub async fn checkout_theirs(&self, paths: &[String]) -> Result<()> {
        self.checkout_side("--theirs", paths).await
    }

    async fn checkout_side(&self, side: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["checkout", side, "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args).await?;
        Ok(())
    }

    pub async fn add(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run_checked(&args).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "--no-edit", "-m", message])
            .await?;
        Ok(())
    }

    pub async fn commit_empty(&self, message: &str) -> Result<()> {
        self.run_checked(&["commit", "--allow-empty", "-m", message])
            .await?;
        Ok(())
    }

    pub async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_checked(&["push", remote, branch]).await?;
        Ok(())
    }

    pub async fn worktree_add(&self, path: &Path, branch: &str) -> Result<()> {
        let path_str = path_str(path)?;
        let output = self.run(&["worktree", "add", path_str, branch]).await?;
        if !output.success() {
            return Err(WardenError::Worktree {
                message: output.stderr.trim().to_string(),
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }

    /// Remove a worktree, falling back to forced filesystem deletion plus
    /// metadata pruning when the normal removal command fails.
    pub async fn worktree_remove(&self, path: &Path) -> Result<()> {
        let path_str = path_str(path)?;
        let output = self
            .run(&["worktree", "remove", "--force", path_str])
            .await?;
        if output.success() {
            return Ok(());
        }

        warn!(
            path = %path.display(),
            stderr = %output.stderr.trim(),
            "Worktree remove failed, forcing filesystem deletion"
        );
        if let Err(e) = tokio::fs::remove_dir_all(path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            return Err(WardenError::Worktree {
                message: e.to_string(),
                path: path.to_path_buf(),
            });
        }
        self.worktree_prune().await
    }

    pub async fn worktree_prune(&self) -> Result<()> {
        self.run_checked(&["worktree", "prune"]).await?;
        Ok(())
    }

    pub async fn worktree_list(&self) -> Result<Vec<WorktreeInfo>> {
        let output = self.run_checked(&["worktree", "list", "--porcelain"]).await?;
        Ok(parse_worktree_list(&output.stdout))
    }

    /// Whether any existing worktree has `branch` checked out.
    pub async fn branch_checked_out(&self, branch: &str) -> Result<bool> {
        let worktrees = self.worktree_list().await?;
        Ok(worktrees
            .iter()
            .any(|w| w.branch.as_deref() == Some(branch)))
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| WardenError::Git(format!("invalid path encoding: {}", path.display())))
}

fn parse_worktree_list(stdout: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in stdout.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(info) = current.take() {
                worktrees.push(info);
            }
            current = Some(WorktreeInfo {
                path: PathBuf::from(path.trim()),
                branch: None,
            });
        } else if let Some(branch) = line.strip_prefix("branch ")
            && let Some(info) = current.as_mut()
        {
            let branch = branch.trim();
            info.branch = Some(
                branch
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch)
                    .to_string(),
            );
        }
    }
    if let Some(info) = current {
        worktrees.push(info);
    }
    worktrees
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worktree_porcelain_output() {
        let stdout = "\
worktree /repo
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /repo/.warden/worktrees/pr-12
HEAD 2222222222222222222222222222222222222222
branch refs/heads/fix/login

worktree /repo/.warden/worktrees/detached
HEAD 3333333333333333333333333333333333333333
detached
";
        let worktrees = parse_worktree_list(stdout);
        assert_eq!(worktrees.len(), 3);
        assert_eq!(worktrees[0].branch.as_deref(), Some("main"));
        assert_eq!(worktrees[1].branch.as_deref(), Some("fix/login"));
        assert_eq!(worktrees[1].path, PathBuf::from("/repo/.warden/worktrees/pr-12"));
        assert_eq!(worktrees[2].branch, None);
    }

    #[test]
    fn parses_empty_output() {
        assert!(parse_worktree_list("").is_empty());
    }
}
