//! Remote-agent delegation boundary.
//!
//! The autonomous agent is an opaque subprocess: the daemon hands it a
//! conflict-resolution request and judges only the exit code. Everything
//! the agent does internally (LLM calls, its own git work) is outside
//! this crate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Result, WardenError};
use crate::exec::{CommandRequest, CommandRunner};

/// What the daemon asks the agent to do for one conflicting PR.
#[derive(Debug, Clone)]
pub struct ConflictRequest {
    pub pr_number: u64,
    pub branch: String,
    pub strategy: String,
    /// Instruct the agent to wait for CI after pushing its resolution.
    pub wait_for_ci: bool,
}

#[async_trait]
pub trait AgentDelegate: Send + Sync {
    async fn resolve_conflicts(&self, request: &ConflictRequest) -> Result<()>;
}

/// Production delegate: spawns the configured agent command.
pub struct SubprocessDelegate {
    runner: Arc<dyn CommandRunner>,
    program: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl SubprocessDelegate {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            working_dir: working_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl AgentDelegate for SubprocessDelegate {
    async fn resolve_conflicts(&self, request: &ConflictRequest) -> Result<()> {
        let mut args = vec![
            "resolve-conflicts".to_string(),
            "--pr".to_string(),
            request.pr_number.to_string(),
            "--branch".to_string(),
            request.branch.clone(),
            "--strategy".to_string(),
            request.strategy.clone(),
        ];
        if request.wait_for_ci {
            args.push("--wait-for-ci".to_string());
        }

        debug!(pr = request.pr_number, program = %self.program, "Delegating conflict resolution to agent");

        let output = self
            .runner
            .run(
                CommandRequest::new(&self.program)
                    .with_args(args)
                    .with_cwd(&self.working_dir)
                    .with_timeout(self.timeout),
            )
            .await?;

        if !output.success() {
            warn!(
                pr = request.pr_number,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "Agent delegate failed"
            );
            return Err(WardenError::AgentDelegate(format!(
                "agent exited with {:?} for PR #{}",
                output.exit_code, request.pr_number
            )));
        }
        Ok(())
    }
}
