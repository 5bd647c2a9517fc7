//! Shared test doubles: a scriptable command runner and hosting client.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use repo_warden::error::{Result, WardenError};
use repo_warden::exec::{CommandOutput, CommandRequest, CommandRunner};
use repo_warden::host::{CheckState, HostClient, MergeableState, PrFile, PullRequest, StatusCheck};

/// Scriptable [`CommandRunner`]. Requests match the first script entry
/// whose pattern is a substring of the rendered command line; unmatched
/// requests succeed with empty output. Every request is recorded.
#[derive(Default)]
pub struct FakeCommandRunner {
    script: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, pattern: impl Into<String>, output: CommandOutput) -> Self {
        self.script.lock().push((pattern.into(), output));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput> {
        let line = request.display();
        self.calls.lock().push(line.clone());
        let script = self.script.lock();
        for (pattern, output) in script.iter() {
            if line.contains(pattern.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(CommandOutput::ok())
    }
}

/// Scriptable [`HostClient`]. `view_pr` serves queued per-PR responses
/// first, then the standing PR list. Merges are recorded, not applied.
#[derive(Default)]
pub struct FakeHostClient {
    prs: Mutex<Vec<PullRequest>>,
    files: Mutex<HashMap<u64, Vec<PrFile>>>,
    view_queue: Mutex<HashMap<u64, Vec<PullRequest>>>,
    merges: Mutex<Vec<(u64, bool)>>,
}

impl FakeHostClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pr(self, pr: PullRequest) -> Self {
        self.prs.lock().push(pr);
        self
    }

    pub fn with_files(self, number: u64, files: Vec<PrFile>) -> Self {
        self.files.lock().insert(number, files);
        self
    }

    /// Queue a state the next `view_pr` call for this number returns,
    /// ahead of the standing list.
    pub fn queue_view(&self, pr: PullRequest) {
        self.view_queue.lock().entry(pr.number).or_default().push(pr);
    }

    pub fn merges(&self) -> Vec<(u64, bool)> {
        self.merges.lock().clone()
    }
}

#[async_trait]
impl HostClient for FakeHostClient {
    async fn list_open_prs(&self) -> Result<Vec<PullRequest>> {
        Ok(self.prs.lock().clone())
    }

    async fn view_pr(&self, number: u64) -> Result<PullRequest> {
        if let Some(queue) = self.view_queue.lock().get_mut(&number) {
            if !queue.is_empty() {
                return Ok(queue.remove(0));
            }
        }
        self.prs
            .lock()
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
            .ok_or_else(|| WardenError::Host(format!("no such PR: {number}")))
    }

    async fn pr_files(&self, number: u64) -> Result<Vec<PrFile>> {
        self.files
            .lock()
            .get(&number)
            .cloned()
            .ok_or_else(|| WardenError::Host(format!("file listing unavailable for {number}")))
    }

    async fn merge_pr(&self, number: u64, auto: bool) -> Result<()> {
        self.merges.lock().push((number, auto));
        Ok(())
    }
}

pub fn pull_request(number: u64, mergeable: MergeableState) -> PullRequest {
    PullRequest {
        number,
        title: format!("Test PR {number}"),
        head_ref: format!("feature/pr-{number}"),
        base_ref: "main".to_string(),
        mergeable,
        status_checks: Vec::new(),
        labels: Vec::new(),
        auto_merge_requested: false,
    }
}

pub fn check(name: &str, state: CheckState) -> StatusCheck {
    StatusCheck {
        name: name.to_string(),
        state,
    }
}

pub fn pr_file(path: &str, additions: u32, deletions: u32) -> PrFile {
    PrFile {
        path: path.to_string(),
        additions,
        deletions,
    }
}
