mod fixtures;

use std::sync::Arc;

use tempfile::TempDir;

use fixtures::{FakeCommandRunner, FakeHostClient, check, pr_file, pull_request};
use repo_warden::cleanup::{CleanupConfig, CleanupDaemon, ConflictResolver};
use repo_warden::config::{GitConfig, NotificationConfig};
use repo_warden::events::EventBus;
use repo_warden::exec::CommandOutput;
use repo_warden::git::GitRunner;
use repo_warden::host::{CheckState, MergeableState};
use repo_warden::notification::Notifier;
use repo_warden::workspace::{PID_MARKER_FILE, ReaperConfig};

fn test_config() -> CleanupConfig {
    CleanupConfig {
        post_conflict_recheck_attempts: 2,
        post_conflict_recheck_delay_ms: 1,
        ..CleanupConfig::default()
    }
}

fn build_daemon(
    runner: Arc<FakeCommandRunner>,
    host: Arc<FakeHostClient>,
    config: CleanupConfig,
    root: &TempDir,
) -> Arc<CleanupDaemon> {
    build_daemon_with_reaper(runner, host, config, ReaperConfig::default(), root)
}

fn build_daemon_with_reaper(
    runner: Arc<FakeCommandRunner>,
    host: Arc<FakeHostClient>,
    config: CleanupConfig,
    reaper_config: ReaperConfig,
    root: &TempDir,
) -> Arc<CleanupDaemon> {
    let git_config = GitConfig {
        scratch_dir: root.path().join("worktrees"),
        ..GitConfig::default()
    };
    let git = GitRunner::new(runner, root.path());
    let resolver = ConflictResolver::new(
        git.clone(),
        host.clone(),
        None,
        config.clone(),
        git_config.clone(),
    );
    let notifier = Arc::new(Notifier::new(NotificationConfig::default(), None));
    CleanupDaemon::new(
        host,
        resolver,
        git,
        git_config,
        config,
        reaper_config,
        notifier,
        EventBus::new(),
    )
}

#[tokio::test]
async fn small_conflict_resolves_through_local_fallback() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(
        FakeCommandRunner::new()
            .respond("merge --no-commit", CommandOutput::failed(1, "CONFLICT"))
            .respond(
                "diff --name-only --diff-filter=U",
                CommandOutput::ok_with_stdout("Cargo.lock\n"),
            ),
    );
    let host = Arc::new(
        FakeHostClient::new()
            .with_pr(pull_request(1, MergeableState::Conflicting))
            .with_files(1, vec![pr_file("Cargo.lock", 15, 5)]),
    );
    // First mergeability recheck sees the pushed resolution.
    host.queue_view(pull_request(1, MergeableState::Mergeable));

    let daemon = build_daemon(runner.clone(), host.clone(), test_config(), &root);
    daemon.run_once().await;

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.prs_processed, 1);
    assert_eq!(stats.conflicts_resolved, 1);
    assert_eq!(stats.escalations, 0);
    assert_eq!(stats.errors, 0);

    assert_eq!(runner.call_count("checkout --theirs -- Cargo.lock"), 1);
    assert_eq!(runner.call_count("push origin feature/pr-1"), 1);
    assert_eq!(runner.call_count("worktree remove"), 1);
    // Still conflicting per the standing view, so no merge happened.
    assert!(host.merges().is_empty());
}

#[tokio::test]
async fn oversized_conflict_escalates_without_touching_git() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(FakeCommandRunner::new());
    let host = Arc::new(
        FakeHostClient::new()
            .with_pr(pull_request(2, MergeableState::Conflicting))
            .with_files(2, vec![pr_file("src/huge.rs", 450, 150)]),
    );

    let daemon = build_daemon(runner.clone(), host.clone(), test_config(), &root);
    daemon.run_once().await;

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.escalations, 1);
    assert_eq!(stats.conflicts_resolved, 0);

    let calls = runner.calls();
    assert!(
        !calls.iter().any(|c| c.contains("merge")
            || c.contains("worktree add")
            || c.contains("push")),
        "escalation must not mutate git, got: {calls:?}"
    );
}

#[tokio::test]
async fn green_pr_is_merged_by_the_separate_pass() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(FakeCommandRunner::new());
    let mut green = pull_request(3, MergeableState::Mergeable);
    green.status_checks = vec![check("ci", CheckState::Success)];
    let host = Arc::new(FakeHostClient::new().with_pr(green));

    let daemon = build_daemon(runner, host.clone(), test_config(), &root);
    daemon.run_once().await;

    assert_eq!(host.merges(), vec![(3, false)]);
    assert_eq!(daemon.stats().snapshot().auto_merges, 1);
    // Green PRs never enter the cleanup queue.
    assert_eq!(daemon.stats().snapshot().prs_processed, 0);
}

#[tokio::test]
async fn pending_checks_queue_an_auto_merge_request() {
    let root = TempDir::new().unwrap();
    let mut pending = pull_request(4, MergeableState::Mergeable);
    pending.status_checks = vec![check("ci", CheckState::Pending)];
    let host = Arc::new(FakeHostClient::new().with_pr(pending));

    let daemon = build_daemon(Arc::new(FakeCommandRunner::new()), host.clone(), test_config(), &root);
    daemon.run_once().await;

    assert_eq!(host.merges(), vec![(4, true)]);
    // A queued request is not a completed merge.
    assert_eq!(daemon.stats().snapshot().auto_merges, 0);
}

#[tokio::test]
async fn ci_failure_gets_an_empty_commit_retrigger() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(FakeCommandRunner::new());
    let mut failing = pull_request(5, MergeableState::Mergeable);
    failing.status_checks = vec![check("ci", CheckState::Failure)];
    let host = Arc::new(FakeHostClient::new().with_pr(failing));

    let daemon = build_daemon(runner.clone(), host.clone(), test_config(), &root);
    daemon.run_once().await;

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.ci_retriggers, 1);
    assert_eq!(runner.call_count("commit --allow-empty"), 1);
    assert_eq!(runner.call_count("push origin feature/pr-5"), 1);
    // The retrigger does not merge; CI has to rerun first.
    assert!(host.merges().is_empty());
}

#[tokio::test]
async fn excluded_labels_are_left_alone() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(FakeCommandRunner::new());
    let mut wip = pull_request(6, MergeableState::Conflicting);
    wip.labels = vec!["do-not-merge".to_string()];
    let host = Arc::new(FakeHostClient::new().with_pr(wip));

    let daemon = build_daemon(runner.clone(), host.clone(), test_config(), &root);
    daemon.run_once().await;

    assert_eq!(daemon.stats().snapshot().prs_processed, 0);
    assert!(host.merges().is_empty());
    assert!(runner.calls().iter().all(|c| !c.contains("merge")));
}

#[tokio::test]
async fn dry_run_reports_without_mutating() {
    let root = TempDir::new().unwrap();
    let runner = Arc::new(FakeCommandRunner::new());
    let host = Arc::new(
        FakeHostClient::new()
            .with_pr(pull_request(7, MergeableState::Conflicting))
            .with_files(7, vec![pr_file("Cargo.lock", 4, 4)]),
    );

    let config = CleanupConfig {
        dry_run: true,
        ..test_config()
    };
    let daemon = build_daemon(runner.clone(), host.clone(), config, &root);
    daemon.run_once().await;

    let stats = daemon.stats().snapshot();
    assert_eq!(stats.prs_processed, 1);
    assert_eq!(stats.conflicts_resolved, 0);
    assert_eq!(stats.escalations, 0);
    assert!(host.merges().is_empty());
    assert!(runner.calls().iter().all(|c| !c.contains("push")));
}

#[tokio::test]
async fn run_window_is_recorded_even_on_listing_failure() {
    let root = TempDir::new().unwrap();
    // No PRs configured; the empty listing still completes a cycle.
    let host = Arc::new(FakeHostClient::new());
    let daemon = build_daemon(Arc::new(FakeCommandRunner::new()), host, test_config(), &root);

    assert!(daemon.last_run().is_none());
    daemon.run_once().await;
    let window = daemon.last_run().expect("run window recorded");
    assert!(window.finished >= window.started);
}

#[tokio::test]
async fn startup_prune_leaves_recently_modified_worktrees() {
    let root = TempDir::new().unwrap();
    let scratch = root.path().join("worktrees");
    std::fs::create_dir_all(scratch.join("pr-5")).unwrap();

    let runner = Arc::new(FakeCommandRunner::new());
    // Default reaper threshold is 24h; the directory was just created.
    let daemon = build_daemon(
        runner.clone(),
        Arc::new(FakeHostClient::new()),
        test_config(),
        &root,
    );
    daemon.run_once().await;

    assert_eq!(runner.call_count("worktree remove"), 0);
}

#[tokio::test]
async fn startup_prune_removes_stale_but_spares_live_pid_worktrees() {
    let root = TempDir::new().unwrap();
    let scratch = root.path().join("worktrees");
    std::fs::create_dir_all(scratch.join("pr-9")).unwrap();
    let busy = scratch.join("busy");
    std::fs::create_dir_all(&busy).unwrap();
    std::fs::write(busy.join(PID_MARKER_FILE), std::process::id().to_string()).unwrap();

    let runner = Arc::new(FakeCommandRunner::new());
    let reaper_config = ReaperConfig {
        orphan_threshold_hours: 0,
        ..ReaperConfig::default()
    };
    let daemon = build_daemon_with_reaper(
        runner.clone(),
        Arc::new(FakeHostClient::new()),
        test_config(),
        reaper_config,
        &root,
    );
    daemon.run_once().await;

    assert_eq!(runner.call_count("worktree remove"), 1);
    let removes: Vec<_> = runner
        .calls()
        .into_iter()
        .filter(|c| c.contains("worktree remove"))
        .collect();
    assert!(removes[0].contains("pr-9"));
    assert!(removes.iter().all(|c| !c.contains("busy")));
}
