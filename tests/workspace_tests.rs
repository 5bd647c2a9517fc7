mod fixtures;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use repo_warden::error::WardenError;
use repo_warden::workspace::{
    AuditAction, Availability, Reaper, ReaperConfig, WorkspaceRecord, WorkspaceRegistry,
    PID_MARKER_FILE,
};

fn registry_in(dir: &TempDir) -> WorkspaceRegistry {
    WorkspaceRegistry::new(
        dir.path().join("workspaces.json"),
        dir.path().join("audit.ndjson"),
    )
}

async fn seeded_registry(dir: &TempDir) -> WorkspaceRegistry {
    let registry = registry_in(dir);
    registry.init("test-fleet", 60).await.unwrap();
    registry
        .add_workspace(WorkspaceRecord::new("ws-1", "builder-1", "hetzner"))
        .await
        .unwrap();
    registry
}

#[tokio::test]
async fn claim_renew_release_lifecycle() {
    let dir = TempDir::new().unwrap();
    let registry = seeded_registry(&dir).await;
    let now = Utc::now();

    let claimed = registry
        .claim("ws-1", "agent-a", Some(30), now, Some("smoke test".into()))
        .await
        .unwrap();
    assert_eq!(claimed.availability, Availability::Leased);
    let lease = claimed.lease.unwrap();
    assert_eq!(lease.owner, "agent-a");
    assert_eq!(lease.expires_at, now + Duration::minutes(30));

    // A live lease hard-rejects a second claimant.
    let err = registry
        .claim("ws-1", "agent-b", None, now, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::WorkspaceLeased { .. }));

    let renewed = registry
        .renew("ws-1", Some("agent-b"), Some(15), now)
        .await
        .unwrap();
    assert_eq!(renewed.lease.unwrap().owner, "agent-b");

    assert!(registry.release("ws-1", now).await.unwrap());
    // Idempotent when no lease exists.
    assert!(!registry.release("ws-1", now).await.unwrap());

    let actions: Vec<AuditAction> = registry
        .audit()
        .read_tail(10)
        .await
        .unwrap()
        .iter()
        .map(|r| r.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Claimed,
            AuditAction::Renewed,
            AuditAction::Released
        ]
    );
}

#[tokio::test]
async fn state_survives_a_registry_reload() {
    let dir = TempDir::new().unwrap();
    let registry = seeded_registry(&dir).await;
    registry
        .claim("ws-1", "agent-a", None, Utc::now(), None)
        .await
        .unwrap();

    let reopened = registry_in(&dir);
    let workspaces = reopened.list().await.unwrap();
    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0].availability, Availability::Leased);
}

#[tokio::test]
async fn sweep_releases_expired_leases() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(seeded_registry(&dir).await);
    let now = Utc::now();
    registry
        .claim("ws-1", "agent-a", Some(1), now, None)
        .await
        .unwrap();

    let reaper = Reaper::new(registry.clone(), ReaperConfig::default());
    let result = reaper.run_sweep(now + Duration::hours(2)).await;

    assert_eq!(result.leases.expired, 1);
    assert_eq!(result.leases.cleaned, 1);
    let workspaces = registry.list().await.unwrap();
    assert_eq!(workspaces[0].availability, Availability::Available);
    assert!(workspaces[0].lease.is_none());

    let tail = registry.audit().read_tail(5).await.unwrap();
    assert_eq!(tail.last().unwrap().action, AuditAction::Reaped);
}

#[tokio::test]
async fn recently_modified_worktrees_are_skipped() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(seeded_registry(&dir).await);
    let worktrees = dir.path().join("worktrees");
    std::fs::create_dir_all(worktrees.join("fresh")).unwrap();

    let config = ReaperConfig {
        search_paths: vec![worktrees.clone()],
        orphan_threshold_hours: 24,
        dry_run: false,
    };
    let result = Reaper::new(registry, config).run_sweep(Utc::now()).await;

    assert_eq!(result.worktrees.scanned, 1);
    assert_eq!(result.worktrees.cleaned, 0);
    assert_eq!(
        result.worktrees.skipped_reasons.get("recently_modified"),
        Some(&1)
    );
    assert!(worktrees.join("fresh").exists());
}

#[tokio::test]
async fn live_pid_marker_protects_a_worktree() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(seeded_registry(&dir).await);
    let worktrees = dir.path().join("worktrees");
    let active = worktrees.join("active");
    let stale = worktrees.join("stale");
    std::fs::create_dir_all(&active).unwrap();
    std::fs::create_dir_all(&stale).unwrap();
    // This test process is the live agent.
    std::fs::write(active.join(PID_MARKER_FILE), std::process::id().to_string()).unwrap();

    // Zero threshold: nothing counts as recently modified.
    let config = ReaperConfig {
        search_paths: vec![worktrees.clone()],
        orphan_threshold_hours: 0,
        dry_run: false,
    };
    let result = Reaper::new(registry, config).run_sweep(Utc::now()).await;

    assert_eq!(result.worktrees.scanned, 2);
    assert_eq!(result.worktrees.cleaned, 1);
    assert_eq!(
        result.worktrees.skipped_reasons.get("active_process"),
        Some(&1)
    );
    assert!(active.exists());
    assert!(!stale.exists());
}

#[tokio::test]
async fn dead_pid_marker_does_not_protect() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(seeded_registry(&dir).await);
    let worktrees = dir.path().join("worktrees");
    let orphan = worktrees.join("orphan");
    std::fs::create_dir_all(&orphan).unwrap();
    std::fs::write(orphan.join(PID_MARKER_FILE), "12345").unwrap();

    let config = ReaperConfig {
        search_paths: vec![worktrees],
        orphan_threshold_hours: 0,
        dry_run: false,
    };
    // Injected probe: every process is dead.
    let reaper = Reaper::new(registry, config).with_pid_probe(|_| false);
    let result = reaper.run_sweep(Utc::now()).await;

    assert_eq!(result.worktrees.cleaned, 1);
    assert!(!orphan.exists());
}

#[tokio::test]
async fn dry_run_records_but_keeps_directories() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(seeded_registry(&dir).await);
    let worktrees = dir.path().join("worktrees");
    let orphan = worktrees.join("orphan");
    std::fs::create_dir_all(&orphan).unwrap();

    let config = ReaperConfig {
        search_paths: vec![worktrees],
        orphan_threshold_hours: 0,
        dry_run: true,
    };
    let result = Reaper::new(registry, config).run_sweep(Utc::now()).await;

    assert_eq!(result.worktrees.cleaned, 1);
    assert_eq!(result.worktrees.cleaned_paths, vec![orphan.clone()]);
    assert!(orphan.exists());
}
