use tempfile::TempDir;

use repo_warden::config::{WardenConfig, WardenPaths};
use repo_warden::hooks::BuiltinHookMode;

#[test]
fn default_config() {
    let config = WardenConfig::default();

    assert_eq!(config.cleanup.interval_ms, 300_000);
    assert_eq!(config.cleanup.max_concurrent_cleanups, 3);
    assert_eq!(config.cleanup.conflict_strategy, "safe-merge");
    assert!(config.cleanup.auto_merge);
    assert!(!config.cleanup.dry_run);
    assert_eq!(config.cleanup.max_conflict_size, 500);
    assert_eq!(
        config.cleanup.exclude_labels,
        vec!["do-not-merge".to_string(), "wip".to_string()]
    );

    assert!(config.routing.enabled);
    assert!(config.routing.overrides.is_empty());

    assert_eq!(config.hooks.builtin_mode.parse_mode(), Some(BuiltinHookMode::Auto));

    assert_eq!(config.workspace.default_lease_ttl_minutes, 60);
    assert_eq!(config.reaper.orphan_threshold_hours, 24);

    assert!(!config.notification.enabled);
    assert!(config.notification.webhook_url.is_none());

    assert_eq!(config.git.remote, "origin");
    assert_eq!(config.git.base_branch, "main");
    assert_eq!(config.agent.timeout_secs, 1800);
    assert!(config.agent.program.is_none());
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut config = WardenConfig::default();
    config.cleanup.max_conflict_size = 900;
    config.git.base_branch = "develop".to_string();
    config.agent.program = Some("pilot-agent".to_string());

    config.save(dir.path()).await.unwrap();
    let loaded = WardenConfig::load(dir.path()).await.unwrap();

    assert_eq!(loaded.cleanup.max_conflict_size, 900);
    assert_eq!(loaded.git.base_branch, "develop");
    assert_eq!(loaded.agent.program.as_deref(), Some("pilot-agent"));
}

#[tokio::test]
async fn missing_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let loaded = WardenConfig::load(dir.path()).await.unwrap();
    assert_eq!(loaded.cleanup.interval_ms, 300_000);
}

#[tokio::test]
async fn invalid_values_fail_on_load() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[cleanup]\ninterval_ms = 0\n\n[workspace]\ndefault_lease_ttl_minutes = -5\n",
    )
    .unwrap();

    let err = WardenConfig::load(dir.path()).await.unwrap_err().to_string();
    assert!(err.contains("interval_ms"));
    assert!(err.contains("default_lease_ttl_minutes"));
}

#[test]
fn paths_follow_the_configured_scratch_dir() {
    let mut config = WardenConfig::default();
    config.git.scratch_dir = "scratch/wt".into();
    let paths = WardenPaths::new("/repo".into(), &config);

    assert_eq!(paths.warden_dir, std::path::PathBuf::from("/repo/.warden"));
    assert_eq!(paths.logs_dir, std::path::PathBuf::from("/repo/.warden/logs"));
    assert_eq!(
        paths.worktrees_dir,
        std::path::PathBuf::from("/repo/scratch/wt")
    );
    assert_eq!(
        paths.registry_path(&config),
        std::path::PathBuf::from("/repo/.warden/workspaces.json")
    );
}
