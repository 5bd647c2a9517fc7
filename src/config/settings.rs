use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::cleanup::CleanupConfig;
use crate::error::{Result, WardenError};
use crate::hooks::BuiltinHookMode;
use crate::routing::RoutingConfig;
use crate::workspace::ReaperConfig;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub cleanup: CleanupConfig,
    pub routing: RoutingConfig,
    pub hooks: HooksConfig,
    pub workspace: WorkspaceConfig,
    pub reaper: ReaperConfig,
    pub notification: NotificationConfig,
    pub git: GitConfig,
    pub agent: AgentConfig,
}

impl WardenConfig {
    pub async fn load(warden_dir: &Path) -> Result<Self> {
        let config_path = warden_dir.join(CONFIG_FILE);
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, warden_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = warden_dir.join(CONFIG_FILE);
        let content =
            toml::to_string_pretty(self).map_err(|e| WardenError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Collects every violation before failing, so a bad config file reports
    /// all of its problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.cleanup.interval_ms == 0 {
            errors.push("cleanup.interval_ms must be greater than 0".to_string());
        }
        if self.cleanup.max_concurrent_cleanups == 0 {
            errors.push("cleanup.max_concurrent_cleanups must be greater than 0".to_string());
        }
        if self.cleanup.post_conflict_recheck_attempts == 0 {
            errors.push("cleanup.post_conflict_recheck_attempts must be at least 1".to_string());
        }

        if self.workspace.default_lease_ttl_minutes <= 0 {
            errors.push("workspace.default_lease_ttl_minutes must be greater than 0".to_string());
        }

        if self.agent.timeout_secs == 0 {
            errors.push("agent.timeout_secs must be greater than 0".to_string());
        }

        if self.reaper.orphan_threshold_hours < 1 {
            errors.push("reaper.orphan_threshold_hours must be at least 1".to_string());
        }

        if self.hooks.builtin_mode.parse_mode().is_none() {
            errors.push(format!(
                "hooks.builtin_mode must be one of off/auto/force, got {:?}",
                self.hooks.builtin_mode.0
            ));
        }

        if let Some(url) = &self.notification.webhook_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(format!(
                    "notification.webhook_url must be an http(s) URL, got {url:?}"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub builtin_mode: BuiltinModeSetting,
    /// Optional JSON hooks file loaded at startup.
    pub hooks_file: Option<PathBuf>,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            builtin_mode: BuiltinModeSetting("auto".to_string()),
            hooks_file: None,
        }
    }
}

impl HooksConfig {
    /// Config value, overridable by `WARDEN_BUILTIN_HOOKS`.
    pub fn effective_builtin_mode(&self) -> BuiltinHookMode {
        if let Ok(value) = std::env::var("WARDEN_BUILTIN_HOOKS") {
            if let Some(mode) = BuiltinHookMode::parse(&value) {
                return mode;
            }
        }
        self.builtin_mode.parse_mode().unwrap_or(BuiltinHookMode::Auto)
    }
}

/// Newtype keeping the TOML representation a plain string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuiltinModeSetting(pub String);

impl BuiltinModeSetting {
    pub fn parse_mode(&self) -> Option<BuiltinHookMode> {
        BuiltinHookMode::parse(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub registry_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub default_lease_ttl_minutes: i64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from(".warden/workspaces.json"),
            audit_log_path: PathBuf::from(".warden/audit.ndjson"),
            default_lease_ttl_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Append each event as one JSON line to `<logs>/events.jsonl`.
    pub event_log: bool,
    /// Shell command run per event with `WARDEN_EVENT*` env injected.
    pub hook_command: Option<String>,
    pub webhook_url: Option<String>,
}

impl NotificationConfig {
    /// Config value, overridable by `WARDEN_WEBHOOK_URL`.
    pub fn effective_webhook_url(&self) -> Option<String> {
        match std::env::var("WARDEN_WEBHOOK_URL") {
            Ok(url) if !url.is_empty() => Some(url),
            _ => self.webhook_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// External agent executable delegated to for conflict resolution.
    /// Unset means the local fallback runs directly.
    pub program: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: None,
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub remote: String,
    pub base_branch: String,
    /// Scratch worktrees live under this directory, relative to the repo
    /// root.
    pub scratch_dir: PathBuf,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            base_branch: "main".to_string(),
            scratch_dir: PathBuf::from(".warden/worktrees"),
        }
    }
}

/// Resolved filesystem layout for a warden-managed repository.
#[derive(Debug, Clone)]
pub struct WardenPaths {
    pub root: PathBuf,
    pub warden_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub worktrees_dir: PathBuf,
}

impl WardenPaths {
    pub fn new(root: PathBuf, config: &WardenConfig) -> Self {
        let warden_dir = root.join(".warden");
        Self {
            logs_dir: warden_dir.join("logs"),
            worktrees_dir: root.join(&config.git.scratch_dir),
            warden_dir,
            root,
        }
    }

    pub fn registry_path(&self, config: &WardenConfig) -> PathBuf {
        self.root.join(&config.workspace.registry_path)
    }

    pub fn audit_log_path(&self, config: &WardenConfig) -> PathBuf {
        self.root.join(&config.workspace.audit_log_path)
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        let dirs = [&self.warden_dir, &self.logs_dir, &self.worktrees_dir];
        for dir in dirs {
            fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.warden_dir.join(CONFIG_FILE).exists()
    }
}
