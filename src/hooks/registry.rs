//! Hook registry: one ordered list of registrations per lifecycle event.
//!
//! Registration is upsert-by-id, which makes builtin registration and
//! config reloads idempotent. Registrations live for the process lifetime.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, WardenError};

use super::events::HookEvent;

pub const DEFAULT_HOOK_TIMEOUT_SECS: u64 = 60;

/// A hook as written by the user (config file or API call).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookSpec {
    #[serde(default)]
    pub id: Option<String>,
    pub command: String,
    #[serde(default)]
    pub blocking: bool,
    /// Wall-clock limit in seconds.
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub sdks: Vec<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_HOOK_TIMEOUT_SECS
}

impl HookSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: None,
            command: command.into(),
            blocking: false,
            timeout_secs: DEFAULT_HOOK_TIMEOUT_SECS,
            sdks: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_sdks(mut self, sdks: impl IntoIterator<Item = String>) -> Self {
        self.sdks = sdks.into_iter().collect();
        self
    }
}

/// A registered hook. `id` is unique within its event's list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookRegistration {
    pub id: String,
    pub event: HookEvent,
    pub command: String,
    pub blocking: bool,
    pub timeout_secs: u64,
    pub sdks: Vec<String>,
    pub builtin: bool,
}

/// Builtin-hook registration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinHookMode {
    Off,
    #[default]
    Auto,
    Force,
}

impl BuiltinHookMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "auto" => Some(Self::Auto),
            "force" => Some(Self::Force),
            _ => None,
        }
    }
}

struct BuiltinHook {
    id: &'static str,
    event: HookEvent,
    command: &'static str,
}

/// Pre-push preflight refuses staged conflict markers and whitespace
/// damage; task-complete validation refuses a dirty working tree.
const BUILTIN_HOOKS: &[BuiltinHook] = &[
    BuiltinHook {
        id: "builtin-pre-push-preflight",
        event: HookEvent::PrePush,
        command: "git diff --cached --check",
    },
    BuiltinHook {
        id: "builtin-task-complete-validation",
        event: HookEvent::TaskComplete,
        command: "test -z \"$(git status --porcelain)\"",
    },
];

#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<HashMap<HookEvent, Vec<HookRegistration>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a hook into the event's ordered list. Returns the hook id
    /// (generated when the spec carries none).
    pub fn register_hook(&self, event: &str, spec: HookSpec) -> Result<String> {
        let event = Self::parse_event(event)?;
        Ok(self.register(event, spec, false))
    }

    fn register(&self, event: HookEvent, spec: HookSpec, builtin: bool) -> String {
        let id = spec.id.unwrap_or_else(generate_hook_id);
        let registration = HookRegistration {
            id: id.clone(),
            event,
            command: spec.command,
            blocking: spec.blocking,
            timeout_secs: spec.timeout_secs,
            sdks: normalize_sdks(spec.sdks),
            builtin,
        };

        let mut hooks = self.hooks.write();
        let list = hooks.entry(event).or_default();
        match list.iter_mut().find(|h| h.id == id) {
            Some(existing) => {
                debug!(event = %event, id = %id, "Replacing existing hook registration");
                *existing = registration;
            }
            None => {
                debug!(event = %event, id = %id, blocking = registration.blocking, "Registered hook");
                list.push(registration);
            }
        }
        id
    }

    /// Remove a hook by id. Returns whether anything was removed.
    pub fn unregister_hook(&self, event: &str, id: &str) -> Result<bool> {
        let event = Self::parse_event(event)?;
        let mut hooks = self.hooks.write();
        let Some(list) = hooks.get_mut(&event) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|h| h.id != id);
        Ok(list.len() != before)
    }

    /// Ordered list for one event. Unknown event names are an error here,
    /// unlike execution.
    pub fn hooks_for(&self, event: &str) -> Result<Vec<HookRegistration>> {
        let event = Self::parse_event(event)?;
        Ok(self.hooks_for_event(event))
    }

    pub(super) fn hooks_for_event(&self, event: HookEvent) -> Vec<HookRegistration> {
        self.hooks.read().get(&event).cloned().unwrap_or_default()
    }

    /// Full per-event mapping, in declaration order of [`HookEvent::ALL`].
    pub fn all_hooks(&self) -> Vec<(HookEvent, Vec<HookRegistration>)> {
        let hooks = self.hooks.read();
        HookEvent::ALL
            .iter()
            .map(|e| (*e, hooks.get(e).cloned().unwrap_or_default()))
            .collect()
    }

    /// Register the two builtin quality gates according to `mode`.
    /// Idempotent via upsert-by-id. Returns how many were registered.
    pub fn register_builtin_hooks(&self, mode: BuiltinHookMode) -> usize {
        if mode == BuiltinHookMode::Off {
            debug!("Builtin hooks disabled by mode");
            return 0;
        }

        let mut registered = 0;
        for builtin in BUILTIN_HOOKS {
            if builtin_disabled_by_env(builtin.id) {
                debug!(id = %builtin.id, "Builtin hook disabled by environment");
                continue;
            }
            if mode == BuiltinHookMode::Auto && self.has_user_hook(builtin.event) {
                debug!(
                    event = %builtin.event,
                    id = %builtin.id,
                    "User hook already present, skipping builtin"
                );
                continue;
            }
            let spec = HookSpec::new(builtin.command)
                .with_id(builtin.id)
                .blocking();
            self.register(builtin.event, spec, true);
            registered += 1;
        }
        registered
    }

    fn has_user_hook(&self, event: HookEvent) -> bool {
        self.hooks
            .read()
            .get(&event)
            .is_some_and(|list| list.iter().any(|h| !h.builtin))
    }

    /// Load hook specs from a JSON file keyed by `"hooks"` or
    /// `"agentHooks"`. A missing or malformed file registers nothing;
    /// unknown event names inside the file are skipped. Returns the count
    /// registered.
    pub fn load_hooks(&self, path: &Path) -> usize {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No hooks file to load");
                return 0;
            }
        };

        let document: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Hooks file is not valid JSON, ignoring");
                return 0;
            }
        };

        let Some(by_event) = document
            .get("hooks")
            .or_else(|| document.get("agentHooks"))
            .and_then(|v| v.as_object())
        else {
            warn!(path = %path.display(), "Hooks file has no hooks/agentHooks key, ignoring");
            return 0;
        };

        let mut registered = 0;
        for (event_name, specs) in by_event {
            let Some(event) = HookEvent::parse(event_name) else {
                warn!(event = %event_name, "Skipping unknown hook event in hooks file");
                continue;
            };
            let Ok(specs) = serde_json::from_value::<Vec<HookSpec>>(specs.clone()) else {
                warn!(event = %event_name, "Skipping malformed hook list in hooks file");
                continue;
            };
            for spec in specs {
                self.register(event, spec, false);
                registered += 1;
            }
        }

        debug!(path = %path.display(), registered, "Loaded hooks file");
        registered
    }

    /// Clear the entire registry.
    pub fn reset_hooks(&self) {
        self.hooks.write().clear();
    }

    fn parse_event(event: &str) -> Result<HookEvent> {
        HookEvent::parse(event).ok_or_else(|| WardenError::UnknownHookEvent(event.to_string()))
    }
}

fn generate_hook_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("hook-{}", &uuid[..8])
}

/// A wildcard anywhere in the list collapses it to `["*"]`.
fn normalize_sdks(sdks: Vec<String>) -> Vec<String> {
    if sdks.iter().any(|s| s == "*") {
        vec!["*".to_string()]
    } else {
        sdks
    }
}

fn builtin_disabled_by_env(id: &str) -> bool {
    let key = format!(
        "WARDEN_DISABLE_HOOK_{}",
        id.to_uppercase().replace('-', "_")
    );
    std::env::var(&key).is_ok_and(|v| !v.is_empty() && v != "0" && v != "false")
}
