//! Hook execution: one child process per hook, context injected as
//! `WARDEN_*` environment variables, each under its own hard timeout.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::exec::{CommandRequest, CommandRunner};

use super::events::HookEvent;
use super::registry::{HookRegistration, HookRegistry};

/// Execution context passed to hooks. `fields` become environment
/// variables; `sdk` additionally drives hook filtering.
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    pub sdk: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sdk(mut self, sdk: impl Into<String>) -> Self {
        self.sdk = Some(sdk.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    pub id: String,
    pub success: bool,
    /// `None` when the hook was killed on timeout.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Outcome of a blocking-hook gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingGateResult {
    pub passed: bool,
    /// Ids of blocking hooks that did not exit zero.
    pub failures: Vec<String>,
    pub results: Vec<HookResult>,
}

pub struct HookExecutor {
    registry: Arc<HookRegistry>,
    runner: Arc<dyn CommandRunner>,
}

impl HookExecutor {
    pub fn new(registry: Arc<HookRegistry>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Run every SDK-matching hook for `event`, in registration order.
    /// An unknown event name yields an empty result list, not an error.
    pub async fn execute_hooks(&self, event: &str, context: &HookContext) -> Vec<HookResult> {
        let Some(event) = HookEvent::parse(event) else {
            debug!(event, "Unknown hook event, nothing to execute");
            return Vec::new();
        };

        let hooks: Vec<_> = self
            .registry
            .hooks_for_event(event)
            .into_iter()
            .filter(|h| sdk_matches(h, context))
            .collect();

        let mut results = Vec::with_capacity(hooks.len());
        for hook in hooks {
            results.push(self.run_hook(event, &hook, context).await);
        }
        results
    }

    /// Run only `blocking=true` hooks; the gate passes iff every one of
    /// them exited zero. Unknown events pass trivially.
    pub async fn execute_blocking_hooks(
        &self,
        event: &str,
        context: &HookContext,
    ) -> BlockingGateResult {
        let Some(parsed) = HookEvent::parse(event) else {
            return BlockingGateResult {
                passed: true,
                failures: Vec::new(),
                results: Vec::new(),
            };
        };

        let hooks: Vec<_> = self
            .registry
            .hooks_for_event(parsed)
            .into_iter()
            .filter(|h| h.blocking && sdk_matches(h, context))
            .collect();

        let mut results = Vec::with_capacity(hooks.len());
        for hook in hooks {
            results.push(self.run_hook(parsed, &hook, context).await);
        }

        let failures: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.id.clone())
            .collect();

        BlockingGateResult {
            passed: failures.is_empty(),
            failures,
            results,
        }
    }

    async fn run_hook(
        &self,
        event: HookEvent,
        hook: &HookRegistration,
        context: &HookContext,
    ) -> HookResult {
        let mut request = CommandRequest::shell(&hook.command)
            .with_timeout(Duration::from_secs(hook.timeout_secs))
            .with_env("WARDEN_EVENT", event.as_str())
            .with_env("WARDEN_HOOK_ID", &hook.id);
        if let Some(sdk) = &context.sdk {
            request = request.with_env("WARDEN_SDK", sdk);
        }
        for (key, value) in &context.fields {
            request = request.with_env(format!("WARDEN_{}", key.to_uppercase()), value);
        }

        debug!(event = %event, id = %hook.id, "Executing hook");

        match self.runner.run(request).await {
            Ok(output) => {
                if !output.success() {
                    warn!(
                        event = %event,
                        id = %hook.id,
                        exit_code = ?output.exit_code,
                        timed_out = output.timed_out,
                        "Hook failed"
                    );
                }
                HookResult {
                    id: hook.id.clone(),
                    success: output.success(),
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                }
            }
            Err(e) => {
                warn!(event = %event, id = %hook.id, error = %e, "Hook could not be spawned");
                HookResult {
                    id: hook.id.clone(),
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                }
            }
        }
    }
}

/// Empty or wildcard `sdks` matches any context; otherwise the context's
/// SDK must be present in the list.
fn sdk_matches(hook: &HookRegistration, context: &HookContext) -> bool {
    if hook.sdks.is_empty() || hook.sdks.iter().any(|s| s == "*") {
        return true;
    }
    match &context.sdk {
        Some(sdk) => hook.sdks.iter().any(|s| s == sdk),
        None => false,
    }
}
