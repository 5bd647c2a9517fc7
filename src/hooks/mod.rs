//! Agent hook lifecycle engine.
//!
//! - `events`: the closed set of 13 lifecycle events
//! - `registry`: upsert-by-id registration, builtin gates, file loading
//! - `runner`: subprocess execution with SDK filtering and timeouts

mod events;
mod registry;
mod runner;

pub use events::HookEvent;
pub use registry::{
    BuiltinHookMode, DEFAULT_HOOK_TIMEOUT_SECS, HookRegistration, HookRegistry, HookSpec,
};
pub use runner::{BlockingGateResult, HookContext, HookExecutor, HookResult};
