pub mod agent;
pub mod cleanup;
pub mod cli;
pub mod complexity;
pub mod config;
pub mod error;
pub mod events;
pub mod exec;
pub mod git;
pub mod hooks;
pub mod host;
pub mod notification;
pub mod routing;
pub mod task;
pub mod workspace;

pub use cleanup::CleanupDaemon;
pub use complexity::{ComplexityResult, ComplexityTier, classify, classify_task};
pub use error::{Result, WardenError};
pub use events::EventBus;
pub use exec::{CommandRunner, TokioCommandRunner};
pub use git::GitRunner;
pub use hooks::{HookExecutor, HookRegistry};
pub use host::{GhClient, HostClient};
pub use routing::{resolve_executor_for_task, should_auto_merge};
pub use task::{SizeLabel, Task};
pub use workspace::{Reaper, WorkspaceRegistry};
