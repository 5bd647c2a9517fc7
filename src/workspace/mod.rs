//! Shared-workspace lease registry and reaper.
//!
//! - `types`: registry document, workspace records, leases
//! - `registry`: single-writer claim/renew/release over a JSON file
//! - `audit`: append-only NDJSON audit log
//! - `reaper`: expired-lease and orphaned-worktree sweep

mod audit;
mod registry;
mod reaper;
mod types;

pub use audit::{AuditAction, AuditLog, AuditRecord};
pub use reaper::{
    LeaseSweep, PID_MARKER_FILE, Reaper, ReaperConfig, ReaperMetrics, SweepResult, WorktreeSweep,
    calculate_reaper_metrics, format_reaper_results, pid_is_alive, worktree_skip_reason,
};
pub use registry::WorkspaceRegistry;
pub use types::{Availability, Lease, REGISTRY_VERSION, RegistryDocument, WorkspaceRecord};
