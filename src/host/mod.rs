//! Hosting-platform boundary: PR wire model and the `gh` CLI client.

mod client;
mod types;

pub use client::{GhClient, HostClient};
pub use types::{CheckState, MergeableState, PrFile, PullRequest, StatusCheck};
