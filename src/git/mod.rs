//! Git porcelain wrapper over the injectable command runner.

mod runner;

pub use runner::{GitRunner, MergeOutcome, WorktreeInfo};
