//! Subprocess execution capability.
//!
//! Everything in this crate that spawns a process (git, the hosting CLI,
//! hooks, the agent delegate) goes through [`CommandRunner`], so tests can
//! substitute a deterministic fake.

mod runner;

pub use runner::{CommandOutput, CommandRequest, CommandRunner, TokioCommandRunner};
