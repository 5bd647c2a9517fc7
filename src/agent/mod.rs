//! Opaque autonomous-agent boundary.

mod delegate;

pub use delegate::{AgentDelegate, ConflictRequest, SubprocessDelegate};
