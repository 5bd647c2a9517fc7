//! Task complexity classification.
//!
//! - `classifier`: size resolution + tier mapping + rule application
//! - `rules`: the declarative escalator/simplifier table

mod classifier;
pub mod rules;

pub use classifier::{ComplexityResult, ComplexityTier, base_tier, classify, classify_task};
