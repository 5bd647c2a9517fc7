//! Executor/model routing and merge-readiness assessment.
//!
//! - `matrix`: the static `(executor_type, tier)` decision table
//! - `resolver`: per-task route resolution and size-signal extraction
//! - `confidence`: completion-confidence verdicts

mod confidence;
mod matrix;
mod resolver;

pub use confidence::{
    CompletionSignals, ConfidenceAssessment, Verdict, assess_completion_confidence,
    should_auto_merge,
};
pub use matrix::{
    ExecutorProfile, KNOWN_EXECUTOR_TYPES, ModelDecision, ReasoningEffort, RouteOverride,
    model_for_complexity,
};
pub use resolver::{
    ResolvedRoute, RoutingConfig, extract_size_signal, format_complexity_decision,
    resolve_executor_for_task,
};
