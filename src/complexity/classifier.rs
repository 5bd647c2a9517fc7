//! Task complexity classification.
//!
//! Pure function from task metadata to a tier: resolve size, map to a base
//! tier, then apply the keyword rule table. Matching escalators and
//! simplifiers cancel; a net signal moves the tier exactly one step, with
//! `high` as ceiling and `low` as floor.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::task::{SizeLabel, Task};

use super::rules::{self, Effect};

/// Complexity tier for routing tasks to execution paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
}

impl ComplexityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// One step up; already-high is a ceiling.
    pub fn escalated(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    /// One step down; already-low is a floor.
    pub fn simplified(self) -> Self {
        match self {
            Self::High => Self::Medium,
            Self::Medium | Self::Low => Self::Low,
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one classification call. Derived fresh every time; never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityResult {
    pub tier: ComplexityTier,
    pub size_label: SizeLabel,
    /// True iff the keyword rules moved the tier off its size-derived base.
    pub adjusted: bool,
}

/// Size-derived base tier before any keyword adjustment.
pub fn base_tier(size: SizeLabel) -> ComplexityTier {
    match size {
        SizeLabel::Xs | SizeLabel::S => ComplexityTier::Low,
        SizeLabel::M => ComplexityTier::Medium,
        SizeLabel::L | SizeLabel::Xl | SizeLabel::Xxl => ComplexityTier::High,
    }
}

/// Classify with an explicit size (the router resolves size from several
/// signals before calling this).
pub fn classify(size: SizeLabel, title: &str, description: &str) -> ComplexityResult {
    let text = format!("{}\n{}", title, description).to_lowercase();
    let matched = rules::matched_rules(&text);

    let has_escalator = matched.iter().any(|r| r.effect == Effect::Escalate);
    let has_simplifier = matched.iter().any(|r| r.effect == Effect::Simplify);

    let base = base_tier(size);
    // Opposite families cancel; a net signal moves exactly one step.
    let tier = match (has_escalator, has_simplifier) {
        (true, false) => base.escalated(),
        (false, true) => base.simplified(),
        _ => base,
    };

    if !matched.is_empty() {
        debug!(
            size = %size,
            base = %base,
            tier = %tier,
            rules = ?matched.iter().map(|r| r.name).collect::<Vec<_>>(),
            "Complexity rules matched"
        );
    }

    ComplexityResult {
        tier,
        size_label: size,
        adjusted: tier != base,
    }
}

/// Classify a task using its own resolved size.
pub fn classify_task(task: &Task) -> ComplexityResult {
    classify(task.resolved_size(), &task.title, &task.description)
}
