//! Static executor/model routing matrix.
//!
//! The matrix is code, not config: routing behavior changes go through
//! review. Per-field overrides from `RoutingConfig` win over matrix entries
//! for the exact `(executor_type, tier)` pair they name.

use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityTier;

/// Static routing configuration for one executor in the fleet.
/// The router never mutates a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorProfile {
    pub name: String,
    pub executor_type: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl ExecutorProfile {
    pub fn new(name: impl Into<String>, executor_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executor_type: executor_type.into(),
            variant: None,
            weight: 1,
            role: None,
            enabled: true,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Effort tracks tier directly; this holds even for executor types the
    /// matrix does not know.
    pub fn for_tier(tier: ComplexityTier) -> Self {
        match tier {
            ComplexityTier::Low => Self::Low,
            ComplexityTier::Medium => Self::Medium,
            ComplexityTier::High => Self::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routing decision out of the matrix (plus overrides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDecision {
    pub model: Option<String>,
    pub variant: Option<String>,
    pub reasoning_effort: ReasoningEffort,
}

/// Per-field override for one exact `(executor_type, tier)` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteOverride {
    pub executor: String,
    pub tier: ComplexityTier,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
}

impl Default for ComplexityTier {
    fn default() -> Self {
        Self::Medium
    }
}

fn matrix_entry(executor_type: &str, tier: ComplexityTier) -> Option<(&'static str, Option<&'static str>)> {
    use ComplexityTier::{High, Low, Medium};
    match (executor_type, tier) {
        ("claude", Low) => Some(("claude-haiku", None)),
        ("claude", Medium) => Some(("claude-sonnet", None)),
        ("claude", High) => Some(("claude-opus", None)),
        ("codex", Low) => Some(("gpt-5-codex", Some("mini"))),
        ("codex", Medium) => Some(("gpt-5-codex", None)),
        ("codex", High) => Some(("gpt-5-codex", Some("max"))),
        ("gemini", Low) => Some(("gemini-flash", None)),
        ("gemini", Medium) => Some(("gemini-pro", None)),
        ("gemini", High) => Some(("gemini-pro", Some("deep-think"))),
        ("opencode", Low) => Some(("anthropic/claude-haiku", None)),
        ("opencode", Medium) => Some(("anthropic/claude-sonnet", None)),
        ("opencode", High) => Some(("anthropic/claude-opus", None)),
        _ => None,
    }
}

/// Matrix lookup with per-field override application. Unknown executor
/// types yield a null model but still carry a tier-derived reasoning effort.
pub fn model_for_complexity(
    executor_type: &str,
    tier: ComplexityTier,
    overrides: &[RouteOverride],
) -> ModelDecision {
    let (model, variant) = match matrix_entry(executor_type, tier) {
        Some((m, v)) => (Some(m.to_string()), v.map(String::from)),
        None => (None, None),
    };

    let mut decision = ModelDecision {
        model,
        variant,
        reasoning_effort: ReasoningEffort::for_tier(tier),
    };

    for o in overrides {
        if o.executor == executor_type && o.tier == tier {
            if let Some(model) = &o.model {
                decision.model = Some(model.clone());
            }
            if let Some(variant) = &o.variant {
                decision.variant = Some(variant.clone());
            }
            if let Some(effort) = o.reasoning_effort {
                decision.reasoning_effort = effort;
            }
        }
    }

    decision
}

/// Executor types the matrix knows about.
pub const KNOWN_EXECUTOR_TYPES: &[&str] = &["claude", "codex", "gemini", "opencode"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_pair_resolves() {
        for executor in KNOWN_EXECUTOR_TYPES {
            for tier in [ComplexityTier::Low, ComplexityTier::Medium, ComplexityTier::High] {
                let decision = model_for_complexity(executor, tier, &[]);
                assert!(
                    decision.model.is_some(),
                    "expected model for ({executor}, {tier})"
                );
            }
        }
    }

    #[test]
    fn unknown_executor_gets_effort_but_no_model() {
        let decision = model_for_complexity("cursor", ComplexityTier::High, &[]);
        assert!(decision.model.is_none());
        assert_eq!(decision.reasoning_effort, ReasoningEffort::High);
    }

    #[test]
    fn override_fields_win_exactly() {
        let overrides = vec![RouteOverride {
            executor: "codex".into(),
            tier: ComplexityTier::High,
            model: Some("o4-preview".into()),
            variant: None,
            reasoning_effort: None,
        }];

        let hit = model_for_complexity("codex", ComplexityTier::High, &overrides);
        assert_eq!(hit.model.as_deref(), Some("o4-preview"));
        // Unnamed fields keep their matrix values.
        assert_eq!(hit.variant.as_deref(), Some("max"));
        assert_eq!(hit.reasoning_effort, ReasoningEffort::High);

        // A different tier of the same executor is untouched.
        let miss = model_for_complexity("codex", ComplexityTier::Low, &overrides);
        assert_eq!(miss.model.as_deref(), Some("gpt-5-codex"));
    }

    #[test]
    fn effort_tracks_tier() {
        assert_eq!(ReasoningEffort::for_tier(ComplexityTier::Low), ReasoningEffort::Low);
        assert_eq!(ReasoningEffort::for_tier(ComplexityTier::High), ReasoningEffort::High);
    }
}
