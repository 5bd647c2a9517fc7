//! Per-task executor/model resolution.
//!
//! Pulls a size signal out of the task, classifies, then consults the
//! static matrix with config overrides applied. Routing can be switched
//! off entirely; that is a valid mode, not an error — the executor
//! identity still comes back, just without a complexity or model.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::complexity::{self, ComplexityResult};
use crate::task::{SizeLabel, Task};

use super::matrix::{ExecutorProfile, ReasoningEffort, RouteOverride, model_for_complexity};

/// Routing section of the warden config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub enabled: bool,
    pub overrides: Vec<RouteOverride>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            overrides: Vec::new(),
        }
    }
}

/// One resolved route for one task. `original` keeps the untouched profile
/// so callers can fall back to its static settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRoute {
    pub executor: String,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub complexity: Option<ComplexityResult>,
    pub original: ExecutorProfile,
}

/// Size signal priority: explicit label, tracker metadata, a bracketed
/// title prefix (`[xl] ...`), then story points. Defaults to `m`.
pub fn extract_size_signal(task: &Task) -> SizeLabel {
    if let Some(label) = task.size_label {
        return label;
    }
    if let Some(label) = task.metadata.get("size").and_then(|s| SizeLabel::parse(s)) {
        return label;
    }
    if let Some(label) = title_size_token(&task.title) {
        return label;
    }
    if let Some(points) = task.points {
        return SizeLabel::from_points(points);
    }
    SizeLabel::M
}

fn title_size_token(title: &str) -> Option<SizeLabel> {
    let rest = title.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    SizeLabel::parse(&rest[..end])
}

pub fn resolve_executor_for_task(
    task: &Task,
    profile: &ExecutorProfile,
    config: &RoutingConfig,
) -> ResolvedRoute {
    if !config.enabled {
        debug!(task = %task.id, executor = %profile.executor_type, "Routing disabled");
        return ResolvedRoute {
            executor: profile.executor_type.clone(),
            model: None,
            variant: profile.variant.clone(),
            reasoning_effort: None,
            complexity: None,
            original: profile.clone(),
        };
    }

    let size = extract_size_signal(task);
    let result = complexity::classify(size, &task.title, &task.description);
    let decision = model_for_complexity(&profile.executor_type, result.tier, &config.overrides);

    debug!(
        task = %task.id,
        executor = %profile.executor_type,
        tier = %result.tier,
        model = decision.model.as_deref().unwrap_or("none"),
        "Resolved executor route"
    );

    ResolvedRoute {
        executor: profile.executor_type.clone(),
        model: decision.model,
        variant: decision.variant.or_else(|| profile.variant.clone()),
        reasoning_effort: Some(decision.reasoning_effort),
        complexity: Some(result),
        original: profile.clone(),
    }
}

/// Stable one-line rendering of a routing decision for logs.
pub fn format_complexity_decision(route: &ResolvedRoute) -> String {
    let Some(complexity) = &route.complexity else {
        return "complexity=disabled".to_string();
    };

    let mut out = format!(
        "complexity={} size={} model={} reasoning={} executor={}",
        complexity.tier,
        complexity.size_label,
        route.model.as_deref().unwrap_or("none"),
        route
            .reasoning_effort
            .map(|e| e.as_str())
            .unwrap_or("none"),
        route.executor,
    );
    if complexity.adjusted {
        out.push_str(" adjusted=true");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complexity::ComplexityTier;

    fn profile(executor: &str) -> ExecutorProfile {
        ExecutorProfile::new("fleet-1", executor)
    }

    #[test]
    fn size_signal_priority_order() {
        let task = Task::new("t-1", "[xl] migrate schema")
            .with_size(SizeLabel::S)
            .with_metadata("size", "l")
            .with_points(13);
        assert_eq!(extract_size_signal(&task), SizeLabel::S);

        let task = Task::new("t-2", "[xl] migrate schema")
            .with_metadata("size", "l")
            .with_points(13);
        assert_eq!(extract_size_signal(&task), SizeLabel::L);

        let task = Task::new("t-3", "[xl] migrate schema").with_points(13);
        assert_eq!(extract_size_signal(&task), SizeLabel::Xl);

        let task = Task::new("t-4", "migrate schema").with_points(13);
        assert_eq!(extract_size_signal(&task), SizeLabel::Xl);

        let task = Task::new("t-5", "migrate schema");
        assert_eq!(extract_size_signal(&task), SizeLabel::M);
    }

    #[test]
    fn bracketed_token_must_be_a_size() {
        let task = Task::new("t-6", "[WIP] migrate schema");
        assert_eq!(extract_size_signal(&task), SizeLabel::M);
    }

    #[test]
    fn resolves_model_from_matrix() {
        let task = Task::new("t-7", "add endpoint").with_size(SizeLabel::M);
        let route = resolve_executor_for_task(&task, &profile("claude"), &RoutingConfig::default());

        assert_eq!(route.executor, "claude");
        assert_eq!(route.model.as_deref(), Some("claude-sonnet"));
        assert_eq!(route.complexity.unwrap().tier, ComplexityTier::Medium);
        assert_eq!(route.reasoning_effort, Some(ReasoningEffort::Medium));
    }

    #[test]
    fn disabled_routing_keeps_executor_identity() {
        let config = RoutingConfig {
            enabled: false,
            overrides: Vec::new(),
        };
        let task = Task::new("t-8", "add endpoint").with_size(SizeLabel::Xl);
        let route = resolve_executor_for_task(&task, &profile("claude"), &config);

        assert_eq!(route.executor, "claude");
        assert!(route.model.is_none());
        assert!(route.complexity.is_none());
        assert!(route.reasoning_effort.is_none());
    }

    #[test]
    fn formats_decision_line() {
        let task = Task::new("t-9", "refactor auth flow").with_size(SizeLabel::S);
        let route = resolve_executor_for_task(&task, &profile("codex"), &RoutingConfig::default());
        assert_eq!(
            format_complexity_decision(&route),
            "complexity=medium size=s model=gpt-5-codex reasoning=medium executor=codex adjusted=true"
        );
    }

    #[test]
    fn formats_disabled_decision() {
        let config = RoutingConfig {
            enabled: false,
            overrides: Vec::new(),
        };
        let task = Task::new("t-10", "anything");
        let route = resolve_executor_for_task(&task, &profile("claude"), &config);
        assert_eq!(format_complexity_decision(&route), "complexity=disabled");
    }
}
