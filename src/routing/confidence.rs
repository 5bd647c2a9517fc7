//! Completion-confidence assessment.
//!
//! Pure function over execution-outcome signals, evaluated in strict
//! priority order; the first matching rule decides the verdict.

use serde::{Deserialize, Serialize};

use crate::complexity::ComplexityTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Failed,
    NeedsReview,
    Confident,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "FAILED",
            Self::NeedsReview => "NEEDS_REVIEW",
            Self::Confident => "CONFIDENT",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signals collected from one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSignals {
    pub tests_pass: bool,
    pub build_clean: bool,
    pub lint_clean: bool,
    pub files_changed: u32,
    pub attempt_count: u32,
    pub complexity_tier: ComplexityTier,
    pub has_test_coverage: bool,
    pub warnings: Vec<String>,
}

impl Default for CompletionSignals {
    fn default() -> Self {
        Self {
            tests_pass: true,
            build_clean: true,
            lint_clean: true,
            files_changed: 0,
            attempt_count: 1,
            complexity_tier: ComplexityTier::Medium,
            has_test_coverage: true,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub verdict: Verdict,
    /// Reason of the first matching rule, for logs.
    pub reason: String,
}

pub fn assess_completion_confidence(signals: &CompletionSignals) -> ConfidenceAssessment {
    if !signals.tests_pass {
        return assessment(Verdict::Failed, "tests failing");
    }
    if !signals.build_clean {
        return assessment(Verdict::Failed, "build failing");
    }
    if !signals.lint_clean {
        return assessment(Verdict::NeedsReview, "lint violations present");
    }
    if signals.attempt_count >= 3 {
        return assessment(Verdict::NeedsReview, "required 3+ attempts");
    }
    if !signals.warnings.is_empty() {
        return assessment(Verdict::NeedsReview, "warnings emitted during execution");
    }
    if signals.complexity_tier == ComplexityTier::High
        && signals.files_changed > 10
        && !signals.has_test_coverage
    {
        return assessment(
            Verdict::NeedsReview,
            "high-complexity change touching many files without test coverage",
        );
    }
    assessment(Verdict::Confident, "all gates passed")
}

pub fn should_auto_merge(signals: &CompletionSignals) -> bool {
    assess_completion_confidence(signals).verdict == Verdict::Confident
}

fn assessment(verdict: Verdict, reason: &str) -> ConfidenceAssessment {
    ConfidenceAssessment {
        verdict,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_tests_dominate_everything() {
        let signals = CompletionSignals {
            tests_pass: false,
            lint_clean: false,
            attempt_count: 5,
            warnings: vec!["deprecated api".into()],
            ..Default::default()
        };
        assert_eq!(assess_completion_confidence(&signals).verdict, Verdict::Failed);
    }

    #[test]
    fn failing_build_is_failed() {
        let signals = CompletionSignals {
            build_clean: false,
            ..Default::default()
        };
        assert_eq!(assess_completion_confidence(&signals).verdict, Verdict::Failed);
    }

    #[test]
    fn dirty_lint_is_never_confident() {
        let signals = CompletionSignals {
            lint_clean: false,
            ..Default::default()
        };
        assert_eq!(
            assess_completion_confidence(&signals).verdict,
            Verdict::NeedsReview
        );
        assert!(!should_auto_merge(&signals));
    }

    #[test]
    fn three_attempts_is_never_confident() {
        let signals = CompletionSignals {
            attempt_count: 3,
            ..Default::default()
        };
        assert_eq!(
            assess_completion_confidence(&signals).verdict,
            Verdict::NeedsReview
        );
    }

    #[test]
    fn warnings_need_review() {
        let signals = CompletionSignals {
            warnings: vec!["unused variable".into()],
            ..Default::default()
        };
        assert_eq!(
            assess_completion_confidence(&signals).verdict,
            Verdict::NeedsReview
        );
    }

    #[test]
    fn wide_uncovered_high_tier_change_needs_review() {
        let signals = CompletionSignals {
            complexity_tier: ComplexityTier::High,
            files_changed: 11,
            has_test_coverage: false,
            ..Default::default()
        };
        assert_eq!(
            assess_completion_confidence(&signals).verdict,
            Verdict::NeedsReview
        );

        // Any one leg of the conjunction missing is fine.
        let covered = CompletionSignals {
            has_test_coverage: true,
            ..signals.clone()
        };
        assert_eq!(
            assess_completion_confidence(&covered).verdict,
            Verdict::Confident
        );
    }

    #[test]
    fn clean_run_auto_merges() {
        let signals = CompletionSignals::default();
        assert_eq!(
            assess_completion_confidence(&signals).verdict,
            Verdict::Confident
        );
        assert!(should_auto_merge(&signals));
    }
}
