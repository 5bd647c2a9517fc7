//! Declarative keyword rules feeding the complexity classifier.
//!
//! Each rule is a named trigger with an effect direction. The classifier
//! only cares which *families* matched; individual rules stay addressable
//! so tests can pin them down one by one.

use std::sync::OnceLock;

use regex::Regex;

/// Direction a matched rule pushes the base tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Escalate,
    Simplify,
}

/// How a rule decides it applies to a task's text.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Any of these substrings present in the lowercased title+description.
    AnyKeyword(&'static [&'static str]),
    /// An "Est. LOC" figure in the description exceeding the threshold.
    EstimatedLocOver(u32),
    /// A parsed "<N> files" count at or above the threshold.
    AffectedFilesAtLeast(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub effect: Effect,
    pub trigger: Trigger,
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "architecture",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["architecture", "architectural", "refactor"]),
    },
    Rule {
        name: "security",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["security", "encryption", "audit"]),
    },
    Rule {
        name: "coordination",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&[
            "consensus",
            "determinism",
            "deterministic",
            "state machine",
            "state-machine",
        ]),
    },
    Rule {
        name: "load-test",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["load test", "load-test", "stress test", "stress-test"]),
    },
    Rule {
        name: "service-mesh",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["service mesh"]),
    },
    Rule {
        name: "circuit-breaker",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["circuit breaker"]),
    },
    Rule {
        name: "disaster-recovery",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["disaster recovery", "disaster-recovery"]),
    },
    Rule {
        name: "critical",
        effect: Effect::Escalate,
        trigger: Trigger::AnyKeyword(&["critical"]),
    },
    Rule {
        name: "estimated-loc",
        effect: Effect::Escalate,
        trigger: Trigger::EstimatedLocOver(3_000),
    },
    Rule {
        name: "affected-files",
        effect: Effect::Escalate,
        trigger: Trigger::AffectedFilesAtLeast(10),
    },
    Rule {
        name: "typo-only",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["typo"]),
    },
    Rule {
        name: "docs-only",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["docs only", "docs-only", "documentation only"]),
    },
    Rule {
        name: "version-bump",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["version bump", "bump version", "dependency bump"]),
    },
    Rule {
        name: "lint-only",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["lint only", "lint-only", "lint fix", "fix lint"]),
    },
    Rule {
        name: "plan-next",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["plan next tasks"]),
    },
    Rule {
        name: "manual-triage",
        effect: Effect::Simplify,
        trigger: Trigger::AnyKeyword(&["manual triage", "manual-triage"]),
    },
];

static EST_LOC_PATTERN: OnceLock<Regex> = OnceLock::new();
static FILE_COUNT_PATTERN: OnceLock<Regex> = OnceLock::new();

fn est_loc_pattern() -> &'static Regex {
    EST_LOC_PATTERN.get_or_init(|| {
        Regex::new(r"est\.?\s*loc:?\s*~?([0-9][0-9,]*)").unwrap()
    })
}

fn file_count_pattern() -> &'static Regex {
    FILE_COUNT_PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]+)\+?\s*(?:affected\s+)?files?\b").unwrap()
    })
}

/// Largest "Est. LOC" figure found in the text, if any.
pub fn parse_estimated_loc(text: &str) -> Option<u32> {
    est_loc_pattern()
        .captures_iter(text)
        .filter_map(|c| c[1].replace(',', "").parse::<u32>().ok())
        .max()
}

/// Largest "<N> files" count found in the text, if any.
pub fn parse_file_count(text: &str) -> Option<u32> {
    file_count_pattern()
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
}

impl Rule {
    /// `text` must already be lowercased; the scan is case-insensitive by
    /// construction.
    pub fn matches(&self, text: &str) -> bool {
        match self.trigger {
            Trigger::AnyKeyword(keywords) => keywords.iter().any(|k| text.contains(k)),
            Trigger::EstimatedLocOver(threshold) => {
                parse_estimated_loc(text).is_some_and(|loc| loc > threshold)
            }
            Trigger::AffectedFilesAtLeast(threshold) => {
                parse_file_count(text).is_some_and(|n| n >= threshold)
            }
        }
    }
}

/// All rules matching the given lowercased text, in declaration order.
pub fn matched_rules(text: &str) -> Vec<&'static Rule> {
    RULES.iter().filter(|r| r.matches(text)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_rules_match_substrings() {
        let matched = matched_rules("refactor the payment architecture");
        assert!(matched.iter().any(|r| r.name == "architecture"));
    }

    #[test]
    fn est_loc_parses_commas_and_tilde() {
        assert_eq!(parse_estimated_loc("est. loc: ~4,500 across modules"), Some(4500));
        assert_eq!(parse_estimated_loc("est loc 120"), Some(120));
        assert_eq!(parse_estimated_loc("no figure here"), None);
    }

    #[test]
    fn est_loc_respects_threshold() {
        let rule = RULES.iter().find(|r| r.name == "estimated-loc").unwrap();
        assert!(rule.matches("est. loc: 3001"));
        assert!(!rule.matches("est. loc: 3000"));
        assert!(!rule.matches("est. loc: 250"));
    }

    #[test]
    fn file_count_takes_largest_mention() {
        assert_eq!(parse_file_count("touches 3 files here and 12 files there"), Some(12));
        assert_eq!(parse_file_count("14 affected files"), Some(14));
        assert_eq!(parse_file_count("the files module"), None);
        // "filesystem" must not read as a file count.
        assert_eq!(parse_file_count("10 filesystem changes"), None);
        assert_eq!(parse_file_count("4 files."), Some(4));
    }

    #[test]
    fn affected_files_threshold_is_inclusive() {
        let rule = RULES.iter().find(|r| r.name == "affected-files").unwrap();
        assert!(rule.matches("10 files"));
        assert!(!rule.matches("9 files"));
    }

    #[test]
    fn simplifier_rules_match() {
        let matched = matched_rules("fix typo in readme");
        assert!(matched.iter().any(|r| r.name == "typo-only"));
        assert!(matched.iter().all(|r| r.effect == Effect::Simplify));
    }
}
