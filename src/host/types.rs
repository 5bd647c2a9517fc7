use serde::{Deserialize, Serialize};

/// The platform's computed three-way-merge feasibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeableState {
    Mergeable,
    Conflicting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MergeableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mergeable => "MERGEABLE",
            Self::Conflicting => "CONFLICTING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for MergeableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckState {
    Success,
    Failure,
    #[serde(other)]
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub name: String,
    pub state: CheckState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head_ref: String,
    pub base_ref: String,
    #[serde(default)]
    pub mergeable: MergeableState,
    #[serde(default)]
    pub status_checks: Vec<StatusCheck>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub auto_merge_requested: bool,
}

impl PullRequest {
    pub fn has_failing_check(&self) -> bool {
        self.status_checks
            .iter()
            .any(|c| c.state == CheckState::Failure)
    }

    /// True when every check reports success. Vacuously true when no
    /// checks are configured.
    pub fn all_checks_green(&self) -> bool {
        self.status_checks
            .iter()
            .all(|c| c.state == CheckState::Success)
    }

    pub fn has_pending_check(&self) -> bool {
        self.status_checks
            .iter()
            .any(|c| c.state == CheckState::Pending)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// One changed file from the platform's diff query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrFile {
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
}

impl PrFile {
    pub fn changed_lines(&self) -> u32 {
        self.additions + self.deletions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pr(checks: &[CheckState]) -> PullRequest {
        PullRequest {
            number: 1,
            title: "t".into(),
            head_ref: "head".into(),
            base_ref: "main".into(),
            mergeable: MergeableState::Mergeable,
            status_checks: checks
                .iter()
                .enumerate()
                .map(|(i, s)| StatusCheck {
                    name: format!("check-{i}"),
                    state: *s,
                })
                .collect(),
            labels: Vec::new(),
            auto_merge_requested: false,
        }
    }

    #[test]
    fn check_rollups() {
        let green = pr(&[CheckState::Success, CheckState::Success]);
        assert!(green.all_checks_green());
        assert!(!green.has_failing_check());

        let failing = pr(&[CheckState::Success, CheckState::Failure]);
        assert!(failing.has_failing_check());
        assert!(!failing.all_checks_green());

        let pending = pr(&[CheckState::Success, CheckState::Pending]);
        assert!(pending.has_pending_check());
        assert!(!pending.all_checks_green());
        assert!(!pending.has_failing_check());
    }

    #[test]
    fn no_checks_is_vacuously_green() {
        assert!(pr(&[]).all_checks_green());
    }
}
