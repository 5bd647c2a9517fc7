//! Task model shared by the classifier and the executor router.
//!
//! Tasks arrive from an external tracking store; this crate only reads
//! them, so the model is deliberately lenient: every field beyond `id` and
//! `title` is optional or defaulted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// T-shirt size labels used by the task tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeLabel {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl SizeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xs => "xs",
            Self::S => "s",
            Self::M => "m",
            Self::L => "l",
            Self::Xl => "xl",
            Self::Xxl => "xxl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "xs" => Some(Self::Xs),
            "s" => Some(Self::S),
            "m" => Some(Self::M),
            "l" => Some(Self::L),
            "xl" => Some(Self::Xl),
            "xxl" => Some(Self::Xxl),
            _ => None,
        }
    }

    /// Story-point fallback when no explicit label is present.
    pub fn from_points(points: u32) -> Self {
        match points {
            0..=1 => Self::Xs,
            2..=3 => Self::S,
            4..=5 => Self::M,
            6..=8 => Self::L,
            9..=13 => Self::Xl,
            _ => Self::Xxl,
        }
    }
}

impl std::fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Review,
    Done,
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub size_label: Option<SizeLabel>,

    #[serde(default)]
    pub points: Option<u32>,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Option<u8>,

    #[serde(default)]
    pub branch: Option<String>,

    /// Free-form tracker metadata; the router reads `metadata["size"]` as a
    /// secondary size signal.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            size_label: None,
            points: None,
            status: TaskStatus::Pending,
            priority: None,
            branch: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_size(mut self, size: SizeLabel) -> Self {
        self.size_label = Some(size);
        self
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = Some(points);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Resolved size: explicit label, then points thresholds, then `m`.
    pub fn resolved_size(&self) -> SizeLabel {
        if let Some(label) = self.size_label {
            return label;
        }
        if let Some(points) = self.points {
            return SizeLabel::from_points(points);
        }
        SizeLabel::M
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_resolution_prefers_label_over_points() {
        let task = Task::new("t-1", "anything").with_size(SizeLabel::Xl).with_points(1);
        assert_eq!(task.resolved_size(), SizeLabel::Xl);
    }

    #[test]
    fn size_resolution_falls_back_to_points() {
        let task = Task::new("t-2", "anything").with_points(8);
        assert_eq!(task.resolved_size(), SizeLabel::L);
        let task = Task::new("t-3", "anything").with_points(21);
        assert_eq!(task.resolved_size(), SizeLabel::Xxl);
    }

    #[test]
    fn size_resolution_defaults_to_medium() {
        let task = Task::new("t-4", "anything");
        assert_eq!(task.resolved_size(), SizeLabel::M);
    }

    #[test]
    fn size_label_parse_is_case_insensitive() {
        assert_eq!(SizeLabel::parse("XL"), Some(SizeLabel::Xl));
        assert_eq!(SizeLabel::parse(" xs "), Some(SizeLabel::Xs));
        assert_eq!(SizeLabel::parse("huge"), None);
    }
}
