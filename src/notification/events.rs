use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Escalation,
    ConflictResolved,
    AutoMerge,
    CiRetrigger,
    SweepCompleted,
    DaemonError,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Escalation => "pr.escalated",
            Self::ConflictResolved => "pr.conflict_resolved",
            Self::AutoMerge => "pr.auto_merged",
            Self::CiRetrigger => "pr.ci_retriggered",
            Self::SweepCompleted => "reaper.sweep_completed",
            Self::DaemonError => "daemon.error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Escalation | Self::DaemonError)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenEvent {
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl WardenEvent {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            created_at: Utc::now(),
            pr_number: None,
            message: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_pr(mut self, number: u64) -> Self {
        self.pr_number = Some(number);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn title(&self) -> String {
        match self.pr_number {
            Some(n) => format!("repo-warden: {} (PR #{n})", self.event_type.as_str()),
            None => format!("repo-warden: {}", self.event_type.as_str()),
        }
    }

    pub fn body(&self) -> String {
        let mut parts = Vec::new();
        if let Some(message) = &self.message {
            parts.push(message.clone());
        }
        for (key, value) in &self.context {
            parts.push(format!("{key}: {value}"));
        }
        parts.join("\n")
    }
}
