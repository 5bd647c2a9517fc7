use serde::{Deserialize, Serialize};

/// The closed set of lifecycle events hooks can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    SessionStart,
    SessionStop,
    PrePush,
    PostPush,
    PreCommit,
    PostCommit,
    PrePr,
    PostPr,
    TaskComplete,
    PreToolUse,
    PostToolUse,
    SubagentStart,
    SubagentStop,
}

impl HookEvent {
    pub const ALL: [HookEvent; 13] = [
        Self::SessionStart,
        Self::SessionStop,
        Self::PrePush,
        Self::PostPush,
        Self::PreCommit,
        Self::PostCommit,
        Self::PrePr,
        Self::PostPr,
        Self::TaskComplete,
        Self::PreToolUse,
        Self::PostToolUse,
        Self::SubagentStart,
        Self::SubagentStop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStart => "session-start",
            Self::SessionStop => "session-stop",
            Self::PrePush => "pre-push",
            Self::PostPush => "post-push",
            Self::PreCommit => "pre-commit",
            Self::PostCommit => "post-commit",
            Self::PrePr => "pre-pr",
            Self::PostPr => "post-pr",
            Self::TaskComplete => "task-complete",
            Self::PreToolUse => "pre-tool-use",
            Self::PostToolUse => "post-tool-use",
            Self::SubagentStart => "subagent-start",
            Self::SubagentStop => "subagent-stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.as_str() == s)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
