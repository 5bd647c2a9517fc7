//! Append-only NDJSON audit log of registry mutations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Claimed,
    Renewed,
    Released,
    Reaped,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Renewed => "renewed",
            Self::Released => "released",
            Self::Reaped => "reaped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub action: AuditAction,
    pub workspace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, workspace_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            action,
            workspace_id: workspace_id.into(),
            owner: None,
            note: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single NDJSON line.
    pub async fn append(&self, record: &AuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;

        debug!(
            action = ?record.action,
            workspace = %record.workspace_id,
            "Appended audit record"
        );
        Ok(())
    }

    /// Last `n` records, oldest first. Corrupt lines are skipped.
    pub async fn read_tail(&self, n: usize) -> Result<Vec<AuditRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<AuditRecord> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupt audit line");
                    None
                }
            })
            .collect();

        let skip = records.len().saturating_sub(n);
        Ok(records.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn append_and_tail_round_trip() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.ndjson"));

        for i in 0..5 {
            let record = AuditRecord::new(AuditAction::Claimed, format!("ws-{i}"), Utc::now())
                .with_owner("agent-1");
            log.append(&record).await.unwrap();
        }

        let tail = log.read_tail(2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].workspace_id, "ws-3");
        assert_eq!(tail[1].workspace_id, "ws-4");
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.ndjson");
        let log = AuditLog::new(&path);

        log.append(&AuditRecord::new(AuditAction::Released, "ws-1", Utc::now()))
            .await
            .unwrap();
        tokio::fs::write(
            &path,
            format!(
                "{}not json\n",
                tokio::fs::read_to_string(&path).await.unwrap()
            ),
        )
        .await
        .unwrap();

        let tail = log.read_tail(10).await.unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("nope.ndjson"));
        assert!(log.read_tail(10).await.unwrap().is_empty());
    }
}
