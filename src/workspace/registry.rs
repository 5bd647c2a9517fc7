//! Durable JSON-backed lease registry.
//!
//! Every mutation is a read-modify-write-persist cycle under one async
//! mutex (single-writer discipline), with atomic tmp-then-rename writes
//! and one audit record appended per mutation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, WardenError};
use crate::events::{Channel, EventBus};

use super::audit::{AuditAction, AuditLog, AuditRecord};
use super::types::{Availability, Lease, RegistryDocument, WorkspaceRecord};

pub struct WorkspaceRegistry {
    path: PathBuf,
    audit: AuditLog,
    write_lock: Mutex<()>,
    bus: Option<EventBus>,
}

impl WorkspaceRegistry {
    pub fn new(path: impl Into<PathBuf>, audit_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            audit: AuditLog::new(audit_path),
            write_lock: Mutex::new(()),
            bus: None,
        }
    }

    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    fn publish_change(&self) {
        if let Some(bus) = &self.bus {
            bus.publish(vec![Channel::Workspaces]);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Write a starter document unless one already exists.
    pub async fn init(&self, registry_name: &str, default_ttl_minutes: i64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.path.exists() {
            return Ok(false);
        }
        let document = RegistryDocument::new(registry_name, default_ttl_minutes);
        self.persist(&document).await?;
        info!(path = %self.path.display(), "Initialized workspace registry");
        Ok(true)
    }

    pub async fn load(&self) -> Result<RegistryDocument> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WardenError::Config(format!(
                    "workspace registry not found at {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn list(&self) -> Result<Vec<WorkspaceRecord>> {
        Ok(self.load().await?.workspaces)
    }

    /// Add a workspace record. Fails on a duplicate id.
    pub async fn add_workspace(&self, record: WorkspaceRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        if document.workspace(&record.id).is_some() {
            return Err(WardenError::Config(format!(
                "workspace {} already registered",
                record.id
            )));
        }
        document.workspaces.push(record);
        self.persist(&document).await
    }

    /// Claim an available workspace for `owner`. An existing lease is a
    /// hard rejection, never an overwrite.
    pub async fn claim(
        &self,
        workspace_id: &str,
        owner: &str,
        ttl_minutes: Option<i64>,
        now: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<WorkspaceRecord> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let ttl = ttl_minutes.unwrap_or(document.default_lease_ttl_minutes);

        let record = document
            .workspace_mut(workspace_id)
            .ok_or_else(|| WardenError::WorkspaceNotFound(workspace_id.to_string()))?;

        if record.availability == Availability::Leased {
            let holder = record
                .lease
                .as_ref()
                .map(|l| l.owner.clone())
                .unwrap_or_default();
            return Err(WardenError::WorkspaceLeased {
                id: workspace_id.to_string(),
                owner: holder,
            });
        }

        record.availability = Availability::Leased;
        record.lease = Some(Lease {
            owner: owner.to_string(),
            expires_at: now + Duration::minutes(ttl),
            note: note.clone(),
        });
        let claimed = record.clone();

        self.persist(&document).await?;
        let mut audit = AuditRecord::new(AuditAction::Claimed, workspace_id, now).with_owner(owner);
        if let Some(note) = note {
            audit = audit.with_note(note);
        }
        self.audit.append(&audit).await?;

        info!(workspace = %workspace_id, owner = %owner, ttl_minutes = ttl, "Claimed workspace");
        self.publish_change();
        Ok(claimed)
    }

    /// Extend an existing lease, optionally reassigning the owner.
    pub async fn renew(
        &self,
        workspace_id: &str,
        owner: Option<&str>,
        ttl_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<WorkspaceRecord> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.load().await?;
        let ttl = ttl_minutes.unwrap_or(document.default_lease_ttl_minutes);

        let record = document
            .workspace_mut(workspace_id)
            .ok_or_else(|| WardenError::WorkspaceNotFound(workspace_id.to_string()))?;

        let lease = record
            .lease
            .as_mut()
            .ok_or_else(|| WardenError::LeaseMissing(workspace_id.to_string()))?;

        if let Some(owner) = owner {
            lease.owner = owner.to_string();
        }
        lease.expires_at = now + Duration::minutes(ttl);
        let lease_owner = lease.owner.clone();
        let renewed = record.clone();

        self.persist(&document).await?;
        self.audit
            .append(&AuditRecord::new(AuditAction::Renewed, workspace_id, now).with_owner(&lease_owner))
            .await?;

        debug!(workspace = %workspace_id, owner = %lease_owner, "Renewed lease");
        self.publish_change();
        Ok(renewed)
    }

    /// Clear the lease and restore availability. Idempotent: releasing a
    /// workspace with no lease returns `false` without error.
    pub async fn release(&self, workspace_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.release_locked(workspace_id, now, AuditAction::Released)
            .await
    }

    /// Release every workspace whose lease expired before `now`. Returns
    /// the ids released. Used by the reaper's lease phase.
    pub async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let _guard = self.write_lock.lock().await;
        let document = self.load().await?;
        let expired: Vec<String> = document
            .workspaces
            .iter()
            .filter(|w| w.lease.as_ref().is_some_and(|l| l.is_expired(now)))
            .map(|w| w.id.clone())
            .collect();

        for id in &expired {
            self.release_locked(id, now, AuditAction::Reaped).await?;
        }
        Ok(expired)
    }

    async fn release_locked(
        &self,
        workspace_id: &str,
        now: DateTime<Utc>,
        action: AuditAction,
    ) -> Result<bool> {
        let mut document = self.load().await?;
        let record = document
            .workspace_mut(workspace_id)
            .ok_or_else(|| WardenError::WorkspaceNotFound(workspace_id.to_string()))?;

        let Some(lease) = record.lease.take() else {
            record.availability = Availability::Available;
            return Ok(false);
        };
        record.availability = Availability::Available;

        self.persist(&document).await?;
        self.audit
            .append(&AuditRecord::new(action, workspace_id, now).with_owner(&lease.owner))
            .await?;

        info!(workspace = %workspace_id, owner = %lease.owner, action = ?action, "Released lease");
        self.publish_change();
        Ok(true)
    }

    async fn persist(&self, document: &RegistryDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &content).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(path = %self.path.display(), "Persisted workspace registry");
        Ok(())
    }
}
