use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Leased,
}

/// A time-bounded exclusive claim on one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub owner: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Lease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// One shared workspace. A record carries at most one active lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
}

impl WorkspaceRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
            region: None,
            availability: Availability::Available,
            lease: None,
        }
    }
}

/// The durable registry document, single source of truth for leases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub version: u32,
    pub registry_name: String,
    pub default_lease_ttl_minutes: i64,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceRecord>,
}

impl RegistryDocument {
    pub fn new(registry_name: impl Into<String>, default_lease_ttl_minutes: i64) -> Self {
        Self {
            version: REGISTRY_VERSION,
            registry_name: registry_name.into(),
            default_lease_ttl_minutes,
            workspaces: Vec::new(),
        }
    }

    pub fn workspace(&self, id: &str) -> Option<&WorkspaceRecord> {
        self.workspaces.iter().find(|w| w.id == id)
    }

    pub fn workspace_mut(&mut self, id: &str) -> Option<&mut WorkspaceRecord> {
        self.workspaces.iter_mut().find(|w| w.id == id)
    }
}
