//! Tenant record — the multi-tenant isolation boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::TenantId;

/// Tenant lifecycle status.
///
/// Only `Active` tenants may ever be bound as the scoping target of a new
/// session; every entry point that binds a tenant re-checks this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl core::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Inactive => write!(f, "inactive"),
            TenantStatus::Suspended => write!(f, "suspended"),
        }
    }
}

/// An isolated customer/organization whose data must not be visible
/// cross-tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// URL-safe unique identifier (subdomain / path slug).
    pub slug: String,
    /// Optional dedicated domain, unique when present.
    pub domain: Option<String>,
    pub name: String,
    pub status: TenantStatus,
    pub plan: String,
    pub max_users: u32,
    pub max_storage_mb: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TenantId::new(),
            slug: slug.into(),
            domain: None,
            name: name.into(),
            status: TenantStatus::Active,
            plan: "standard".to_string(),
            max_users: 25,
            max_storage_mb: 10_240,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this tenant may be bound as the active scoping target for a
    /// new session. Expired tenants are not selectable even while `Active`.
    pub fn is_selectable(&self, now: DateTime<Utc>) -> bool {
        if self.status != TenantStatus::Active {
            return false;
        }
        match self.expires_at {
            Some(expires) => expires > now,
            None => true,
        }
    }

    pub fn summary(&self) -> TenantSummary {
        TenantSummary {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
        }
    }
}

/// The session snapshot shape stored under the `current_tenant` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub slug: String,
    pub name: String,
    pub domain: Option<String>,
}
