//! Session context markers and the session-key wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatekeeper_core::{TenantId, UserId};

use crate::session::{SessionExt, SessionStore};

/// Session keys written by the guards.
///
/// These names are a wire contract: any reimplementation must match them
/// exactly for sessions to interoperate.
pub mod session_keys {
    /// `"landlord" | "tenant"`: the active base context.
    pub const CURRENT_CONTEXT: &str = "current_context";
    /// [`gatekeeper_core::TenantSummary`] of the bound tenant.
    pub const CURRENT_TENANT: &str = "current_tenant";
    /// Bare tenant id, kept alongside the summary for cheap lookups.
    pub const CURRENT_TENANT_ID: &str = "current_tenant_id";
    /// [`super::LandlordUserSnapshot`].
    pub const LANDLORD_USER: &str = "landlord_user";
    /// [`super::TenantUserSnapshot`].
    pub const TENANT_USER: &str = "tenant_user";
    /// [`super::ImpersonationRecord`]; present only while impersonating.
    pub const LANDLORD_IMPERSONATING_TENANT: &str = "landlord_impersonating_tenant";
    /// Bool, super-admin only.
    pub const LANDLORD_DEBUG_MODE: &str = "landlord_debug_mode";

    /// Every key the guards may write. `logout_all` sweeps this list.
    pub const ALL: &[&str] = &[
        CURRENT_CONTEXT,
        CURRENT_TENANT,
        CURRENT_TENANT_ID,
        LANDLORD_USER,
        TENANT_USER,
        LANDLORD_IMPERSONATING_TENANT,
        LANDLORD_DEBUG_MODE,
    ];
}

/// The active base identity kind for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthContext {
    #[default]
    None,
    Landlord,
    Tenant,
}

impl AuthContext {
    /// The marker value stored under `current_context`; `None` is the
    /// absence of the key, never a stored value.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            AuthContext::None => None,
            AuthContext::Landlord => Some("landlord"),
            AuthContext::Tenant => Some("tenant"),
        }
    }

    pub fn from_session(session: &dyn SessionStore) -> Self {
        match session.get(session_keys::CURRENT_CONTEXT) {
            Some(value) => match value.as_str() {
                Some("landlord") => AuthContext::Landlord,
                Some("tenant") => AuthContext::Tenant,
                _ => AuthContext::None,
            },
            None => AuthContext::None,
        }
    }
}

impl core::fmt::Display for AuthContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.marker().unwrap_or("none"))
    }
}

/// Stored under `landlord_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandlordUserSnapshot {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_landlord: bool,
    pub login_at: DateTime<Utc>,
}

/// Stored under `tenant_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUserSnapshot {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub tenant_id: Option<TenantId>,
    pub is_tenant: bool,
    pub login_at: DateTime<Utc>,
}

/// Stored under `landlord_impersonating_tenant`.
///
/// Lives only in the landlord's session: created by `impersonate_tenant`,
/// destroyed by `stop_tenant_impersonation` or `logout_all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpersonationRecord {
    pub tenant_id: TenantId,
    pub tenant_name: String,
    pub started_at: DateTime<Utc>,
    /// Always `"landlord"`; impersonation never starts from any other
    /// context.
    pub original_context: String,
}

impl ImpersonationRecord {
    pub fn start(tenant_id: TenantId, tenant_name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            tenant_name: tenant_name.into(),
            started_at: Utc::now(),
            original_context: "landlord".to_string(),
        }
    }
}

/// Read the impersonation record, if any.
pub fn impersonation_record(session: &dyn SessionStore) -> Option<ImpersonationRecord> {
    session.get_as(session_keys::LANDLORD_IMPERSONATING_TENANT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;

    #[test]
    fn context_round_trips_through_the_session() {
        let session = MemorySessionStore::new();
        assert_eq!(AuthContext::from_session(&session), AuthContext::None);

        session.put(
            session_keys::CURRENT_CONTEXT,
            serde_json::json!("landlord"),
        );
        assert_eq!(AuthContext::from_session(&session), AuthContext::Landlord);

        session.put(session_keys::CURRENT_CONTEXT, serde_json::json!("tenant"));
        assert_eq!(AuthContext::from_session(&session), AuthContext::Tenant);
    }

    #[test]
    fn unknown_marker_reads_as_none() {
        let session = MemorySessionStore::new();
        session.put(session_keys::CURRENT_CONTEXT, serde_json::json!("root"));
        assert_eq!(AuthContext::from_session(&session), AuthContext::None);
    }

    #[test]
    fn all_lists_every_key_once() {
        let mut keys: Vec<&str> = session_keys::ALL.to_vec();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), session_keys::ALL.len());
    }
}
