//! Dual-role user record.
//!
//! A single identity table backs both guard kinds: a user is
//! landlord-capable when it carries the landlord marker (or an authority
//! role/permission, interpreted by `gatekeeper-auth`), and tenant-member
//! when linked to one or more tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{PermissionHolder, RoleHolder, TenantMember};
use crate::id::{TenantId, UserId};
use crate::permissions::Permission;
use crate::roles::Role;

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

/// Identity record shared by the landlord and tenant guards.
///
/// # Invariants
/// - `tenant_id` is the primary membership column; `tenant_ids` holds any
///   additional memberships. Membership checks consult them in that order.
/// - `permissions: None` means the account carries no permission capability
///   at all (the permissive-fallback input); `Some(vec![])` is an empty
///   grant set and fails closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Argon2id PHC-format hash. Never serialized into session snapshots.
    pub password_hash: String,
    pub is_landlord: bool,
    pub roles: Vec<Role>,
    pub permissions: Option<Vec<Permission>>,
    pub tenant_id: Option<TenantId>,
    pub tenant_ids: Vec<TenantId>,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            password_hash: String::new(),
            is_landlord: false,
            roles: Vec::new(),
            permissions: None,
            tenant_id: None,
            tenant_ids: Vec::new(),
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl RoleHolder for User {
    fn roles(&self) -> &[Role] {
        &self.roles
    }
}

impl PermissionHolder for User {
    fn permission_set(&self) -> Option<&[Permission]> {
        self.permissions.as_deref()
    }
}

impl TenantMember for User {
    fn primary_tenant(&self) -> Option<TenantId> {
        self.tenant_id
    }

    fn membership_ids(&self) -> &[TenantId] {
        &self.tenant_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_consults_primary_column_then_list() {
        let primary = TenantId::new();
        let secondary = TenantId::new();
        let other = TenantId::new();

        let mut user = User::new("Alice", "alice@example.com");
        user.tenant_id = Some(primary);
        user.tenant_ids = vec![secondary];

        assert!(user.is_member_of(primary));
        assert!(user.is_member_of(secondary));
        assert!(!user.is_member_of(other));
    }

    #[test]
    fn empty_permission_set_is_distinct_from_no_capability() {
        let mut user = User::new("Bob", "bob@example.com");
        assert!(user.permission_set().is_none());

        user.permissions = Some(vec![]);
        assert_eq!(user.permission_set(), Some(&[][..]));
        assert!(!user.has_permission("tenants.read"));
    }

    #[test]
    fn role_lookup_is_exact() {
        let mut user = User::new("Carol", "carol@example.com");
        user.roles = vec![Role::new("admin")];
        assert!(user.has_role("admin"));
        assert!(!user.has_role("administrator"));
    }
}
