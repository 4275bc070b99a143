//! Capability traits for identity records.
//!
//! The user type declares which capabilities it carries; authorization code
//! resolves them through these traits instead of probing for methods at
//! runtime.

use crate::id::TenantId;
use crate::permissions::Permission;
use crate::roles::Role;

/// An identity that carries RBAC roles.
pub trait RoleHolder {
    fn roles(&self) -> &[Role];

    fn has_role(&self, name: &str) -> bool {
        self.roles().iter().any(|r| r.as_str() == name)
    }

    fn has_any_role(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_role(n))
    }
}

/// An identity that may carry a permission grant set.
///
/// `permission_set() == None` means the account type has no permission
/// capability at all; the policy layer decides what that implies (see the
/// `permissive_fallback` configuration flag). `Some(&[])` is an empty grant
/// set: checks against it fail closed.
pub trait PermissionHolder {
    fn permission_set(&self) -> Option<&[Permission]>;

    fn has_permission(&self, name: &str) -> bool {
        match self.permission_set() {
            Some(perms) => perms.iter().any(|p| p.is_wildcard() || p.as_str() == name),
            None => false,
        }
    }
}

/// An identity linked to one or more tenants.
pub trait TenantMember {
    /// Primary membership (the membership column).
    fn primary_tenant(&self) -> Option<TenantId>;

    /// Additional memberships (the join-table relation).
    fn membership_ids(&self) -> &[TenantId];

    /// Membership check, primary column first, then the relation.
    fn is_member_of(&self, tenant_id: TenantId) -> bool {
        if self.primary_tenant() == Some(tenant_id) {
            return true;
        }
        self.membership_ids().contains(&tenant_id)
    }
}
