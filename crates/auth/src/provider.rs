//! Identity providers — credential resolution constrained by guard role.
//!
//! Both variants answer the same three questions (retrieve by id, retrieve
//! by credentials, validate credentials), but each constrains every lookup
//! to its guard's population: the landlord provider refuses to return users
//! without landlord authority, the tenant provider refuses users outside
//! the request's resolved tenant. The constraint lives here, at
//! credential-resolution time, not merely at route entry.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use gatekeeper_core::{
    PermissionHolder, RoleHolder, TenantId, TenantMember, User, UserId, UserStore,
};

use crate::password;

/// Roles that confer landlord-level authority (credential-time gate).
pub const LANDLORD_AUTHORITY_ROLES: &[&str] = &["landlord", "super-admin", "admin"];

/// Roles that confer *global* authority over all tenants.
pub const GLOBAL_AUTHORITY_ROLES: &[&str] = &["landlord", "super-admin"];

/// Permission prefix that also marks landlord capability.
pub const LANDLORD_PERMISSION_PREFIX: &str = "landlord.";

/// Whether a user may authenticate through the landlord guard.
///
/// Checked in priority order: the explicit `is_landlord` marker column, then
/// role membership, then any `landlord.`-prefixed permission.
pub fn has_landlord_authority(user: &User) -> bool {
    if user.is_landlord {
        return true;
    }
    if user.has_any_role(LANDLORD_AUTHORITY_ROLES) {
        return true;
    }
    user.permission_set().is_some_and(|perms| {
        perms
            .iter()
            .any(|p| p.as_str().starts_with(LANDLORD_PERMISSION_PREFIX))
    })
}

/// Whether a user holds global authority over every tenant (as opposed to
/// per-tenant access grants).
pub fn has_global_authority(user: &User) -> bool {
    user.is_landlord || user.has_any_role(GLOBAL_AUTHORITY_ROLES)
}

/// A set of submitted credentials, keyed by field name.
///
/// A map containing only a password (no identifying field) never reaches
/// the store: lookups short-circuit to "no match".
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    fields: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn password(&self) -> Option<&str> {
        self.get("password")
    }

    /// True when any non-password field is present.
    pub fn has_identifier(&self) -> bool {
        self.fields.keys().any(|k| k != "password")
    }
}

/// Credential resolution for one guard kind.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn retrieve_by_id(&self, id: UserId) -> Option<User>;
    async fn retrieve_by_credentials(&self, credentials: &Credentials) -> Option<User>;
    async fn validate_credentials(&self, user: &User, credentials: &Credentials) -> bool;
}

/// Resolves only users holding landlord authority.
pub struct LandlordIdentityProvider {
    users: Arc<dyn UserStore>,
    pepper: Option<String>,
}

impl LandlordIdentityProvider {
    pub fn new(users: Arc<dyn UserStore>, pepper: Option<String>) -> Self {
        Self { users, pepper }
    }

    fn admit(&self, user: User) -> Option<User> {
        if !user.is_active() {
            return None;
        }
        if !has_landlord_authority(&user) {
            tracing::debug!(user_id = %user.id, email = %user.email,
                "refusing non-landlord identity for landlord guard");
            return None;
        }
        Some(user)
    }
}

#[async_trait]
impl IdentityProvider for LandlordIdentityProvider {
    async fn retrieve_by_id(&self, id: UserId) -> Option<User> {
        match self.users.get(id).await {
            Ok(user) => self.admit(user),
            Err(gatekeeper_core::DomainError::NotFound) => None,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "landlord lookup degraded to no match");
                None
            }
        }
    }

    async fn retrieve_by_credentials(&self, credentials: &Credentials) -> Option<User> {
        if !credentials.has_identifier() {
            return None;
        }
        let email = credentials.email()?;
        match self.users.find_by_email(email).await {
            Ok(user) => self.admit(user),
            Err(gatekeeper_core::DomainError::NotFound) => None,
            Err(e) => {
                tracing::warn!(email, error = %e, "landlord lookup degraded to no match");
                None
            }
        }
    }

    async fn validate_credentials(&self, user: &User, credentials: &Credentials) -> bool {
        // Authority is re-verified here: revocation between retrieval and
        // validation must fail the attempt.
        if !user.is_active() || !has_landlord_authority(user) {
            return false;
        }
        let Some(password) = credentials.password() else {
            return false;
        };
        match password::verify_password(password, &user.password_hash, self.pepper.as_deref()) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "password verification degraded");
                false
            }
        }
    }
}

/// Resolves only users belonging to the request's resolved tenant.
pub struct TenantIdentityProvider {
    users: Arc<dyn UserStore>,
    tenant_id: TenantId,
    pepper: Option<String>,
}

impl TenantIdentityProvider {
    pub fn new(users: Arc<dyn UserStore>, tenant_id: TenantId, pepper: Option<String>) -> Self {
        Self {
            users,
            tenant_id,
            pepper,
        }
    }

    fn admit(&self, user: User) -> Option<User> {
        if !user.is_active() {
            return None;
        }
        if !user.is_member_of(self.tenant_id) {
            tracing::debug!(user_id = %user.id, tenant_id = %self.tenant_id,
                "refusing non-member identity for tenant guard");
            return None;
        }
        Some(user)
    }
}

#[async_trait]
impl IdentityProvider for TenantIdentityProvider {
    async fn retrieve_by_id(&self, id: UserId) -> Option<User> {
        match self.users.get(id).await {
            Ok(user) => self.admit(user),
            Err(gatekeeper_core::DomainError::NotFound) => None,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "tenant lookup degraded to no match");
                None
            }
        }
    }

    async fn retrieve_by_credentials(&self, credentials: &Credentials) -> Option<User> {
        if !credentials.has_identifier() {
            return None;
        }
        let email = credentials.email()?;
        match self.users.find_by_email(email).await {
            Ok(user) => self.admit(user),
            Err(gatekeeper_core::DomainError::NotFound) => None,
            Err(e) => {
                tracing::warn!(email, error = %e, "tenant lookup degraded to no match");
                None
            }
        }
    }

    async fn validate_credentials(&self, user: &User, credentials: &Credentials) -> bool {
        // Membership is re-verified, not only the password.
        if !user.is_active() || !user.is_member_of(self.tenant_id) {
            return false;
        }
        let Some(password) = credentials.password() else {
            return false;
        };
        match password::verify_password(password, &user.password_hash, self.pepper.as_deref()) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "password verification degraded");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::{Permission, Role};
    use gatekeeper_infra::InMemoryUserStore;

    fn landlord_user(password: &str) -> User {
        let mut user = User::new("Olive Operator", "olive@example.com");
        user.is_landlord = true;
        user.password_hash = password::hash_password(password, None).unwrap();
        user
    }

    fn member_user(tenant_id: TenantId, password: &str) -> User {
        let mut user = User::new("Tess Member", "tess@acme.test");
        user.tenant_id = Some(tenant_id);
        user.password_hash = password::hash_password(password, None).unwrap();
        user
    }

    #[test]
    fn authority_priority_order() {
        let mut user = User::new("A", "a@example.com");
        assert!(!has_landlord_authority(&user));

        user.permissions = Some(vec![Permission::new("landlord.tenants.read")]);
        assert!(has_landlord_authority(&user));

        user.permissions = None;
        user.roles = vec![Role::new("admin")];
        assert!(has_landlord_authority(&user));
        assert!(!has_global_authority(&user));

        user.roles = vec![Role::new("super-admin")];
        assert!(has_global_authority(&user));

        user.roles = vec![];
        user.is_landlord = true;
        assert!(has_landlord_authority(&user));
        assert!(has_global_authority(&user));
    }

    #[tokio::test]
    async fn password_only_credentials_short_circuit() {
        let users = Arc::new(InMemoryUserStore::new());
        users.insert(landlord_user("secret")).await.unwrap();

        let provider = LandlordIdentityProvider::new(users, None);
        let creds = Credentials::new().with("password", "secret");
        assert!(provider.retrieve_by_credentials(&creds).await.is_none());
    }

    #[tokio::test]
    async fn landlord_provider_refuses_plain_users() {
        let users = Arc::new(InMemoryUserStore::new());
        let mut plain = User::new("P", "plain@example.com");
        plain.password_hash = password::hash_password("secret", None).unwrap();
        let plain_id = plain.id;
        users.insert(plain).await.unwrap();

        let provider = LandlordIdentityProvider::new(users, None);
        assert!(provider.retrieve_by_id(plain_id).await.is_none());

        let creds = Credentials::new()
            .with("email", "plain@example.com")
            .with("password", "secret");
        assert!(provider.retrieve_by_credentials(&creds).await.is_none());
    }

    #[tokio::test]
    async fn revoked_authority_fails_validation() {
        let users = Arc::new(InMemoryUserStore::new());
        let user = landlord_user("secret");
        users.insert(user.clone()).await.unwrap();

        let provider = LandlordIdentityProvider::new(users, None);
        let creds = Credentials::new()
            .with("email", "olive@example.com")
            .with("password", "secret");

        let retrieved = provider.retrieve_by_credentials(&creds).await.unwrap();

        // Authority revoked between retrieval and validation.
        let mut revoked = retrieved.clone();
        revoked.is_landlord = false;
        assert!(!provider.validate_credentials(&revoked, &creds).await);
        assert!(provider.validate_credentials(&retrieved, &creds).await);
    }

    #[tokio::test]
    async fn tenant_provider_checks_membership_then_password() {
        let tenant_id = TenantId::new();
        let other_tenant = TenantId::new();
        let users = Arc::new(InMemoryUserStore::new());
        users.insert(member_user(tenant_id, "secret")).await.unwrap();

        let provider = TenantIdentityProvider::new(users.clone(), tenant_id, None);
        let creds = Credentials::new()
            .with("email", "tess@acme.test")
            .with("password", "secret");

        let user = provider.retrieve_by_credentials(&creds).await.unwrap();
        assert!(provider.validate_credentials(&user, &creds).await);

        let foreign = TenantIdentityProvider::new(users, other_tenant, None);
        assert!(foreign.retrieve_by_credentials(&creds).await.is_none());
        assert!(!foreign.validate_credentials(&user, &creds).await);
    }

    #[tokio::test]
    async fn membership_via_relation_list_admits() {
        let tenant_id = TenantId::new();
        let users = Arc::new(InMemoryUserStore::new());
        let mut user = User::new("R", "rel@acme.test");
        user.tenant_ids = vec![tenant_id];
        user.password_hash = password::hash_password("secret", None).unwrap();
        let user_id = user.id;
        users.insert(user).await.unwrap();

        let provider = TenantIdentityProvider::new(users, tenant_id, None);
        assert!(provider.retrieve_by_id(user_id).await.is_some());
    }

    #[tokio::test]
    async fn wrong_password_fails_validation() {
        let users = Arc::new(InMemoryUserStore::new());
        let user = landlord_user("secret");
        users.insert(user.clone()).await.unwrap();

        let provider = LandlordIdentityProvider::new(users, None);
        let creds = Credentials::new()
            .with("email", "olive@example.com")
            .with("password", "not-it");
        assert!(!provider.validate_credentials(&user, &creds).await);
    }
}
