//! In-memory store backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gatekeeper_core::{
    DomainError, DomainResult, Tenant, TenantId, TenantMember, TenantStatus, TenantStore, User,
    UserId, UserStore,
};

/// In-memory user store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, id: UserId) -> DomainResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.users.read().await.len() as u64)
    }

    async fn count_landlords(&self) -> DomainResult<u64> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.is_landlord)
            .count() as u64)
    }

    async fn count_members(&self, tenant_id: TenantId) -> DomainResult<u64> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.is_member_of(tenant_id))
            .count() as u64)
    }

    async fn insert(&self, user: User) -> DomainResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(DomainError::conflict(format!(
                "email already registered: {}",
                user.email
            )));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn update(&self, user: User) -> DomainResult<()> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(DomainError::NotFound);
        }
        users.insert(user.id, user);
        Ok(())
    }
}

/// In-memory tenant store.
///
/// `user_count` (used by the delete refusal) consults the linked user store
/// when one was attached via [`InMemoryTenantStore::with_users`].
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    users: Option<Arc<InMemoryUserStore>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Arc<InMemoryUserStore>) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            users: Some(users),
        }
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get(&self, id: TenantId) -> DomainResult<Tenant> {
        self.tenants
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn get_by_slug(&self, slug: &str) -> DomainResult<Tenant> {
        self.tenants
            .read()
            .await
            .values()
            .find(|t| t.slug == slug)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn get_by_domain(&self, domain: &str) -> DomainResult<Tenant> {
        self.tenants
            .read()
            .await
            .values()
            .find(|t| t.domain.as_deref() == Some(domain))
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    async fn list_active(&self) -> DomainResult<Vec<Tenant>> {
        let mut active: Vec<Tenant> = self
            .tenants
            .read()
            .await
            .values()
            .filter(|t| t.status == TenantStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(active)
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.tenants.read().await.len() as u64)
    }

    async fn count_active(&self) -> DomainResult<u64> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .filter(|t| t.status == TenantStatus::Active)
            .count() as u64)
    }

    async fn user_count(&self, id: TenantId) -> DomainResult<u64> {
        match &self.users {
            Some(users) => users.count_members(id).await,
            None => Ok(0),
        }
    }

    async fn insert(&self, tenant: Tenant) -> DomainResult<()> {
        let mut tenants = self.tenants.write().await;
        if tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(DomainError::conflict(format!(
                "slug already registered: {}",
                tenant.slug
            )));
        }
        if let Some(domain) = &tenant.domain {
            if tenants.values().any(|t| t.domain.as_deref() == Some(domain)) {
                return Err(DomainError::conflict(format!(
                    "domain already registered: {domain}"
                )));
            }
        }
        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn update(&self, tenant: Tenant) -> DomainResult<()> {
        let mut tenants = self.tenants.write().await;
        if !tenants.contains_key(&tenant.id) {
            return Err(DomainError::NotFound);
        }
        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn delete(&self, id: TenantId) -> DomainResult<()> {
        let owned = self.user_count(id).await?;
        if owned > 0 {
            return Err(DomainError::conflict(format!(
                "tenant still owns {owned} users"
            )));
        }
        self.tenants
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slug_uniqueness_enforced() {
        let store = InMemoryTenantStore::new();
        store.insert(Tenant::new("acme", "Acme")).await.unwrap();
        let dup = store.insert(Tenant::new("acme", "Other")).await;
        assert!(matches!(dup, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn delete_refuses_while_users_remain() {
        let users = Arc::new(InMemoryUserStore::new());
        let store = InMemoryTenantStore::with_users(users.clone());

        let tenant = Tenant::new("acme", "Acme");
        let tenant_id = tenant.id;
        store.insert(tenant).await.unwrap();

        let mut member = User::new("Tess", "tess@acme.test");
        member.tenant_id = Some(tenant_id);
        users.insert(member).await.unwrap();

        assert!(matches!(
            store.delete(tenant_id).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn list_active_excludes_other_statuses() {
        let store = InMemoryTenantStore::new();
        store.insert(Tenant::new("a", "A")).await.unwrap();
        let mut suspended = Tenant::new("b", "B");
        suspended.status = TenantStatus::Suspended;
        store.insert(suspended).await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].slug, "a");
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let store = InMemoryUserStore::new();
        store
            .insert(User::new("Olive", "Olive@Example.com"))
            .await
            .unwrap();
        assert!(store.find_by_email("olive@example.com").await.is_ok());
    }
}
