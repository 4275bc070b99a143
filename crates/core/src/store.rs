//! Store contracts consumed by the auth layer.
//!
//! Implementations live in `gatekeeper-infra`; the guards and the tenant
//! resolver only ever see these traits behind `Arc<dyn Trait>`.

use async_trait::async_trait;

use crate::error::DomainResult;
use crate::id::{TenantId, UserId};
use crate::tenant::Tenant;
use crate::user::User;

/// Tenant lookup and lifecycle operations.
///
/// Lookup misses are `DomainError::NotFound`; `delete` must refuse with
/// `DomainError::Conflict` while the tenant still owns users.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get(&self, id: TenantId) -> DomainResult<Tenant>;
    async fn get_by_slug(&self, slug: &str) -> DomainResult<Tenant>;
    async fn get_by_domain(&self, domain: &str) -> DomainResult<Tenant>;
    async fn list_active(&self) -> DomainResult<Vec<Tenant>>;
    async fn count(&self) -> DomainResult<u64>;
    async fn count_active(&self) -> DomainResult<u64>;
    async fn user_count(&self, id: TenantId) -> DomainResult<u64>;
    async fn insert(&self, tenant: Tenant) -> DomainResult<()>;
    async fn update(&self, tenant: Tenant) -> DomainResult<()>;
    async fn delete(&self, id: TenantId) -> DomainResult<()>;
}

/// User lookup operations for both identity providers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: UserId) -> DomainResult<User>;
    async fn find_by_email(&self, email: &str) -> DomainResult<User>;
    async fn count(&self) -> DomainResult<u64>;
    async fn count_landlords(&self) -> DomainResult<u64>;
    async fn count_members(&self, tenant_id: TenantId) -> DomainResult<u64>;
    async fn insert(&self, user: User) -> DomainResult<()>;
    async fn update(&self, user: User) -> DomainResult<()>;
}
