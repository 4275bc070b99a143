//! `gatekeeper-core` — domain foundation for the multi-tenant auth boundary.
//!
//! This crate contains **pure domain** primitives (no HTTP or session
//! concerns): typed identifiers, the tenant and user records shared by both
//! guard kinds, capability traits, and the store contracts the auth layer
//! consumes.

pub mod capability;
pub mod error;
pub mod id;
pub mod permissions;
pub mod roles;
pub mod store;
pub mod tenant;
pub mod user;

pub use capability::{PermissionHolder, RoleHolder, TenantMember};
pub use error::{DomainError, DomainResult};
pub use id::{TenantId, UserId};
pub use permissions::Permission;
pub use roles::Role;
pub use store::{TenantStore, UserStore};
pub use tenant::{Tenant, TenantStatus, TenantSummary};
pub use user::{User, UserStatus};
