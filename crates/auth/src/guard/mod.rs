//! Session-backed authentication guards.
//!
//! One guard per identity kind, composed from an injected session handle,
//! an identity provider, and the request's scope registry. The variants
//! differ only by policy (authority checks for landlord, membership checks
//! for tenant), not by inheritance.

mod landlord;
mod tenant;

pub use landlord::LandlordGuard;
pub use tenant::TenantGuard;

/// Request client metadata carried into the audit trail.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn ip_or_dash(&self) -> &str {
        self.ip.as_deref().unwrap_or("-")
    }
}
