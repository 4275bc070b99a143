//! Request extensions inserted by the resolution middleware.

use std::sync::Arc;

use gatekeeper_auth::SessionStore;
use gatekeeper_core::TenantSummary;

/// The tenant resolved for this request, if any. Present on every request
/// that passed through the resolver; `None` inside means a landlord host or
/// an unscoped request.
#[derive(Clone)]
pub struct ResolvedTenant(pub Option<TenantSummary>);

/// The client's session handle for this request.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn SessionStore>);
