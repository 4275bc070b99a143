//! Guard orchestration — the single coordination point above both guards.
//!
//! Owns the cross-guard operations (context switches, impersonation
//! delegation, logout-all) and the aggregate state/stats views. Switching
//! replaces the session's base identity kind entirely; impersonation keeps
//! the landlord session and only borrows the tenant's view.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use gatekeeper_core::{
    PermissionHolder, TenantId, TenantStore, TenantSummary, UserStore,
};

use crate::cache::StatsCache;
use crate::config::GatekeeperConfig;
use crate::context::{AuthContext, ImpersonationRecord, session_keys};
use crate::guard::{ClientInfo, LandlordGuard, TenantGuard};
use crate::provider::has_global_authority;
use crate::scope::RequestScope;
use crate::session::{SessionExt, SessionStore};

/// Which guard the session's context maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveGuard {
    Landlord,
    Tenant,
}

/// Aggregate landlord-side counters (cached).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandlordStats {
    pub tenants_total: u64,
    pub tenants_active: u64,
    pub landlord_users: u64,
}

/// Aggregate tenant-side counters (cached).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantStats {
    pub tenant_id: TenantId,
    pub members: u64,
    pub plan: String,
    pub max_users: u32,
    pub max_storage_mb: u64,
}

/// Read-only snapshot of the whole auth state for one session.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorState {
    pub context: AuthContext,
    pub authenticated: bool,
    pub impersonating: bool,
    pub impersonation: Option<ImpersonationRecord>,
    pub current_tenant: Option<TenantSummary>,
    pub landlord_stats: Option<LandlordStats>,
    pub tenant_stats: Option<TenantStats>,
}

pub struct GuardOrchestrator {
    session: Arc<dyn SessionStore>,
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    landlord: LandlordGuard,
    tenant: TenantGuard,
    scope: RequestScope,
    config: Arc<GatekeeperConfig>,
    cache: Arc<StatsCache>,
}

impl GuardOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        scope: RequestScope,
        config: Arc<GatekeeperConfig>,
        cache: Arc<StatsCache>,
        client: ClientInfo,
    ) -> Self {
        let landlord = LandlordGuard::new(
            session.clone(),
            users.clone(),
            tenants.clone(),
            scope.clone(),
            config.clone(),
            client.clone(),
        );
        let tenant = TenantGuard::new(
            session.clone(),
            users.clone(),
            tenants.clone(),
            scope.clone(),
            config.clone(),
            client,
        );
        Self {
            session,
            tenants,
            users,
            landlord,
            tenant,
            scope,
            config,
            cache,
        }
    }

    pub fn landlord(&self) -> &LandlordGuard {
        &self.landlord
    }

    pub fn tenant(&self) -> &TenantGuard {
        &self.tenant
    }

    pub fn current_context(&self) -> AuthContext {
        AuthContext::from_session(self.session.as_ref())
    }

    pub fn is_landlord_context(&self) -> bool {
        self.current_context() == AuthContext::Landlord
    }

    pub fn is_tenant_context(&self) -> bool {
        self.current_context() == AuthContext::Tenant
    }

    pub fn active_guard(&self) -> Option<ActiveGuard> {
        match self.current_context() {
            AuthContext::Landlord => Some(ActiveGuard::Landlord),
            AuthContext::Tenant => Some(ActiveGuard::Tenant),
            AuthContext::None => None,
        }
    }

    /// Tenant → landlord switch: the same identity, reinterpreted. Valid
    /// only from an authenticated tenant session whose user holds global
    /// landlord authority. Everything is validated before teardown.
    pub async fn switch_to_landlord(&self) -> bool {
        if self.current_context() != AuthContext::Tenant {
            tracing::debug!("switch to landlord refused: not in tenant context");
            return false;
        }
        let Some(user) = self.tenant.user().await else {
            return false;
        };
        if !has_global_authority(&user) {
            tracing::warn!(user_id = %user.id, email = %user.email,
                "switch to landlord refused: insufficient authority");
            return false;
        }
        // The landlord provider re-applies its own constraint; resolve
        // before logging the tenant session out.
        let Some(landlord_identity) = self.landlord.resolve_by_id(user.id).await else {
            tracing::warn!(user_id = %user.id, "switch to landlord refused: identity not landlord-capable");
            return false;
        };

        self.tenant.logout();
        self.landlord.login(landlord_identity);
        self.cache.invalidate_prefix("tenant_stats.");
        tracing::info!(user_id = %user.id, email = %user.email, from = "tenant",
            to = "landlord", "context switched");
        true
    }

    /// Landlord → tenant switch: **ends** the landlord session and starts a
    /// tenant session for the same identity. Contrast with
    /// [`Self::impersonate_tenant`], which preserves the landlord session.
    pub async fn switch_to_tenant(&self, tenant_id: TenantId) -> bool {
        if self.current_context() != AuthContext::Landlord {
            tracing::debug!(tenant_id = %tenant_id,
                "switch to tenant refused: not in landlord context");
            return false;
        }
        let Some(user) = self.landlord.user().await else {
            return false;
        };
        if !self.landlord.can_access_tenant(tenant_id).await {
            tracing::warn!(user_id = %user.id, email = %user.email, tenant_id = %tenant_id,
                "switch to tenant refused: tenant not accessible");
            return false;
        }
        let tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e,
                    "switch to tenant refused: lookup failed");
                return false;
            }
        };
        if !tenant.is_selectable(Utc::now()) {
            tracing::warn!(tenant_id = %tenant_id, status = %tenant.status,
                "switch to tenant refused: tenant not active");
            return false;
        }

        self.landlord.logout();
        self.tenant.login(user.clone(), &tenant);
        self.cache.invalidate_prefix("tenant_stats.");
        tracing::info!(user_id = %user.id, email = %user.email, tenant_id = %tenant.id,
            tenant = %tenant.slug, from = "landlord", to = "tenant", "context switched");
        true
    }

    pub async fn impersonate_tenant(&self, tenant_id: TenantId) -> bool {
        let started = self.landlord.impersonate_tenant(tenant_id).await;
        if started {
            self.cache.invalidate_prefix("tenant_stats.");
        }
        started
    }

    pub fn stop_tenant_impersonation(&self) -> bool {
        let stopped = self.landlord.stop_tenant_impersonation();
        if stopped {
            self.cache.invalidate_prefix("tenant_stats.");
        }
        stopped
    }

    /// Full reset: log out both guards, then remove every context-related
    /// session key regardless of which guard was active, so no stale
    /// cross-context residue survives.
    pub fn logout_all(&self) {
        if self.landlord.check() {
            self.landlord.logout();
        }
        if self.tenant.check() {
            self.tenant.logout();
        }
        for key in session_keys::ALL {
            self.session.remove(key);
        }
        self.scope.disable();
        self.cache.clear();
        tracing::info!("logout all: session reset");
    }

    /// Capability check delegated to the active guard. A landlord whose
    /// identity record exposes no permission capability falls back to the
    /// configured policy: "landlord can do anything by default" when
    /// permissive.
    pub async fn can(&self, action: &str) -> bool {
        match self.active_guard() {
            Some(ActiveGuard::Tenant) => self.tenant.can_perform_action(action).await,
            Some(ActiveGuard::Landlord) => {
                let Some(user) = self.landlord.user().await else {
                    return false;
                };
                match user.permission_set() {
                    Some(_) => user.has_permission(action),
                    None => self.config.permissive_fallback,
                }
            }
            None => false,
        }
    }

    pub async fn landlord_stats(&self) -> Option<LandlordStats> {
        let user_id = self.landlord.id()?;
        let key = format!("landlord_stats.{user_id}");
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(stats) = serde_json::from_value(cached) {
                return Some(stats);
            }
        }

        let stats = LandlordStats {
            tenants_total: self.fetch(self.tenants.count().await, "tenant count")?,
            tenants_active: self.fetch(self.tenants.count_active().await, "active tenant count")?,
            landlord_users: self.fetch(self.users.count_landlords().await, "landlord count")?,
        };
        if let Ok(value) = serde_json::to_value(&stats) {
            self.cache.put(key, value);
        }
        Some(stats)
    }

    pub async fn tenant_stats(&self) -> Option<TenantStats> {
        let tenant = self.tenant.current_tenant().await?;
        let key = format!("tenant_stats.{}", tenant.id);
        if let Some(cached) = self.cache.get(&key) {
            if let Ok(stats) = serde_json::from_value(cached) {
                return Some(stats);
            }
        }

        let stats = TenantStats {
            tenant_id: tenant.id,
            members: self.fetch(self.users.count_members(tenant.id).await, "member count")?,
            plan: tenant.plan,
            max_users: tenant.max_users,
            max_storage_mb: tenant.max_storage_mb,
        };
        if let Ok(value) = serde_json::to_value(&stats) {
            self.cache.put(key, value);
        }
        Some(stats)
    }

    fn fetch<T>(&self, result: gatekeeper_core::DomainResult<T>, what: &str) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "stats degraded: {what} unavailable");
                None
            }
        }
    }

    pub async fn state(&self) -> OrchestratorState {
        let context = self.current_context();
        let authenticated = match context {
            AuthContext::Landlord => self.landlord.check(),
            AuthContext::Tenant => self.tenant.check(),
            AuthContext::None => false,
        };
        let impersonation = self.landlord.impersonation();
        let current_tenant = self
            .session
            .get_as::<TenantSummary>(session_keys::CURRENT_TENANT);

        let landlord_stats = if self.landlord.check() {
            self.landlord_stats().await
        } else {
            None
        };
        let tenant_stats = if current_tenant.is_some() {
            self.tenant_stats().await
        } else {
            None
        };

        OrchestratorState {
            context,
            authenticated,
            impersonating: impersonation.is_some(),
            impersonation,
            current_tenant,
            landlord_stats,
            tenant_stats,
        }
    }
}
