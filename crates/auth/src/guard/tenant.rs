//! Tenant guard — per-tenant member authentication handle.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use gatekeeper_core::{
    PermissionHolder, Tenant, TenantId, TenantMember, TenantStore, User, UserId, UserStore,
};

use crate::config::GatekeeperConfig;
use crate::context::{AuthContext, TenantUserSnapshot, session_keys};
use crate::guard::ClientInfo;
use crate::provider::{Credentials, IdentityProvider, TenantIdentityProvider};
use crate::scope::{self, RequestScope};
use crate::session::{SessionExt, SessionStore};

/// Session-backed guard for tenant identities.
///
/// No impersonation capability here: a tenant session is always exactly the
/// member it was authenticated as.
pub struct TenantGuard {
    session: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    tenants: Arc<dyn TenantStore>,
    scope: RequestScope,
    config: Arc<GatekeeperConfig>,
    client: ClientInfo,
    cached_user: Mutex<Option<User>>,
    cached_tenant: Mutex<Option<Tenant>>,
}

impl TenantGuard {
    pub fn new(
        session: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        scope: RequestScope,
        config: Arc<GatekeeperConfig>,
        client: ClientInfo,
    ) -> Self {
        Self {
            session,
            users,
            tenants,
            scope,
            config,
            client,
            cached_user: Mutex::new(None),
            cached_tenant: Mutex::new(None),
        }
    }

    fn provider_for(&self, tenant_id: TenantId) -> TenantIdentityProvider {
        TenantIdentityProvider::new(self.users.clone(), tenant_id, self.config.pepper.clone())
    }

    /// Tenant id without a store round-trip: session snapshot, then scope
    /// binding.
    fn current_tenant_id(&self) -> Option<TenantId> {
        self.session
            .get_as::<TenantId>(session_keys::CURRENT_TENANT_ID)
            .or_else(|| self.scope.bound_tenant())
    }

    /// The tenant this guard is bound to, resolved in priority order:
    /// cached instance, session snapshot, scope-registry binding. Each
    /// source is authoritative only when the prior one is empty.
    pub async fn current_tenant(&self) -> Option<Tenant> {
        if let Some(tenant) = self.cached_tenant.lock().unwrap().clone() {
            return Some(tenant);
        }
        if let Some(id) = self
            .session
            .get_as::<TenantId>(session_keys::CURRENT_TENANT_ID)
        {
            return self.load_tenant(id).await;
        }
        if let Some(id) = self.scope.bound_tenant() {
            return self.load_tenant(id).await;
        }
        None
    }

    async fn load_tenant(&self, id: TenantId) -> Option<Tenant> {
        match self.tenants.get(id).await {
            Ok(tenant) => {
                *self.cached_tenant.lock().unwrap() = Some(tenant.clone());
                Some(tenant)
            }
            Err(e) => {
                tracing::warn!(tenant_id = %id, error = %e, "bound tenant lookup failed");
                None
            }
        }
    }

    /// Credential login against the request's resolved tenant.
    ///
    /// An inactive tenant fails the attempt before any credential check,
    /// a fail-fast gate distinct from plain credential failure.
    pub async fn attempt(&self, credentials: &Credentials) -> bool {
        let email = credentials.email().unwrap_or("<none>");
        tracing::info!(guard = "tenant", email, ip = %self.client.ip_or_dash(), "login attempt");

        let Some(tenant) = self.current_tenant().await else {
            tracing::warn!(guard = "tenant", email, ip = %self.client.ip_or_dash(),
                "login failed: no tenant resolved for request");
            return false;
        };
        if !tenant.is_selectable(Utc::now()) {
            tracing::warn!(guard = "tenant", email, tenant_id = %tenant.id,
                status = %tenant.status, ip = %self.client.ip_or_dash(),
                "login rejected before credential check: tenant not active");
            return false;
        }

        let provider = self.provider_for(tenant.id);
        let Some(user) = provider.retrieve_by_credentials(credentials).await else {
            tracing::warn!(guard = "tenant", email, tenant_id = %tenant.id,
                ip = %self.client.ip_or_dash(), "login failed: no matching member identity");
            return false;
        };
        if !provider.validate_credentials(&user, credentials).await {
            tracing::warn!(guard = "tenant", user_id = %user.id, email = %user.email,
                tenant_id = %tenant.id, ip = %self.client.ip_or_dash(),
                "login failed: invalid credentials");
            return false;
        }
        self.login(user, &tenant);
        true
    }

    /// Session write for an already-authorized identity. Clears every
    /// landlord marker first (mutual exclusivity) and binds the scope to
    /// the tenant.
    pub fn login(&self, user: User, tenant: &Tenant) {
        self.session.remove(session_keys::LANDLORD_USER);
        self.session
            .remove(session_keys::LANDLORD_IMPERSONATING_TENANT);
        self.session.remove(session_keys::LANDLORD_DEBUG_MODE);

        self.session
            .put(session_keys::CURRENT_CONTEXT, json!("tenant"));
        let snapshot = TenantUserSnapshot {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            tenant_id: Some(tenant.id),
            is_tenant: true,
            login_at: Utc::now(),
        };
        self.session.put_as(session_keys::TENANT_USER, &snapshot);
        self.session
            .put_as(session_keys::CURRENT_TENANT, &tenant.summary());
        self.session
            .put_as(session_keys::CURRENT_TENANT_ID, &tenant.id);

        self.scope.disable();
        self.scope.enable();
        self.scope.add_tenant(scope::TENANT_KEY, tenant.id);

        tracing::info!(guard = "tenant", user_id = %user.id, email = %user.email,
            tenant_id = %tenant.id, tenant = %tenant.slug, ip = %self.client.ip_or_dash(),
            "login");
        *self.cached_user.lock().unwrap() = Some(user);
        *self.cached_tenant.lock().unwrap() = Some(tenant.clone());
    }

    /// Trusted login used by the orchestrator's landlord→tenant switch:
    /// the caller has already authorized the transition, so the provider's
    /// membership constraint is deliberately not re-applied.
    pub async fn login_by_id(&self, id: UserId, tenant_id: TenantId) -> bool {
        let user = match self.users.get(id).await {
            Ok(user) if user.is_active() => user,
            Ok(_) | Err(gatekeeper_core::DomainError::NotFound) => return false,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "login-by-id lookup degraded");
                return false;
            }
        };
        let tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) if tenant.is_selectable(Utc::now()) => tenant,
            Ok(_) | Err(gatekeeper_core::DomainError::NotFound) => return false,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, error = %e,
                    "login-by-id tenant lookup degraded");
                return false;
            }
        };
        self.login(user, &tenant);
        true
    }

    pub fn check(&self) -> bool {
        self.session.contains(session_keys::TENANT_USER)
    }

    pub fn id(&self) -> Option<UserId> {
        self.session
            .get_as::<TenantUserSnapshot>(session_keys::TENANT_USER)
            .map(|s| s.id)
    }

    pub async fn user(&self) -> Option<User> {
        if let Some(user) = self.cached_user.lock().unwrap().clone() {
            return Some(user);
        }
        let id = self.id()?;
        match self.users.get(id).await {
            Ok(user) if user.is_active() => {
                *self.cached_user.lock().unwrap() = Some(user.clone());
                Some(user)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user_id = %id, error = %e, "session user lookup degraded");
                None
            }
        }
    }

    pub fn logout(&self) {
        let actor = self.id();
        self.session.remove(session_keys::TENANT_USER);
        self.session.remove(session_keys::CURRENT_TENANT);
        self.session.remove(session_keys::CURRENT_TENANT_ID);
        if AuthContext::from_session(self.session.as_ref()) == AuthContext::Tenant {
            self.session.remove(session_keys::CURRENT_CONTEXT);
        }
        self.scope.disable();
        *self.cached_user.lock().unwrap() = None;
        *self.cached_tenant.lock().unwrap() = None;
        tracing::info!(guard = "tenant", user_id = ?actor, ip = %self.client.ip_or_dash(),
            "logout");
    }

    /// Rebind this session to another tenant the user belongs to. Replaces
    /// the binding fully: scope, snapshot, and the session's tenant ids.
    pub async fn switch_to_tenant(&self, tenant_id: TenantId) -> bool {
        let Some(user) = self.user().await else {
            tracing::warn!(guard = "tenant", tenant_id = %tenant_id,
                "tenant switch refused: not authenticated");
            return false;
        };
        let tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::warn!(guard = "tenant", user_id = %user.id, tenant_id = %tenant_id,
                    error = %e, "tenant switch refused: lookup failed");
                return false;
            }
        };
        if !tenant.is_selectable(Utc::now()) {
            tracing::warn!(guard = "tenant", user_id = %user.id, tenant_id = %tenant_id,
                status = %tenant.status, "tenant switch refused: tenant not active");
            return false;
        }
        if !user.is_member_of(tenant_id) {
            tracing::warn!(guard = "tenant", user_id = %user.id, email = %user.email,
                tenant_id = %tenant_id, ip = %self.client.ip_or_dash(),
                "tenant switch refused: not a member");
            return false;
        }

        let from = self.current_tenant_id();

        self.scope.disable();
        self.scope.enable();
        self.scope.add_tenant(scope::TENANT_KEY, tenant.id);
        self.session
            .put_as(session_keys::CURRENT_TENANT, &tenant.summary());
        self.session
            .put_as(session_keys::CURRENT_TENANT_ID, &tenant.id);
        if let Some(mut snapshot) = self
            .session
            .get_as::<TenantUserSnapshot>(session_keys::TENANT_USER)
        {
            snapshot.tenant_id = Some(tenant.id);
            self.session.put_as(session_keys::TENANT_USER, &snapshot);
        }
        *self.cached_tenant.lock().unwrap() = Some(tenant.clone());

        tracing::info!(guard = "tenant", user_id = %user.id, email = %user.email,
            from = ?from, to = %tenant.id, tenant = %tenant.slug,
            ip = %self.client.ip_or_dash(), "tenant switched");
        true
    }

    /// Permission check against the bare action name and the
    /// tenant-qualified `tenant.{id}.{action}` form; accounts with no
    /// permission capability fall back to the configured policy.
    pub async fn can_perform_action(&self, action: &str) -> bool {
        let Some(user) = self.user().await else {
            return false;
        };
        match user.permission_set() {
            None => self.config.permissive_fallback,
            Some(_) => {
                if user.has_permission(action) {
                    return true;
                }
                match self.current_tenant_id() {
                    Some(tenant_id) => {
                        user.has_permission(&format!("tenant.{tenant_id}.{action}"))
                    }
                    None => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::fixtures::Harness;
    use gatekeeper_core::{Permission, TenantStatus};

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials::new()
            .with("email", email)
            .with("password", password)
    }

    /// Bind the request to a tenant the way the resolution middleware does.
    fn bind_request(harness: &Harness, tenant: &Tenant) {
        harness.scope.enable();
        harness.scope.add_tenant(scope::TENANT_KEY, tenant.id);
    }

    #[tokio::test]
    async fn attempt_requires_a_resolved_tenant() {
        let harness = Harness::new();
        let guard = harness.tenant_guard();
        assert!(!guard.attempt(&creds("tess@acme.test", "secret")).await);
    }

    #[tokio::test]
    async fn attempt_writes_tenant_context_and_scope() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;
        harness
            .seed_member(tenant.id, "tess@acme.test", "secret")
            .await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);
        assert!(guard.check());
        assert_eq!(
            AuthContext::from_session(harness.session.as_ref()),
            AuthContext::Tenant
        );
        assert_eq!(harness.scope.bound_tenant(), Some(tenant.id));

        let snapshot = harness
            .session
            .get_as::<TenantUserSnapshot>(session_keys::TENANT_USER)
            .unwrap();
        assert_eq!(snapshot.tenant_id, Some(tenant.id));
        assert!(snapshot.is_tenant);
    }

    #[tokio::test]
    async fn attempt_clears_landlord_markers() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;
        harness
            .seed_member(tenant.id, "tess@acme.test", "secret")
            .await;
        bind_request(&harness, &tenant);
        harness
            .session
            .put(session_keys::LANDLORD_USER, json!({"id": "stale"}));
        harness
            .session
            .put(session_keys::LANDLORD_DEBUG_MODE, json!(true));

        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);
        assert!(!harness.session.contains(session_keys::LANDLORD_USER));
        assert!(!harness.session.contains(session_keys::LANDLORD_DEBUG_MODE));
    }

    #[tokio::test]
    async fn inactive_tenant_gate_fires_before_credential_validation() {
        let harness = Harness::new();
        let tenant = harness
            .seed_tenant_with_status("frozen", TenantStatus::Inactive)
            .await;
        // Credentials that would validate if the gate did not fire first.
        harness
            .seed_member(tenant.id, "tess@frozen.test", "secret")
            .await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert!(!guard.attempt(&creds("tess@frozen.test", "secret")).await);
        assert!(!guard.check());
        assert!(!harness.session.contains(session_keys::TENANT_USER));
    }

    #[tokio::test]
    async fn non_member_cannot_log_in() {
        let harness = Harness::new();
        let acme = harness.seed_tenant("acme").await;
        let globex = harness.seed_tenant("globex").await;
        harness
            .seed_member(globex.id, "gus@globex.test", "secret")
            .await;
        bind_request(&harness, &acme);

        let guard = harness.tenant_guard();
        assert!(!guard.attempt(&creds("gus@globex.test", "secret")).await);
    }

    #[tokio::test]
    async fn current_tenant_prefers_session_over_scope() {
        let harness = Harness::new();
        let session_tenant = harness.seed_tenant("from-session").await;
        let scope_tenant = harness.seed_tenant("from-scope").await;

        harness
            .session
            .put_as(session_keys::CURRENT_TENANT_ID, &session_tenant.id);
        harness.scope.enable();
        harness
            .scope
            .add_tenant(scope::TENANT_KEY, scope_tenant.id);

        let guard = harness.tenant_guard();
        assert_eq!(
            guard.current_tenant().await.unwrap().id,
            session_tenant.id
        );
    }

    #[tokio::test]
    async fn current_tenant_falls_back_to_scope_binding() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert_eq!(guard.current_tenant().await.unwrap().id, tenant.id);
    }

    #[tokio::test]
    async fn switch_replaces_binding_fully() {
        let harness = Harness::new();
        let acme = harness.seed_tenant("acme").await;
        let globex = harness.seed_tenant("globex").await;

        let mut member = gatekeeper_core::User::new("Tess", "tess@acme.test");
        member.tenant_id = Some(acme.id);
        member.tenant_ids = vec![globex.id];
        member.password_hash = crate::password::hash_password("secret", None).unwrap();
        harness.users.insert(member).await.unwrap();

        bind_request(&harness, &acme);
        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);

        assert!(guard.switch_to_tenant(globex.id).await);
        assert_eq!(harness.scope.bound_tenant(), Some(globex.id));
        assert_eq!(
            harness
                .session
                .get_as::<TenantId>(session_keys::CURRENT_TENANT_ID),
            Some(globex.id)
        );
        let snapshot = harness
            .session
            .get_as::<TenantUserSnapshot>(session_keys::TENANT_USER)
            .unwrap();
        assert_eq!(snapshot.tenant_id, Some(globex.id));
    }

    #[tokio::test]
    async fn switch_refuses_non_membership() {
        let harness = Harness::new();
        let acme = harness.seed_tenant("acme").await;
        let globex = harness.seed_tenant("globex").await;
        harness
            .seed_member(acme.id, "tess@acme.test", "secret")
            .await;

        bind_request(&harness, &acme);
        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);

        assert!(!guard.switch_to_tenant(globex.id).await);
        assert_eq!(harness.scope.bound_tenant(), Some(acme.id));
    }

    #[tokio::test]
    async fn can_perform_action_checks_qualified_name() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;

        let mut member = gatekeeper_core::User::new("Tess", "tess@acme.test");
        member.tenant_id = Some(tenant.id);
        member.permissions = Some(vec![Permission::new(format!(
            "tenant.{}.reports.read",
            tenant.id
        ))]);
        member.password_hash = crate::password::hash_password("secret", None).unwrap();
        harness.users.insert(member).await.unwrap();

        bind_request(&harness, &tenant);
        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);

        assert!(guard.can_perform_action("reports.read").await);
        assert!(!guard.can_perform_action("reports.write").await);
    }

    #[tokio::test]
    async fn can_perform_action_permissive_fallback() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;
        harness
            .seed_member(tenant.id, "tess@acme.test", "secret")
            .await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);
        // No permission capability at all: shipped default is fail-open.
        assert!(guard.can_perform_action("anything").await);
    }

    #[tokio::test]
    async fn can_perform_action_strict_mode_fails_closed() {
        let config = GatekeeperConfig {
            permissive_fallback: false,
            ..GatekeeperConfig::default()
        };
        let harness = Harness::with_config(config);
        let tenant = harness.seed_tenant("acme").await;
        harness
            .seed_member(tenant.id, "tess@acme.test", "secret")
            .await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);
        assert!(!guard.can_perform_action("anything").await);
    }

    #[tokio::test]
    async fn logout_disables_scope_and_clears_markers() {
        let harness = Harness::new();
        let tenant = harness.seed_tenant("acme").await;
        harness
            .seed_member(tenant.id, "tess@acme.test", "secret")
            .await;
        bind_request(&harness, &tenant);

        let guard = harness.tenant_guard();
        assert!(guard.attempt(&creds("tess@acme.test", "secret")).await);
        guard.logout();

        assert!(!guard.check());
        assert!(!harness.scope.is_enabled());
        assert!(!harness.session.contains(session_keys::TENANT_USER));
        assert!(!harness.session.contains(session_keys::CURRENT_TENANT));
        assert!(!harness.session.contains(session_keys::CURRENT_CONTEXT));
    }
}
