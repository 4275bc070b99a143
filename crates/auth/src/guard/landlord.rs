//! Landlord guard — the global operator's authentication handle.

use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};

use chrono::Utc;
use regex::Regex;
use serde_json::json;

use gatekeeper_core::{
    PermissionHolder, RoleHolder, Tenant, TenantId, TenantStore, User, UserId, UserStore,
};

use crate::config::GatekeeperConfig;
use crate::context::{
    AuthContext, ImpersonationRecord, LandlordUserSnapshot, impersonation_record, session_keys,
};
use crate::guard::ClientInfo;
use crate::provider::{
    Credentials, IdentityProvider, LandlordIdentityProvider, has_global_authority,
};
use crate::scope::{self, RequestScope};
use crate::session::{SessionExt, SessionStore};

static TENANT_ACCESS_RE: OnceLock<Regex> = OnceLock::new();

/// Matches `tenant.{id}.access` grants; the captured id is parsed back into
/// a [`TenantId`].
fn tenant_access_re() -> &'static Regex {
    TENANT_ACCESS_RE
        .get_or_init(|| Regex::new(r"^tenant\.([0-9a-fA-F-]+)\.access$").expect("access pattern"))
}

/// Session-backed guard for landlord identities.
///
/// Owns impersonation: a landlord can view a tenant's context without
/// giving up the landlord session. All policy failures return `false` and
/// log; nothing here surfaces errors to HTTP.
pub struct LandlordGuard {
    session: Arc<dyn SessionStore>,
    tenants: Arc<dyn TenantStore>,
    provider: LandlordIdentityProvider,
    scope: RequestScope,
    config: Arc<GatekeeperConfig>,
    client: ClientInfo,
    cached_user: Mutex<Option<User>>,
}

impl LandlordGuard {
    pub fn new(
        session: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        scope: RequestScope,
        config: Arc<GatekeeperConfig>,
        client: ClientInfo,
    ) -> Self {
        let provider = LandlordIdentityProvider::new(users, config.pepper.clone());
        Self {
            session,
            tenants,
            provider,
            scope,
            config,
            client,
            cached_user: Mutex::new(None),
        }
    }

    /// Credential login. On success the session is in landlord context and
    /// every tenant-side marker is gone.
    pub async fn attempt(&self, credentials: &Credentials) -> bool {
        let email = credentials.email().unwrap_or("<none>");
        tracing::info!(guard = "landlord", email, ip = %self.client.ip_or_dash(), "login attempt");

        let Some(user) = self.provider.retrieve_by_credentials(credentials).await else {
            tracing::warn!(guard = "landlord", email, ip = %self.client.ip_or_dash(),
                "login failed: no matching landlord identity");
            return false;
        };
        if !self.provider.validate_credentials(&user, credentials).await {
            tracing::warn!(guard = "landlord", user_id = %user.id, email = %user.email,
                ip = %self.client.ip_or_dash(), "login failed: invalid credentials");
            return false;
        }
        self.login(user);
        true
    }

    /// Session write for an already-resolved identity. Clears the other
    /// guard kind's markers first: a session is in exactly one base context
    /// at a time.
    pub fn login(&self, user: User) {
        self.session.remove(session_keys::TENANT_USER);
        self.session.remove(session_keys::CURRENT_TENANT);
        self.session.remove(session_keys::CURRENT_TENANT_ID);
        self.scope.disable();

        self.session
            .put(session_keys::CURRENT_CONTEXT, json!("landlord"));
        let snapshot = LandlordUserSnapshot {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_landlord: true,
            login_at: Utc::now(),
        };
        self.session.put_as(session_keys::LANDLORD_USER, &snapshot);

        tracing::info!(guard = "landlord", user_id = %user.id, email = %user.email,
            ip = %self.client.ip_or_dash(), "login");
        *self.cached_user.lock().unwrap() = Some(user);
    }

    /// Resolve an identity through the landlord provider without touching
    /// session state. Used by context switches to validate fully before any
    /// teardown.
    pub async fn resolve_by_id(&self, id: UserId) -> Option<User> {
        self.provider.retrieve_by_id(id).await
    }

    pub async fn login_by_id(&self, id: UserId) -> bool {
        match self.resolve_by_id(id).await {
            Some(user) => {
                self.login(user);
                true
            }
            None => false,
        }
    }

    pub fn check(&self) -> bool {
        self.session.contains(session_keys::LANDLORD_USER)
    }

    pub fn id(&self) -> Option<UserId> {
        self.session
            .get_as::<LandlordUserSnapshot>(session_keys::LANDLORD_USER)
            .map(|s| s.id)
    }

    /// The authenticated user: cached handle first, then the session
    /// snapshot resolved through the provider (which re-applies the
    /// landlord constraint).
    pub async fn user(&self) -> Option<User> {
        if let Some(user) = self.cached_user.lock().unwrap().clone() {
            return Some(user);
        }
        let id = self.id()?;
        let user = self.provider.retrieve_by_id(id).await?;
        *self.cached_user.lock().unwrap() = Some(user.clone());
        Some(user)
    }

    /// Logout, in order: impersonation cleanup (it reads markers the next
    /// step erases), then this guard's own markers, then the cached handle.
    pub fn logout(&self) {
        if impersonation_record(self.session.as_ref()).is_some() {
            self.stop_tenant_impersonation();
        }
        let actor = self.id();
        self.session.remove(session_keys::LANDLORD_USER);
        self.session.remove(session_keys::LANDLORD_DEBUG_MODE);
        if AuthContext::from_session(self.session.as_ref()) == AuthContext::Landlord {
            self.session.remove(session_keys::CURRENT_CONTEXT);
        }
        *self.cached_user.lock().unwrap() = None;
        tracing::info!(guard = "landlord", user_id = ?actor, ip = %self.client.ip_or_dash(),
            "logout");
    }

    /// The single authorization gate for every tenant-crossing operation:
    /// global authority, or an explicit `tenant.{id}.access` grant.
    pub async fn can_access_tenant(&self, tenant_id: TenantId) -> bool {
        let Some(user) = self.user().await else {
            return false;
        };
        if has_global_authority(&user) {
            return true;
        }
        match user.permission_set() {
            Some(_) => user.has_permission(&format!("tenant.{tenant_id}.access")),
            None => self.config.permissive_fallback,
        }
    }

    /// Begin viewing a tenant's context while staying logged in as
    /// landlord. Authorization and existence are checked in full before any
    /// scope or session write, so a refusal leaves no residue.
    pub async fn impersonate_tenant(&self, tenant_id: TenantId) -> bool {
        let Some(user) = self.user().await else {
            tracing::warn!(guard = "landlord", tenant_id = %tenant_id,
                "impersonation refused: not authenticated");
            return false;
        };
        if !self.can_access_tenant(tenant_id).await {
            tracing::warn!(guard = "landlord", user_id = %user.id, email = %user.email,
                tenant_id = %tenant_id, ip = %self.client.ip_or_dash(),
                "impersonation refused: tenant not accessible");
            return false;
        }
        let tenant = match self.tenants.get(tenant_id).await {
            Ok(tenant) => tenant,
            Err(e) => {
                tracing::warn!(guard = "landlord", user_id = %user.id, tenant_id = %tenant_id,
                    error = %e, "impersonation refused: tenant lookup failed");
                return false;
            }
        };
        if !tenant.is_selectable(Utc::now()) {
            tracing::warn!(guard = "landlord", user_id = %user.id, tenant_id = %tenant_id,
                status = %tenant.status, "impersonation refused: tenant not active");
            return false;
        }

        self.scope.enable();
        self.scope.add_tenant(scope::TENANT_KEY, tenant.id);
        self.session
            .put_as(session_keys::CURRENT_TENANT, &tenant.summary());
        self.session
            .put_as(session_keys::CURRENT_TENANT_ID, &tenant.id);
        self.session.put_as(
            session_keys::LANDLORD_IMPERSONATING_TENANT,
            &ImpersonationRecord::start(tenant.id, &tenant.name),
        );

        tracing::info!(guard = "landlord", user_id = %user.id, email = %user.email,
            tenant_id = %tenant.id, tenant = %tenant.slug, ip = %self.client.ip_or_dash(),
            "impersonation started");
        true
    }

    /// End impersonation: drop the record, the tenant snapshot, and the
    /// scope binding. The landlord session itself is untouched.
    pub fn stop_tenant_impersonation(&self) -> bool {
        let Some(record) = impersonation_record(self.session.as_ref()) else {
            tracing::debug!(guard = "landlord", "stop impersonation: none active");
            return false;
        };
        self.session
            .remove(session_keys::LANDLORD_IMPERSONATING_TENANT);
        self.session.remove(session_keys::CURRENT_TENANT);
        self.session.remove(session_keys::CURRENT_TENANT_ID);
        self.scope.disable();

        tracing::info!(guard = "landlord", user_id = ?self.id(),
            tenant_id = %record.tenant_id, ip = %self.client.ip_or_dash(),
            "impersonation stopped");
        true
    }

    pub fn is_impersonating(&self) -> bool {
        impersonation_record(self.session.as_ref()).is_some()
    }

    pub fn impersonation(&self) -> Option<ImpersonationRecord> {
        impersonation_record(self.session.as_ref())
    }

    /// Tenants this landlord may operate on: all active tenants for global
    /// authority, otherwise the set named by `tenant.{id}.access` grants.
    pub async fn get_accessible_tenants(&self) -> Vec<Tenant> {
        let Some(user) = self.user().await else {
            return Vec::new();
        };

        if has_global_authority(&user) {
            return self.all_active_tenants().await;
        }

        match user.permission_set() {
            Some(perms) => {
                let now = Utc::now();
                let mut accessible = Vec::new();
                for perm in perms {
                    let Some(caps) = tenant_access_re().captures(perm.as_str()) else {
                        continue;
                    };
                    let Ok(id) = TenantId::from_str(&caps[1]) else {
                        continue;
                    };
                    match self.tenants.get(id).await {
                        Ok(tenant) if tenant.is_selectable(now) => accessible.push(tenant),
                        Ok(_) | Err(gatekeeper_core::DomainError::NotFound) => {}
                        Err(e) => {
                            tracing::warn!(tenant_id = %id, error = %e,
                                "accessible-tenant lookup degraded");
                        }
                    }
                }
                accessible.sort_by(|a, b| a.slug.cmp(&b.slug));
                accessible
            }
            None if self.config.permissive_fallback => self.all_active_tenants().await,
            None => Vec::new(),
        }
    }

    async fn all_active_tenants(&self) -> Vec<Tenant> {
        match self.tenants.list_active().await {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::warn!(error = %e, "active-tenant listing degraded to empty");
                Vec::new()
            }
        }
    }

    /// Toggle the super-admin-only debug marker.
    pub async fn set_debug_mode(&self, enabled: bool) -> bool {
        let Some(user) = self.user().await else {
            return false;
        };
        if !user.has_role("super-admin") {
            tracing::warn!(guard = "landlord", user_id = %user.id,
                "debug mode refused: super-admin required");
            return false;
        }
        self.session
            .put(session_keys::LANDLORD_DEBUG_MODE, json!(enabled));
        true
    }
}
