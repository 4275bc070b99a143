//! Application state and per-request orchestrator wiring.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gatekeeper_auth::{
    ClientInfo, GatekeeperConfig, GuardOrchestrator, MemorySessionStore, RequestScope, SessionStore,
    StatsCache, TenantResolver,
};
use gatekeeper_core::{TenantStore, UserStore};
use gatekeeper_infra::{InMemoryTenantStore, InMemoryUserStore};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "gatekeeper_session";

/// Session-id → session-handle registry (dev/test backend).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<MemorySessionStore>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, id: &str) -> Arc<MemorySessionStore> {
        self.sessions
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub config: Arc<GatekeeperConfig>,
    pub cache: Arc<StatsCache>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tenants: Arc<dyn TenantStore>,
        config: GatekeeperConfig,
    ) -> Self {
        let cache = Arc::new(StatsCache::new(&config.cache));
        Self {
            users,
            tenants,
            config: Arc::new(config),
            cache,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// State over fresh in-memory stores (dev server, tests).
    pub fn in_memory(config: GatekeeperConfig) -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        let tenants = Arc::new(InMemoryTenantStore::with_users(users.clone()));
        Self::new(users, tenants, config)
    }

    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(
            self.tenants.clone(),
            self.config.url_resolution.clone(),
            self.cache.clone(),
        )
    }

    /// One orchestrator per request, bound to the client's session and the
    /// request's scope.
    pub fn orchestrator(
        &self,
        session: Arc<dyn SessionStore>,
        scope: RequestScope,
        client: ClientInfo,
    ) -> GuardOrchestrator {
        GuardOrchestrator::new(
            session,
            self.users.clone(),
            self.tenants.clone(),
            scope,
            self.config.clone(),
            self.cache.clone(),
            client,
        )
    }
}
