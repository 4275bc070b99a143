//! `gatekeeper-auth` — the context/guard subsystem.
//!
//! This crate decides, per request, which identity is authenticated, which
//! tenant's data a query may touch, and how an operator switches between
//! those states (login, context switch, impersonation, logout) while keeping
//! session state, auth state, and data-scope state mutually consistent.
//!
//! It is intentionally decoupled from HTTP: everything here works against
//! the [`SessionStore`] and store traits, so the guards and the orchestrator
//! are unit-testable without a server.

pub mod cache;
pub mod config;
pub mod context;
pub mod guard;
pub mod orchestrator;
pub mod password;
pub mod provider;
pub mod resolver;
pub mod scope;
pub mod session;

pub use cache::StatsCache;
pub use config::{CacheConfig, GatekeeperConfig, UrlResolutionConfig};
pub use context::{
    AuthContext, ImpersonationRecord, LandlordUserSnapshot, TenantUserSnapshot, session_keys,
};
pub use guard::{ClientInfo, LandlordGuard, TenantGuard};
pub use orchestrator::{ActiveGuard, GuardOrchestrator, OrchestratorState};
pub use provider::{
    Credentials, IdentityProvider, LandlordIdentityProvider, TenantIdentityProvider,
    has_global_authority, has_landlord_authority,
};
pub use resolver::{Candidate, CandidateSource, Resolution, TenantResolver, extract_candidate};
pub use scope::RequestScope;
pub use session::{MemorySessionStore, SessionExt, SessionStore};
