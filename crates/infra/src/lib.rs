//! `gatekeeper-infra` — store implementations.
//!
//! Two backends for the `gatekeeper-core` store traits: in-memory maps for
//! tests and the dev server, and Postgres via `sqlx` for deployments.

pub mod memory;
pub mod postgres;

pub use memory::{InMemoryTenantStore, InMemoryUserStore};
pub use postgres::{PgTenantStore, PgUserStore};
