//! HTTP application wiring (axum router + middleware layering).
//!
//! Route groups mirror the middleware contract: `tenant_resolver` wraps
//! everything except `/health`, and the `landlord`/`tenant` enforcement
//! layers wrap their respective groups.

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;

use crate::middleware;
use crate::state::AppState;

pub mod routes;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the
/// integration tests).
pub fn build_app(state: AppState) -> Router {
    let landlord_routes = Router::new()
        .route("/landlord/tenants", get(routes::landlord::accessible_tenants))
        .route(
            "/landlord/impersonate/stop",
            post(routes::landlord::stop_impersonation),
        )
        .route(
            "/landlord/impersonate/:tenant_id",
            post(routes::landlord::impersonate),
        )
        .route(
            "/landlord/switch/:tenant_id",
            post(routes::landlord::switch_to_tenant),
        )
        .route("/landlord/debug-mode", post(routes::landlord::debug_mode))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::landlord,
        ));

    let tenant_routes = Router::new()
        .route(
            "/tenant/switch-landlord",
            post(routes::tenant::switch_landlord),
        )
        .route("/tenant/switch/:tenant_id", post(routes::tenant::switch))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::tenant,
        ));

    let resolved = Router::new()
        .route("/auth/landlord/login", post(routes::auth::landlord_login))
        .route("/auth/tenant/login", post(routes::auth::tenant_login))
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/state", get(routes::auth::state_view))
        .merge(landlord_routes)
        .merge(tenant_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::tenant_resolver,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(resolved)
        .layer(ServiceBuilder::new())
        .with_state(state)
}
