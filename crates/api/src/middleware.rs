//! Request pipeline: tenant resolution first, then context enforcement.
//!
//! `tenant_resolver` runs on every routed request and must run before the
//! `landlord`/`tenant` enforcement layers, which read the extensions the
//! resolver inserts.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use gatekeeper_auth::{
    ClientInfo, RequestScope, Resolution, SessionExt, scope, session_keys,
};
use gatekeeper_core::{PermissionHolder, TenantId, TenantMember};

use crate::context::{ResolvedTenant, SessionHandle};
use crate::errors::{FailureReason, failure_response, json_error};
use crate::state::{AppState, SESSION_COOKIE};

fn session_id_from(headers: &HeaderMap) -> (String, bool) {
    let existing = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name == SESSION_COOKIE).then(|| value.to_string())
            })
        });
    match existing {
        Some(id) => (id, false),
        None => (Uuid::now_v7().to_string(), true),
    }
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    }
}

fn query_params(query: Option<&str>) -> BTreeMap<String, String> {
    query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Resolution middleware: determines the tenant (if any) from the host,
/// path, and query, binds it into the request scope, and attaches the
/// session handle and client info for everything downstream.
pub async fn tenant_resolver(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let (session_id, minted) = session_id_from(req.headers());
    let session = state.sessions.get_or_create(&session_id);
    let client = client_info(req.headers());
    let request_scope = RequestScope::new();

    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let path = req.uri().path().to_string();
    let params = query_params(req.uri().query());

    let resolution = state
        .resolver()
        .resolve(host.as_deref(), &path, &params)
        .await;

    let resolved = match resolution {
        Resolution::Tenant(tenant) => {
            request_scope.enable();
            request_scope.add_tenant(scope::TENANT_KEY, tenant.id);
            Some(tenant.summary())
        }
        Resolution::NotFound { slug } => {
            tracing::debug!(slug, path, "request addressed an unknown tenant");
            return failure_response(req.headers(), FailureReason::TenantNotFound, &state.config);
        }
        Resolution::Landlord | Resolution::None => None,
    };

    // The URL did not bind a tenant, but the session may hold one: a plain
    // tenant session on a non-tenant host, or a landlord impersonating.
    // Scope stays non-empty exactly while a tenant is active.
    if !request_scope.is_enabled() {
        if let Some(id) = session.get_as::<TenantId>(session_keys::CURRENT_TENANT_ID) {
            request_scope.enable();
            request_scope.add_tenant(scope::TENANT_KEY, id);
        }
    }

    req.extensions_mut().insert(request_scope);
    req.extensions_mut().insert(ResolvedTenant(resolved));
    req.extensions_mut()
        .insert(SessionHandle(session as Arc<dyn gatekeeper_auth::SessionStore>));
    req.extensions_mut().insert(client);

    let mut response = next.run(req).await;
    if minted {
        let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

struct RequestAuth {
    scope: RequestScope,
    session: SessionHandle,
    client: ClientInfo,
    resolved: ResolvedTenant,
}

fn request_auth(req: &Request<Body>) -> Option<RequestAuth> {
    Some(RequestAuth {
        scope: req.extensions().get::<RequestScope>()?.clone(),
        session: req.extensions().get::<SessionHandle>()?.clone(),
        client: req.extensions().get::<ClientInfo>()?.clone(),
        resolved: req.extensions().get::<ResolvedTenant>()?.clone(),
    })
}

/// Landlord context enforcement: the route must not be on a tenant host,
/// the landlord guard must be authenticated, and the identity must still
/// hold landlord authority.
pub async fn landlord(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(auth) = request_auth(&req) else {
        return json_error(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "middleware_order",
            "tenant resolution did not run",
        );
    };
    if auth.resolved.0.is_some() {
        return failure_response(
            req.headers(),
            FailureReason::LandlordAccessRequired,
            &state.config,
        );
    }

    let orchestrator = state.orchestrator(auth.session.0, auth.scope, auth.client);
    if !orchestrator.landlord().check() {
        return failure_response(
            req.headers(),
            FailureReason::LandlordAuthenticationRequired,
            &state.config,
        );
    }
    // The provider re-applies the landlord constraint here, so a session
    // whose authority was revoked after login is turned away.
    if orchestrator.landlord().user().await.is_none() {
        return failure_response(
            req.headers(),
            FailureReason::InsufficientLandlordPermissions,
            &state.config,
        );
    }

    next.run(req).await
}

/// Tenant context enforcement: a tenant must be resolved, the tenant guard
/// must be authenticated, and the identity must be authorized for that
/// tenant.
pub async fn tenant(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let Some(auth) = request_auth(&req) else {
        return json_error(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "middleware_order",
            "tenant resolution did not run",
        );
    };
    let Some(current) = auth.resolved.0.clone() else {
        return failure_response(req.headers(), FailureReason::TenantNotFound, &state.config);
    };

    let orchestrator = state.orchestrator(auth.session.0, auth.scope, auth.client);
    if !orchestrator.tenant().check() {
        return failure_response(req.headers(), FailureReason::Unauthenticated, &state.config);
    }
    let Some(user) = orchestrator.tenant().user().await else {
        return failure_response(req.headers(), FailureReason::Unauthenticated, &state.config);
    };

    // Members pass outright; operators switched in from the landlord side
    // pass through the access-grant gate instead.
    let authorized = user.is_member_of(current.id)
        || gatekeeper_auth::has_global_authority(&user)
        || match user.permission_set() {
            Some(_) => user.has_permission(&format!("tenant.{}.access", current.id)),
            None => state.config.permissive_fallback,
        };
    if !authorized {
        tracing::warn!(user_id = %user.id, tenant_id = %current.id,
            "tenant route refused: identity not authorized for tenant");
        return failure_response(req.headers(), FailureReason::AccessDenied, &state.config);
    }

    next.run(req).await
}
