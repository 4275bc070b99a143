//! Landlord operations: impersonation, context switch, tenant listing.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use gatekeeper_auth::{ClientInfo, RequestScope};
use gatekeeper_core::TenantId;

use crate::context::SessionHandle;
use crate::errors::json_error;
use crate::state::AppState;

pub async fn accessible_tenants(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    let tenants: Vec<_> = orchestrator
        .landlord()
        .get_accessible_tenants()
        .await
        .into_iter()
        .map(|t| t.summary())
        .collect();
    Json(json!({ "tenants": tenants })).into_response()
}

pub async fn impersonate(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator
        .impersonate_tenant(TenantId::from_uuid(tenant_id))
        .await
    {
        Json(orchestrator.state().await).into_response()
    } else {
        json_error(
            StatusCode::FORBIDDEN,
            "access_denied",
            "tenant not accessible or not active",
        )
    }
}

pub async fn stop_impersonation(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator.stop_tenant_impersonation() {
        Json(json!({ "message": "impersonation stopped" })).into_response()
    } else {
        json_error(
            StatusCode::CONFLICT,
            "conflict",
            "no active impersonation",
        )
    }
}

/// Replaces the landlord session with a tenant session — contrast with
/// impersonation, which preserves it.
pub async fn switch_to_tenant(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator
        .switch_to_tenant(TenantId::from_uuid(tenant_id))
        .await
    {
        Json(json!({ "message": "context switched", "context": "tenant" })).into_response()
    } else {
        json_error(
            StatusCode::FORBIDDEN,
            "access_denied",
            "tenant not accessible or not active",
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct DebugModeRequest {
    pub enabled: bool,
}

pub async fn debug_mode(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    Json(body): Json<DebugModeRequest>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator.landlord().set_debug_mode(body.enabled).await {
        Json(json!({ "message": "debug mode updated", "enabled": body.enabled }))
            .into_response()
    } else {
        json_error(
            StatusCode::FORBIDDEN,
            "access_denied",
            "super-admin role required",
        )
    }
}
