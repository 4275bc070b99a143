//! Tenant-side operations: switching tenants and returning to landlord.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use uuid::Uuid;

use gatekeeper_auth::{ClientInfo, RequestScope};
use gatekeeper_core::TenantId;

use crate::context::SessionHandle;
use crate::errors::json_error;
use crate::state::AppState;

/// Tenant → landlord switch for dual-role identities.
pub async fn switch_landlord(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator.switch_to_landlord().await {
        Json(json!({ "message": "context switched", "context": "landlord" })).into_response()
    } else {
        json_error(
            StatusCode::FORBIDDEN,
            "access_denied",
            "landlord authority required",
        )
    }
}

/// Rebind the session to another tenant the member belongs to.
pub async fn switch(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    Path(tenant_id): Path<Uuid>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator
        .tenant()
        .switch_to_tenant(TenantId::from_uuid(tenant_id))
        .await
    {
        Json(json!({ "message": "tenant switched" })).into_response()
    } else {
        json_error(
            StatusCode::FORBIDDEN,
            "access_denied",
            "tenant not available or membership missing",
        )
    }
}
