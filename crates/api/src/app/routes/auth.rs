//! Login, logout, and state routes.

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use gatekeeper_auth::{ClientInfo, Credentials, RequestScope};

use crate::context::SessionHandle;
use crate::errors::{FailureReason, failure_response};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    fn credentials(&self) -> Credentials {
        Credentials::new()
            .with("email", self.email.clone())
            .with("password", self.password.clone())
    }
}

pub async fn landlord_login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator.landlord().attempt(&body.credentials()).await {
        Json(json!({ "message": "authenticated", "context": "landlord" })).into_response()
    } else {
        failure_response(
            &headers,
            FailureReason::LandlordAuthenticationRequired,
            &state.config,
        )
    }
}

pub async fn tenant_login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    if orchestrator.tenant().attempt(&body.credentials()).await {
        Json(json!({ "message": "authenticated", "context": "tenant" })).into_response()
    } else {
        failure_response(&headers, FailureReason::Unauthenticated, &state.config)
    }
}

/// Full reset: both guards and every context-related session key.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    orchestrator.logout_all();
    Json(json!({ "message": "logged out" })).into_response()
}

pub async fn state_view(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Extension(scope): Extension<RequestScope>,
    Extension(client): Extension<ClientInfo>,
) -> Response {
    let orchestrator = state.orchestrator(session.0, scope, client);
    Json(orchestrator.state().await).into_response()
}
