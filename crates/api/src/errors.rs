//! Failure responses: JSON for API clients, redirects for browsers.

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;

use gatekeeper_auth::GatekeeperConfig;

/// Why an auth/context check failed. The codes are a wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    TenantNotFound,
    LandlordAccessRequired,
    LandlordAuthenticationRequired,
    InsufficientLandlordPermissions,
    AccessDenied,
    Unauthenticated,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::TenantNotFound => "tenant_not_found",
            FailureReason::LandlordAccessRequired => "landlord_access_required",
            FailureReason::LandlordAuthenticationRequired => "landlord_authentication_required",
            FailureReason::InsufficientLandlordPermissions => "insufficient_landlord_permissions",
            FailureReason::AccessDenied => "access_denied",
            FailureReason::Unauthenticated => "unauthenticated",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FailureReason::TenantNotFound => StatusCode::NOT_FOUND,
            FailureReason::LandlordAuthenticationRequired | FailureReason::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            FailureReason::LandlordAccessRequired
            | FailureReason::InsufficientLandlordPermissions
            | FailureReason::AccessDenied => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::TenantNotFound => "tenant not found",
            FailureReason::LandlordAccessRequired => "landlord access required",
            FailureReason::LandlordAuthenticationRequired => "landlord authentication required",
            FailureReason::InsufficientLandlordPermissions => "insufficient landlord permissions",
            FailureReason::AccessDenied => "access denied",
            FailureReason::Unauthenticated => "unauthenticated",
        }
    }
}

/// API clients get structured errors; everything else gets a redirect.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    let xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    accepts_json || xhr
}

/// Map a failure to the response contract: JSON `{message, error}` with the
/// reason's status, or a 303 redirect to the login route with the reason as
/// a flash parameter.
pub fn failure_response(
    headers: &HeaderMap,
    reason: FailureReason,
    config: &GatekeeperConfig,
) -> Response {
    if wants_json(headers) {
        return json_error(reason.status(), reason.code(), reason.message());
    }
    let target = format!("{}?gatekeeper_flash={}", config.login_route, reason.code());
    Redirect::to(&target).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "message": message.into(),
            "error": code,
        })),
    )
        .into_response()
}
