#![allow(dead_code)]

//! Test infrastructure for gatekeeper-api router tests.

use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use serde_json::Value;

use gatekeeper_api::state::AppState;
use gatekeeper_auth::{GatekeeperConfig, password};
use gatekeeper_core::{Role, Tenant, TenantId, TenantStatus, TenantStore, User, UserStore};

/// Fresh in-memory state with default configuration.
pub fn create_test_state() -> AppState {
    AppState::in_memory(GatekeeperConfig::default())
}

pub async fn seed_tenant(state: &AppState, slug: &str) -> Tenant {
    let tenant = Tenant::new(slug, slug.to_uppercase());
    state.tenants.insert(tenant.clone()).await.unwrap();
    tenant
}

pub async fn seed_tenant_with_status(state: &AppState, slug: &str, status: TenantStatus) -> Tenant {
    let mut tenant = Tenant::new(slug, slug.to_uppercase());
    tenant.status = status;
    state.tenants.insert(tenant.clone()).await.unwrap();
    tenant
}

pub async fn seed_landlord(state: &AppState, email: &str, pass: &str, roles: &[&str]) -> User {
    let mut user = User::new("Operator", email);
    user.is_landlord = true;
    user.roles = roles.iter().map(|r| Role::new(r.to_string())).collect();
    user.password_hash = password::hash_password(pass, None).unwrap();
    state.users.insert(user.clone()).await.unwrap();
    user
}

pub async fn seed_member(state: &AppState, tenant_id: TenantId, email: &str, pass: &str) -> User {
    let mut user = User::new("Member", email);
    user.tenant_id = Some(tenant_id);
    user.password_hash = password::hash_password(pass, None).unwrap();
    state.users.insert(user.clone()).await.unwrap();
    user
}

/// JSON request builder; every test speaks the JSON contract.
pub fn json_request(
    method: &str,
    uri: &str,
    host: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host)
        .header(header::ACCEPT, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Extract the `gatekeeper_session=...` pair from Set-Cookie, ready to send
/// back in a Cookie header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}
