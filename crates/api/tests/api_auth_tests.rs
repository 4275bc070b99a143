//! End-to-end auth flows over the router: login, impersonation, context
//! switches, logout.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::{
    body_json, create_test_state, json_request, seed_landlord, seed_member, seed_tenant,
    session_cookie,
};
use gatekeeper_api::app::build_app;

const LANDLORD_HOST: &str = "admin.example.com";

#[tokio::test]
async fn landlord_login_sets_session_and_context() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &[]).await;
    let app = build_app(state);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "secret"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("session cookie minted");

    let state_response = app
        .oneshot(json_request(
            "GET",
            "/auth/state",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(state_response).await;
    assert_eq!(body["context"], "landlord");
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["impersonating"], false);
}

#[tokio::test]
async fn landlord_login_failure_is_401() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &[]).await;
    let app = build_app(state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "wrong"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "landlord_authentication_required");
}

#[tokio::test]
async fn tenant_login_on_tenant_subdomain() {
    let state = create_test_state();
    let tenant = seed_tenant(&state, "acme").await;
    seed_member(&state, tenant.id, "tess@acme.test", "secret").await;
    let app = build_app(state);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/tenant/login",
            "acme.example.com",
            None,
            Some(json!({"email": "tess@acme.test", "password": "secret"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("session cookie minted");

    let body = body_json(
        app.oneshot(json_request(
            "GET",
            "/auth/state",
            "acme.example.com",
            Some(&cookie),
            None,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(body["context"], "tenant");
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["current_tenant"]["slug"], "acme");
    assert_eq!(body["tenant_stats"]["members"], 1);
}

#[tokio::test]
async fn impersonation_flow_preserves_landlord_session() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &[]).await;
    let tenant = seed_tenant(&state, "acme").await;
    let app = build_app(state);

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "secret"})),
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&login).expect("session cookie minted");

    let impersonate = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/landlord/impersonate/{}", tenant.id),
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(impersonate.status(), StatusCode::OK);
    let body = body_json(impersonate).await;
    assert_eq!(body["context"], "landlord");
    assert_eq!(body["impersonating"], true);
    assert_eq!(body["current_tenant"]["slug"], "acme");

    let stop = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/landlord/impersonate/stop",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    let body = body_json(
        app.clone()
            .oneshot(json_request(
                "GET",
                "/auth/state",
                LANDLORD_HOST,
                Some(&cookie),
                None,
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["context"], "landlord");
    assert_eq!(body["impersonating"], false);
    assert!(body["current_tenant"].is_null());

    // Stopping again is a state-consistency failure, not a success.
    let again = app
        .oneshot(json_request(
            "POST",
            "/landlord/impersonate/stop",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn switch_to_tenant_ends_the_landlord_session() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &["super-admin"]).await;
    let tenant = seed_tenant(&state, "acme").await;
    let app = build_app(state);

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "secret"})),
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&login).expect("session cookie minted");

    let switch = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/landlord/switch/{}", tenant.id),
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(switch.status(), StatusCode::OK);

    let body = body_json(
        app.clone()
            .oneshot(json_request(
                "GET",
                "/auth/state",
                LANDLORD_HOST,
                Some(&cookie),
                None,
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["context"], "tenant");
    assert_eq!(body["impersonating"], false);

    // The landlord session ended, so landlord routes now turn the session
    // away for authentication, not authorization.
    let denied = app
        .oneshot(json_request(
            "GET",
            "/landlord/tenants",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_everything() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &[]).await;
    let tenant = seed_tenant(&state, "acme").await;
    let app = build_app(state);

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "secret"})),
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&login).expect("session cookie minted");

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/landlord/impersonate/{}", tenant.id),
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();

    let logout = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/logout",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::OK);

    let body = body_json(
        app.oneshot(json_request(
            "GET",
            "/auth/state",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(body["context"], "none");
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["impersonating"], false);
    assert!(body["current_tenant"].is_null());
}

#[tokio::test]
async fn accessible_tenants_lists_active_tenants() {
    let state = create_test_state();
    seed_landlord(&state, "olive@example.com", "secret", &["super-admin"]).await;
    seed_tenant(&state, "acme").await;
    seed_tenant(&state, "globex").await;
    let app = build_app(state);

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/landlord/login",
            LANDLORD_HOST,
            None,
            Some(json!({"email": "olive@example.com", "password": "secret"})),
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&login).expect("session cookie minted");

    let body = body_json(
        app.oneshot(json_request(
            "GET",
            "/landlord/tenants",
            LANDLORD_HOST,
            Some(&cookie),
            None,
        ))
        .await
        .unwrap(),
    )
    .await;
    let tenants = body["tenants"].as_array().unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0]["slug"], "acme");
    assert_eq!(tenants[1]["slug"], "globex");
}
