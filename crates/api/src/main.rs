use std::sync::Arc;

use gatekeeper_api::app::build_app;
use gatekeeper_api::state::AppState;
use gatekeeper_auth::{GatekeeperConfig, password};
use gatekeeper_core::{User, UserStore};
use gatekeeper_infra::{PgTenantStore, PgUserStore};

fn load_config() -> GatekeeperConfig {
    let Some(path) = std::env::var_os("GATEKEEPER_CONFIG") else {
        return GatekeeperConfig::default();
    };
    match std::fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "invalid GATEKEEPER_CONFIG; using defaults");
                GatekeeperConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "unreadable GATEKEEPER_CONFIG; using defaults");
            GatekeeperConfig::default()
        }
    }
}

/// Seed the bootstrap landlord account when configured and absent.
async fn seed_admin(users: &dyn UserStore, pepper: Option<&str>) {
    let (Ok(email), Ok(pass)) = (
        std::env::var("GATEKEEPER_ADMIN_EMAIL"),
        std::env::var("GATEKEEPER_ADMIN_PASSWORD"),
    ) else {
        return;
    };
    if users.find_by_email(&email).await.is_ok() {
        return;
    }
    let mut admin = User::new("Operator", email.clone());
    admin.is_landlord = true;
    match password::hash_password(&pass, pepper) {
        Ok(hash) => admin.password_hash = hash,
        Err(e) => {
            tracing::warn!(error = %e, "admin seed skipped: hashing failed");
            return;
        }
    }
    match users.insert(admin).await {
        Ok(()) => tracing::info!(email, "bootstrap landlord seeded"),
        Err(e) => tracing::warn!(error = %e, "admin seed skipped"),
    }
}

#[tokio::main]
async fn main() {
    gatekeeper_observability::init();

    let config = load_config();
    let pepper = config.pepper.clone();

    let state = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to DATABASE_URL");
            AppState::new(
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgTenantStore::new(pool)),
                config,
            )
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            AppState::in_memory(config)
        }
    };
    seed_admin(state.users.as_ref(), pepper.as_deref()).await;

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .expect("failed to bind 0.0.0.0:8080");

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
