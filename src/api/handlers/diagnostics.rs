//! Configuration report and liveness echo used while wiring deployments.

use super::auth::AuthState;
use axum::{Json, extract::Extension, response::IntoResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    environment: String,
    has_identity_url: bool,
    has_identity_key: bool,
    has_cookie_domain: bool,
    cookie_domain: String,
    timestamp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Ping {
    ok: bool,
    message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct EchoData {
    timestamp: String,
    message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Echo {
    ok: bool,
    data: EchoData,
}

#[utoipa::path(
    get,
    path = "/api/debug",
    responses(
        (status = 200, description = "Effective configuration (no secrets)", body = DebugReport)
    ),
    tag = "diagnostics"
)]
pub async fn debug_report(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let config = auth_state.config();
    let cookie_domain = match auth_state.cookies().domain() {
        Some(domain) if config.cookie_domain_configured() => domain.to_string(),
        Some(domain) => format!("{domain} (derived)"),
        None => "host-only".to_string(),
    };

    Json(DebugReport {
        environment: config.environment().to_string(),
        has_identity_url: config.identity_configured(),
        has_identity_key: config.anon_key_configured(),
        has_cookie_domain: config.cookie_domain_configured(),
        cookie_domain,
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/api/test",
    responses(
        (status = 200, description = "API is reachable", body = Ping)
    ),
    tag = "diagnostics"
)]
pub async fn test_ping() -> impl IntoResponse {
    debug!("Test route called");
    Json(Ping {
        ok: true,
        message: "API route is working".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/test",
    responses(
        (status = 200, description = "POST requests are reachable", body = Echo)
    ),
    tag = "diagnostics"
)]
pub async fn test_echo() -> impl IntoResponse {
    debug!("Test POST route called");
    Json(Echo {
        ok: true,
        data: EchoData {
            timestamp: Utc::now().to_rfc3339(),
            message: "POST working".to_string(),
        },
    })
}
