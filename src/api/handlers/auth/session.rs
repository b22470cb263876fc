//! Session endpoints backed by the mirrored identity cookies.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{state::AuthState, types::SessionResponse, utils::with_cookies};
use crate::session::request_cookie_header;

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let cookie_header = request_cookie_header(&headers);
    // Missing or unreadable cookies are treated as "no session".
    let Some(session) = auth_state.cookies().read_session(cookie_header.as_deref()) else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let user = match auth_state.identity().get_user(&session.access_token).await {
        Ok(user) => user,
        Err(err) => {
            debug!("Session cookie not accepted: {err}");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    let merchant_id = match auth_state.store().find_profile(user.id).await {
        Ok(profile) => profile.and_then(|profile| profile.default_merchant_id),
        Err(err) => {
            warn!(user_id = %user.id, "Failed to load profile: {err:#}");
            None
        }
    };

    let response = SessionResponse {
        user_id: user.id.to_string(),
        email: user.email,
        merchant_id: merchant_id.map(|id| id.to_string()),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Sign out at the provider (best effort) and expire every session cookie.
#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 204, description = "Session cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let cookie_header = request_cookie_header(&headers);
    if let Some(session) = auth_state.cookies().read_session(cookie_header.as_deref())
        && let Err(err) = auth_state.identity().sign_out(&session.access_token).await
    {
        warn!("Provider sign-out failed: {err}");
    }

    let cleared = auth_state.cookies().clear_cookies(cookie_header.as_deref());
    with_cookies(StatusCode::NO_CONTENT.into_response(), cleared)
}
