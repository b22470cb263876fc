//! Password sign-in with legacy merchant bootstrap.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    messages,
    rate_limit::{RateLimitAction, RateLimitDecision},
    session_log::session_log,
    state::AuthState,
    types::{ErrorResponse, LoginRequest, LoginResponse},
    utils::{error_message, error_response, normalize_email, valid_email, with_cookies},
};
use crate::{
    identity::IdentityErrorKind, provisioning::ProvisionStage, session::request_cookie_header,
};

const MIN_PASSWORD_LEN: usize = 6;

fn email_not_verified() -> axum::response::Response {
    error_response(
        StatusCode::FORBIDDEN,
        ErrorResponse::new(messages::EMAIL_NOT_VERIFIED_LOGIN)
            .with_error_type(messages::EMAIL_NOT_VERIFIED_TYPE),
    )
}

/// Sign in, make sure the user owns a default merchant and set the session cookies.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; session cookies set", body = LoginResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Merchant bootstrap failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_PAYLOAD);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_EMAIL);
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return error_message(StatusCode::BAD_REQUEST, messages::LOGIN_PASSWORD_TOO_SHORT);
    }

    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return error_message(
            StatusCode::TOO_MANY_REQUESTS,
            messages::TOO_MANY_LOGIN_ATTEMPTS,
        );
    }

    let session = match auth_state
        .identity()
        .sign_in_with_password(&email, &request.password)
        .await
    {
        Ok(session) => session.with_expiry(Utc::now().timestamp()),
        Err(err) if err.kind() == IdentityErrorKind::EmailNotConfirmed => {
            return email_not_verified();
        }
        Err(err) => {
            warn!("Sign-in failed: {err}");
            return error_message(StatusCode::UNAUTHORIZED, messages::INVALID_CREDENTIALS);
        }
    };

    if !session.user.is_email_confirmed() {
        return email_not_verified();
    }

    let user_id = session.user.id;
    let merchant_id = match auth_state
        .provisioner()
        .ensure_default_merchant(user_id, &email)
        .await
    {
        Ok(merchant_id) => merchant_id,
        Err(err) => {
            error!(%user_id, "Failed to bootstrap merchant: {err}");
            let message = if err.stage() == ProvisionStage::Profile {
                messages::USER_PROFILE_FAILED
            } else {
                messages::MERCHANT_PROFILE_FAILED
            };
            return error_message(StatusCode::INTERNAL_SERVER_ERROR, message);
        }
    };

    auth_state
        .rate_limiter()
        .reset_email(&email, RateLimitAction::Login);

    let log = session_log(user_id, &headers);
    if let Err(err) = auth_state.store().insert_session_log(&log).await {
        warn!(%user_id, "Failed to record session log: {err:#}");
    }

    let cookie_header = request_cookie_header(&headers);
    let cookies = match auth_state
        .cookies()
        .session_cookies(cookie_header.as_deref(), &session)
    {
        Ok(cookies) => cookies,
        Err(err) => {
            error!("Failed to encode session cookies: {err:#}");
            return error_message(StatusCode::INTERNAL_SERVER_ERROR, messages::INVALID_PAYLOAD);
        }
    };

    info!(%user_id, %merchant_id, "User signed in");
    let body = LoginResponse {
        ok: true,
        redirect_to: auth_state.config().dashboard_redirect(merchant_id),
    };
    with_cookies((StatusCode::OK, Json(body)).into_response(), cookies)
}
