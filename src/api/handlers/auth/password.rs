//! Password recovery: request the email, then set the new password with the
//! recovery token from the link.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use super::{
    messages,
    rate_limit::{RateLimitAction, RateLimitDecision},
    state::AuthState,
    types::{ErrorResponse, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest},
    utils::{error_message, error_response, normalize_email, valid_email},
};
use crate::identity::IdentityErrorKind;

const MIN_PASSWORD_LEN: usize = 8;

fn ok(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(MessageResponse {
            ok: true,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// Send a recovery email. The success answer does not reveal whether the account exists.
#[utoipa::path(
    post,
    path = "/api/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Recovery email requested", body = MessageResponse),
        (status = 400, description = "Invalid email or provider refusal", body = ErrorResponse),
        (status = 403, description = "Email not verified", body = ErrorResponse),
        (status = 404, description = "No such account", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_PAYLOAD);
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_EMAIL);
    }

    if auth_state
        .rate_limiter()
        .check_email(&email, RateLimitAction::PasswordRecovery)
        == RateLimitDecision::Limited
    {
        return error_message(
            StatusCode::TOO_MANY_REQUESTS,
            messages::TOO_MANY_RECOVERY_REQUESTS,
        );
    }

    match auth_state
        .identity()
        .send_password_recovery(&email, &auth_state.config().reset_password_url())
        .await
    {
        Ok(()) => ok(messages::RECOVERY_SENT),
        Err(err) => match err.kind() {
            IdentityErrorKind::UserNotFound => {
                error_message(StatusCode::NOT_FOUND, messages::ACCOUNT_NOT_FOUND)
            }
            IdentityErrorKind::EmailNotConfirmed => error_response(
                StatusCode::FORBIDDEN,
                ErrorResponse::new(messages::EMAIL_NOT_VERIFIED_RECOVERY)
                    .with_error_type(messages::EMAIL_NOT_VERIFIED_TYPE),
            ),
            _ => {
                error!("Password recovery failed: {err}");
                error_message(StatusCode::BAD_REQUEST, messages::RECOVERY_FAILED)
            }
        },
    }
}

/// Set a new password using the recovery session from the email link.
#[utoipa::path(
    post,
    path = "/api/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid input or update refused", body = ErrorResponse),
        (status = 401, description = "Recovery token invalid or expired", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_PAYLOAD);
    };

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return error_message(StatusCode::BAD_REQUEST, messages::RESET_PASSWORD_TOO_SHORT);
    }

    let Some(access_token) = recovery_access_token(&auth_state, &request).await else {
        return error_message(StatusCode::UNAUTHORIZED, messages::RECOVERY_TOKEN_INVALID);
    };

    let identity = auth_state.identity();
    if let Err(err) = identity
        .update_password(&access_token, &request.password)
        .await
    {
        error!("Password update failed: {err}");
        return error_message(StatusCode::BAD_REQUEST, messages::PASSWORD_UPDATE_FAILED);
    }

    if let Err(err) = identity.sign_out(&access_token).await {
        warn!("Failed to sign out recovery session: {err}");
    }

    ok(messages::PASSWORD_RESET_DONE)
}

/// A usable access token for the recovery session, refreshing it if needed.
async fn recovery_access_token(
    auth_state: &AuthState,
    request: &ResetPasswordRequest,
) -> Option<String> {
    let access_token = request.access_token.trim();
    if access_token.is_empty() {
        return None;
    }

    let identity = auth_state.identity();
    match identity.get_user(access_token).await {
        Ok(_) => return Some(access_token.to_string()),
        Err(err) => debug!("Recovery access token rejected: {err}"),
    }

    let refresh_token = request
        .refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())?;
    match identity.refresh_session(refresh_token).await {
        Ok(session) => Some(session.access_token),
        Err(err) => {
            debug!("Recovery refresh token rejected: {err}");
            None
        }
    }
}
