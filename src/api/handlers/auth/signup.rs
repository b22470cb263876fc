//! Account creation and merchant provisioning.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    messages,
    state::AuthState,
    types::{
        ErrorResponse, PendingVerificationResponse, SignupMerchant, SignupRequest,
        SignupResponse, SignupUser,
    },
    utils::{error_message, error_response, with_cookies},
    validation::validate_signup,
};
use crate::{
    identity::{IdentityErrorKind, IdentitySession},
    provisioning::Provisioned,
    session::request_cookie_header,
};

#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account provisioned", body = SignupResponse),
        (status = 200, description = "Account was already provisioned", body = SignupResponse),
        (status = 400, description = "Invalid input or provider refusal", body = ErrorResponse),
        (status = 500, description = "Provisioning failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn signup(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return error_message(StatusCode::BAD_REQUEST, messages::INVALID_PAYLOAD);
    };

    let form = match validate_signup(&request) {
        Ok(form) => form,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(err.message).with_field(err.field),
            );
        }
    };

    let outcome = match auth_state
        .identity()
        .sign_up(&form.email, &form.password, &auth_state.config().signin_url())
        .await
    {
        Ok(outcome) => outcome,
        Err(err) if err.kind() == IdentityErrorKind::AlreadyRegistered => {
            return error_message(StatusCode::BAD_REQUEST, messages::ALREADY_REGISTERED);
        }
        Err(err) => {
            warn!("Sign-up refused: {err}");
            return error_message(StatusCode::BAD_REQUEST, &err.provider_message());
        }
    };

    let session = outcome
        .session
        .map(|session| session.with_expiry(Utc::now().timestamp()));
    let Some(user) = session
        .as_ref()
        .map(|session| session.user.clone())
        .or(outcome.user)
    else {
        error!("Identity provider returned neither a user nor a session");
        return error_message(StatusCode::INTERNAL_SERVER_ERROR, messages::USER_NOT_CREATED);
    };
    info!(user_id = %user.id, "Identity user created");

    let provisioned = match auth_state
        .provisioner()
        .provision_signup(user.id, &form.profile)
        .await
    {
        Ok(provisioned) => provisioned,
        Err(err) => {
            let debug = auth_state
                .config()
                .is_development()
                .then(|| err.detail().to_string());
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(err.public_message()).with_debug(debug),
            );
        }
    };

    let status = match provisioned {
        Provisioned::Created { .. } => StatusCode::CREATED,
        Provisioned::AlreadyProvisioned { .. } => StatusCode::OK,
    };

    match session {
        Some(session) => signed_in(
            &auth_state,
            &headers,
            status,
            &form.email,
            &provisioned,
            &session,
        ),
        None => (
            status,
            Json(PendingVerificationResponse {
                ok: true,
                pending_verification: true,
                message: messages::CHECK_EMAIL.to_string(),
            }),
        )
            .into_response(),
    }
}

fn signed_in(
    auth_state: &AuthState,
    headers: &HeaderMap,
    status: StatusCode,
    email: &str,
    provisioned: &Provisioned,
    session: &IdentitySession,
) -> Response {
    let merchant = provisioned.merchant();
    let cookie_header = request_cookie_header(headers);
    let cookies = match auth_state
        .cookies()
        .session_cookies(cookie_header.as_deref(), session)
    {
        Ok(cookies) => cookies,
        Err(err) => {
            error!("Failed to encode session cookies: {err:#}");
            Vec::new()
        }
    };

    let body = SignupResponse {
        ok: true,
        redirect_to: auth_state.config().dashboard_redirect(merchant.id),
        user: SignupUser {
            id: session.user.id.to_string(),
            email: email.to_string(),
        },
        merchant: SignupMerchant {
            id: merchant.id.to_string(),
            name: merchant.name.clone(),
        },
    };
    with_cookies((status, Json(body)).into_response(), cookies)
}
