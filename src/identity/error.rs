//! Identity provider error taxonomy.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity provider rejected the request ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected identity provider response: {0}")]
    Decode(String),
    #[error("identity provider service key is not configured")]
    MissingServiceKey,
}

/// What a provider failure means for the caller, independent of wording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityErrorKind {
    EmailNotConfirmed,
    InvalidCredentials,
    AlreadyRegistered,
    UserNotFound,
    InvalidToken,
    Other,
}

impl IdentityError {
    #[must_use]
    pub fn kind(&self) -> IdentityErrorKind {
        match self {
            Self::Api {
                status,
                code,
                message,
            } => classify(*status, code.as_deref(), message),
            _ => IdentityErrorKind::Other,
        }
    }

    /// Provider answered with a 4xx: the request itself was refused.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status, .. } if (400..500).contains(status))
    }

    /// Message as reported by the provider, for surfacing to the user.
    #[must_use]
    pub fn provider_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn classify(status: u16, code: Option<&str>, message: &str) -> IdentityErrorKind {
    match code {
        Some("email_not_confirmed") => return IdentityErrorKind::EmailNotConfirmed,
        Some("invalid_credentials") => return IdentityErrorKind::InvalidCredentials,
        Some("user_already_exists" | "email_exists") => {
            return IdentityErrorKind::AlreadyRegistered;
        }
        Some("user_not_found") => return IdentityErrorKind::UserNotFound,
        Some(
            "bad_jwt"
            | "no_authorization"
            | "session_not_found"
            | "session_expired"
            | "refresh_token_not_found"
            | "refresh_token_already_used",
        ) => return IdentityErrorKind::InvalidToken,
        _ => {}
    }

    let lowered = message.to_lowercase();
    if message.contains("Email not confirmed") {
        IdentityErrorKind::EmailNotConfirmed
    } else if lowered.contains("already registered") || lowered.contains("already exists") {
        IdentityErrorKind::AlreadyRegistered
    } else if message.contains("User not found") {
        IdentityErrorKind::UserNotFound
    } else if message.contains("Invalid login credentials") {
        IdentityErrorKind::InvalidCredentials
    } else if status == 401 || status == 403 {
        IdentityErrorKind::InvalidToken
    } else {
        IdentityErrorKind::Other
    }
}

/// Error bodies vary between provider versions; accept all known shapes.
#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    error_code: Option<String>,
    code: Option<serde_json::Value>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Build an [`IdentityError::Api`] from a non-success response body.
pub(super) fn api_error(status: u16, body: &str) -> IdentityError {
    let payload: ErrorPayload = serde_json::from_str(body).unwrap_or_default();
    let code = payload.error_code.or_else(|| {
        payload
            .code
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    });
    let message = payload
        .msg
        .or(payload.message)
        .or(payload.error_description)
        .or(payload.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });
    IdentityError::Api {
        status,
        code,
        message,
    }
}
