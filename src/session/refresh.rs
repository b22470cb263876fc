//! Request layer keeping the session cookies fresh on page requests.

use super::{CookieBridge, request_cookie_header};
use crate::identity::{IdentityErrorKind, IdentityProvider, IdentitySession};
use axum::{
    extract::{Request, State},
    http::header::{COOKIE, SET_COOKIE},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Access tokens expiring sooner than this are refreshed up front.
const REFRESH_MARGIN_SECONDS: i64 = 30;
const SKIPPED_PREFIXES: [&str; 4] = ["/api", "/static", "/assets", "/favicon.ico"];
const IMAGE_EXTENSIONS: [&str; 6] = [".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Valid,
    Refreshed(IdentitySession),
    /// The provider refused the refresh token; the cookies are dead.
    Rejected,
    /// The provider could not be asked; leave everything as is.
    Unavailable,
}

#[derive(Clone)]
pub struct SessionRefresher {
    identity: Arc<dyn IdentityProvider>,
    cookies: CookieBridge,
}

impl SessionRefresher {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, cookies: CookieBridge) -> Self {
        Self { identity, cookies }
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieBridge {
        &self.cookies
    }

    pub async fn check(&self, session: &IdentitySession, now_unix: i64) -> RefreshOutcome {
        if !session.expires_within(now_unix, REFRESH_MARGIN_SECONDS) {
            match self.identity.get_user(&session.access_token).await {
                Ok(_) => return RefreshOutcome::Valid,
                Err(err) if err.kind() == IdentityErrorKind::InvalidToken => {
                    debug!("Access token rejected, refreshing: {err}");
                }
                Err(err) => {
                    warn!("Failed to validate session: {err}");
                    return RefreshOutcome::Unavailable;
                }
            }
        }

        match self.identity.refresh_session(&session.refresh_token).await {
            Ok(fresh) => RefreshOutcome::Refreshed(fresh),
            Err(err) if err.is_rejection() => {
                debug!("Refresh token rejected: {err}");
                RefreshOutcome::Rejected
            }
            Err(err) => {
                warn!("Failed to refresh session: {err}");
                RefreshOutcome::Unavailable
            }
        }
    }
}

/// Paths served without touching the session: API routes, static assets, images.
#[must_use]
pub fn should_skip(path: &str) -> bool {
    if SKIPPED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    let lowered = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// `axum` middleware: refresh an expiring session before the page handler
/// runs and write the new cookies on the way out.
pub async fn refresh_session(
    State(refresher): State<SessionRefresher>,
    mut request: Request,
    next: Next,
) -> Response {
    if should_skip(request.uri().path()) {
        return next.run(request).await;
    }

    let cookie_header = request_cookie_header(request.headers());
    let Some(session) = refresher.cookies.read_session(cookie_header.as_deref()) else {
        return next.run(request).await;
    };

    match refresher
        .check(&session, chrono::Utc::now().timestamp())
        .await
    {
        RefreshOutcome::Valid | RefreshOutcome::Unavailable => next.run(request).await,
        RefreshOutcome::Refreshed(fresh) => {
            let set_cookies = match refresher
                .cookies
                .session_cookies(cookie_header.as_deref(), &fresh)
            {
                Ok(cookies) => cookies,
                Err(err) => {
                    warn!("Failed to encode refreshed session: {err}");
                    return next.run(request).await;
                }
            };

            match refresher
                .cookies
                .replace_in_cookie_header(cookie_header.as_deref(), &fresh)
            {
                Ok(value) => {
                    request.headers_mut().insert(COOKIE, value);
                }
                Err(err) => warn!("Failed to rewrite request cookies: {err}"),
            }

            let mut response = next.run(request).await;
            for cookie in set_cookies {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
        RefreshOutcome::Rejected => {
            let cleared = refresher.cookies.clear_cookies(cookie_header.as_deref());
            let mut response = next.run(request).await;
            for cookie in cleared {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            response
        }
    }
}
