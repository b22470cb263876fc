//! Session Cookie Bridge.
//!
//! Provider sessions travel as a pair of cookies scoped to the parent domain so
//! the site, the app and the dashboard all see the same sign-in. The `refresh`
//! layer keeps them fresh on page requests.

mod cookies;
mod refresh;

pub use cookies::{
    CHUNK_SIZE, CLIENT_SUFFIX, CookieBridge, DEFAULT_MAX_AGE_SECONDS, cookie_domain_for_site,
    cookie_name_for_identity_url, request_cookie_header,
};
pub use refresh::{RefreshOutcome, SessionRefresher, refresh_session, should_skip};
