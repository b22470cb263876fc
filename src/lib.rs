//! # Onboarding (merchant account bootstrap)
//!
//! `onboarding` is the back end behind the sign-up, sign-in and password reset
//! pages of the payment platform. Credentials live in an external identity
//! provider; this service only glues provider sessions to the merchant record
//! graph that downstream systems consume.
//!
//! ## Session cookies
//!
//! The marketing site, the app and the dashboard run on different hosts under
//! one parent domain. A provider session is mirrored into two cookies scoped
//! to that parent domain: an `HttpOnly` one for servers and a `-client` one the
//! browser can read. A request layer refreshes both when the access token is
//! about to expire.
//!
//! ## Provisioning
//!
//! The first successful sign-up (or a legacy sign-in with no profile) creates
//! a merchant, the user profile, an `owner` membership and a `test` API key
//! pair. Writes are sequential with best-effort cleanup; the identity user is
//! owned by the provider so no database transaction can cover it.
//!
//! ## Rate limiting
//!
//! Login and recovery attempts are counted per email in a process-local fixed
//! window. Limits do not survive restarts and are not shared across replicas.

pub mod api;
pub mod cli;
pub mod identity;
pub mod provisioning;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
