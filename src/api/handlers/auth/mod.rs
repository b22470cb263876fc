//! Auth handlers and supporting modules.
//!
//! Credentials are verified by the identity provider; these handlers map its
//! answers to user-facing messages, run merchant provisioning and mirror the
//! resulting session into cookies.
//!
//! ## Rate Limiting
//!
//! Login and password recovery are limited per normalized email: by default
//! 5 attempts per 15 minutes in a fixed window. A successful login resets the
//! login counter.

pub(crate) mod login;
mod messages;
pub(crate) mod password;
mod rate_limit;
pub(crate) mod session;
mod session_log;
pub(crate) mod signup;
mod state;
pub(crate) mod types;
mod utils;
mod validation;

pub use rate_limit::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW, FixedWindowRateLimiter, NoopRateLimiter, RateLimiter,
};
pub use state::{AuthConfig, AuthState};
