//! Identity provider seam.
//!
//! Credentials, password hashing, email delivery and token issuance all live
//! in an external GoTrue-compatible service. Handlers only talk to it through
//! [`IdentityProvider`] so the flows can be exercised against fakes.

mod client;
mod error;
mod types;

pub use client::GoTrueClient;
pub use error::{IdentityError, IdentityErrorKind};
pub use types::{IdentitySession, IdentityUser, SignUpOutcome};

use std::{future::Future, pin::Pin};
use uuid::Uuid;

pub type IdentityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, IdentityError>> + Send + 'a>>;

pub trait IdentityProvider: Send + Sync {
    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentitySession>;

    /// `redirect_to` is where the confirmation email link lands.
    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, SignUpOutcome>;

    fn send_password_recovery<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, ()>;

    fn get_user<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, IdentityUser>;

    fn update_password<'a>(
        &'a self,
        access_token: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentityUser>;

    fn sign_out<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, ()>;

    fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> IdentityFuture<'a, IdentitySession>;

    /// Admin call, requires the service-role key.
    fn delete_user(&self, user_id: Uuid) -> IdentityFuture<'_, ()>;

    fn health(&self) -> IdentityFuture<'_, ()>;
}
