//! Data store seam for the merchant record graph.
//!
//! Writes are issued one at a time; callers own any compensation. There is no
//! transaction spanning a provisioning sequence because the identity user it
//! belongs to lives outside the database.

mod models;
mod postgres;

pub use models::{
    DEFAULT_CHANNEL, DEFAULT_COUNTRY, DEFAULT_CURRENCY, DEFAULT_ONBOARDING_STAGE, DEFAULT_STATUS,
    MemberOutcome, MemberRole, Merchant, NewApiKey, NewMerchant, ProfileType, SessionLog,
    UserProfile,
};
pub use postgres::{PgAccountStore, is_unique_violation, split_sql_statements};

use anyhow::Result;
use std::{future::Future, pin::Pin};
use uuid::Uuid;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait AccountStore: Send + Sync {
    fn ping(&self) -> StoreFuture<'_, ()>;

    fn find_profile(&self, user_id: Uuid) -> StoreFuture<'_, Option<UserProfile>>;

    fn find_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, Option<Merchant>>;

    /// Oldest merchant owned by the user, if any.
    fn find_merchant_by_owner(&self, owner_user_id: Uuid) -> StoreFuture<'_, Option<Merchant>>;

    fn insert_merchant<'a>(&'a self, merchant: &'a NewMerchant) -> StoreFuture<'a, Merchant>;

    fn delete_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, ()>;

    /// Insert or replace the profile keyed by `user_id`.
    fn upsert_profile<'a>(&'a self, profile: &'a UserProfile) -> StoreFuture<'a, ()>;

    fn member_exists(&self, merchant_id: Uuid, user_id: Uuid) -> StoreFuture<'_, bool>;

    /// A concurrent insert of the same pair yields [`MemberOutcome::AlreadyMember`].
    fn insert_member(
        &self,
        merchant_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> StoreFuture<'_, MemberOutcome>;

    fn insert_api_key<'a>(&'a self, key: &'a NewApiKey) -> StoreFuture<'a, ()>;

    fn list_merchants(&self) -> StoreFuture<'_, Vec<Merchant>>;

    fn count_active_api_keys(&self, merchant_id: Uuid) -> StoreFuture<'_, i64>;

    fn insert_session_log<'a>(&'a self, log: &'a SessionLog) -> StoreFuture<'a, ()>;
}
