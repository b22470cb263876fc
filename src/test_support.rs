//! In-memory fakes for the identity provider and the account store.

use crate::{
    identity::{
        IdentityError, IdentityFuture, IdentityProvider, IdentitySession, IdentityUser,
        SignUpOutcome,
    },
    store::{
        AccountStore, MemberOutcome, MemberRole, Merchant, NewApiKey, NewMerchant, SessionLog,
        StoreFuture, UserProfile,
    },
};
use anyhow::anyhow;
use chrono::Utc;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};
use uuid::Uuid;

pub(crate) const FIXTURE_USER_ID: Uuid = Uuid::from_u128(0x6f1c_1d2e_8a34_4a9b_9f7e_2b1d_3c4e_5f60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deterministic user id per email so fixtures line up across fakes.
pub(crate) fn user_id_for(email: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, email.as_bytes())
}

pub(crate) fn session_fixture(access_token: &str, expires_at: Option<i64>) -> IdentitySession {
    IdentitySession {
        access_token: access_token.to_string(),
        refresh_token: format!("refresh-{access_token}"),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at,
        user: IdentityUser {
            id: FIXTURE_USER_ID,
            email: Some("ana@example.com".to_string()),
            email_confirmed_at: Some(Utc::now()),
        },
    }
}

struct FakeAccount {
    password: String,
    user: IdentityUser,
}

/// Scriptable identity provider.
///
/// Failures injected with [`FakeIdentity::fail`] are returned as provider API
/// errors from the named operation until cleared.
#[derive(Default)]
pub(crate) struct FakeIdentity {
    accounts: Mutex<HashMap<String, FakeAccount>>,
    sessions: Mutex<HashMap<String, IdentityUser>>,
    refreshes: Mutex<HashMap<String, IdentitySession>>,
    failures: Mutex<HashMap<&'static str, (u16, Option<String>, String)>>,
    calls: Mutex<Vec<String>>,
    auto_confirm: AtomicBool,
    counter: AtomicU64,
}

impl FakeIdentity {
    /// Sign-ups return a session instead of waiting for email confirmation.
    pub(crate) fn with_auto_confirm(self) -> Self {
        self.auto_confirm.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn add_account(&self, email: &str, password: &str, confirmed: bool) -> IdentityUser {
        let user = IdentityUser {
            id: user_id_for(email),
            email: Some(email.to_string()),
            email_confirmed_at: confirmed.then(Utc::now),
        };
        lock(&self.accounts).insert(
            email.to_string(),
            FakeAccount {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Register a live access token for `email` and return its session.
    pub(crate) fn issue_session(
        &self,
        email: &str,
        access_token: &str,
        expires_at: i64,
    ) -> IdentitySession {
        let user = IdentityUser {
            id: user_id_for(email),
            email: Some(email.to_string()),
            email_confirmed_at: Some(Utc::now()),
        };
        lock(&self.sessions).insert(access_token.to_string(), user.clone());
        IdentitySession {
            access_token: access_token.to_string(),
            refresh_token: format!("refresh-{access_token}"),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: Some(expires_at),
            user,
        }
    }

    pub(crate) fn allow_refresh(&self, refresh_token: &str, session: IdentitySession) {
        lock(&self.refreshes).insert(refresh_token.to_string(), session);
    }

    pub(crate) fn fail(&self, operation: &'static str, status: u16, code: Option<&str>, message: &str) {
        lock(&self.failures).insert(
            operation,
            (status, code.map(str::to_string), message.to_string()),
        );
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub(crate) fn password_of(&self, email: &str) -> Option<String> {
        lock(&self.accounts)
            .get(email)
            .map(|account| account.password.clone())
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }

    fn injected(&self, operation: &str) -> Result<(), IdentityError> {
        match lock(&self.failures).get(operation) {
            Some((status, code, message)) => Err(IdentityError::Api {
                status: *status,
                code: code.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn new_session(&self, user: IdentityUser) -> IdentitySession {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let access_token = format!("access-{n}");
        lock(&self.sessions).insert(access_token.clone(), user.clone());
        IdentitySession {
            refresh_token: format!("refresh-{access_token}"),
            access_token,
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at: Some(Utc::now().timestamp() + 3600),
            user,
        }
    }
}

fn api(status: u16, code: &str, message: &str) -> IdentityError {
    IdentityError::Api {
        status,
        code: Some(code.to_string()),
        message: message.to_string(),
    }
}

impl IdentityProvider for FakeIdentity {
    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentitySession> {
        Box::pin(async move {
            self.record(format!("sign_in:{email}"));
            self.injected("sign_in_with_password")?;
            let user = {
                let accounts = lock(&self.accounts);
                let account = accounts
                    .get(email)
                    .filter(|account| account.password == password)
                    .ok_or_else(|| api(400, "invalid_credentials", "Invalid login credentials"))?;
                if !account.user.is_email_confirmed() {
                    return Err(api(400, "email_not_confirmed", "Email not confirmed"));
                }
                account.user.clone()
            };
            Ok(self.new_session(user))
        })
    }

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, SignUpOutcome> {
        Box::pin(async move {
            self.record(format!("sign_up:{email}:{redirect_to}"));
            self.injected("sign_up")?;
            if lock(&self.accounts).contains_key(email) {
                return Err(api(422, "user_already_exists", "User already registered"));
            }
            let confirmed = self.auto_confirm.load(Ordering::SeqCst);
            let user = self.add_account(email, password, confirmed);
            if confirmed {
                Ok(SignUpOutcome::from_session(self.new_session(user)))
            } else {
                Ok(SignUpOutcome::pending(user))
            }
        })
    }

    fn send_password_recovery<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("recover:{email}:{redirect_to}"));
            self.injected("send_password_recovery")
        })
    }

    fn get_user<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, IdentityUser> {
        Box::pin(async move {
            self.record(format!("get_user:{access_token}"));
            self.injected("get_user")?;
            lock(&self.sessions)
                .get(access_token)
                .cloned()
                .ok_or_else(|| api(401, "bad_jwt", "invalid JWT: token is expired"))
        })
    }

    fn update_password<'a>(
        &'a self,
        access_token: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentityUser> {
        Box::pin(async move {
            self.record(format!("update_password:{access_token}"));
            self.injected("update_password")?;
            let user = lock(&self.sessions)
                .get(access_token)
                .cloned()
                .ok_or_else(|| api(401, "bad_jwt", "invalid JWT"))?;
            if let Some(email) = &user.email
                && let Some(account) = lock(&self.accounts).get_mut(email)
            {
                account.password = password.to_string();
            }
            Ok(user)
        })
    }

    fn sign_out<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, ()> {
        Box::pin(async move {
            self.record(format!("sign_out:{access_token}"));
            self.injected("sign_out")?;
            lock(&self.sessions).remove(access_token);
            Ok(())
        })
    }

    fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> IdentityFuture<'a, IdentitySession> {
        Box::pin(async move {
            self.record(format!("refresh:{refresh_token}"));
            self.injected("refresh_session")?;
            lock(&self.refreshes)
                .remove(refresh_token)
                .ok_or_else(|| api(400, "refresh_token_not_found", "Invalid Refresh Token"))
        })
    }

    fn delete_user(&self, user_id: Uuid) -> IdentityFuture<'_, ()> {
        Box::pin(async move {
            self.record(format!("delete_user:{user_id}"));
            self.injected("delete_user")
        })
    }

    fn health(&self) -> IdentityFuture<'_, ()> {
        Box::pin(async move { self.injected("health") })
    }
}

#[derive(Default)]
struct MemoryState {
    merchants: Vec<Merchant>,
    profiles: HashMap<Uuid, UserProfile>,
    members: Vec<(Uuid, Uuid, MemberRole)>,
    api_keys: Vec<NewApiKey>,
    session_logs: Vec<SessionLog>,
    deleted_merchants: Vec<Uuid>,
}

/// Account store backed by vectors, with per-operation failure injection.
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<MemoryState>,
    failures: Mutex<HashSet<&'static str>>,
}

impl MemoryStore {
    pub(crate) fn fail(&self, operation: &'static str) {
        lock(&self.failures).insert(operation);
    }

    pub(crate) fn merchants(&self) -> Vec<Merchant> {
        lock(&self.state).merchants.clone()
    }

    pub(crate) fn profile(&self, user_id: Uuid) -> Option<UserProfile> {
        lock(&self.state).profiles.get(&user_id).cloned()
    }

    pub(crate) fn members(&self) -> Vec<(Uuid, Uuid, MemberRole)> {
        lock(&self.state).members.clone()
    }

    pub(crate) fn api_keys(&self) -> Vec<NewApiKey> {
        lock(&self.state).api_keys.clone()
    }

    pub(crate) fn session_logs(&self) -> Vec<SessionLog> {
        lock(&self.state).session_logs.clone()
    }

    pub(crate) fn deleted_merchants(&self) -> Vec<Uuid> {
        lock(&self.state).deleted_merchants.clone()
    }

    fn check(&self, operation: &'static str) -> anyhow::Result<()> {
        if lock(&self.failures).contains(operation) {
            Err(anyhow!("injected failure: {operation}"))
        } else {
            Ok(())
        }
    }
}

impl AccountStore for MemoryStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check("ping") })
    }

    fn find_profile(&self, user_id: Uuid) -> StoreFuture<'_, Option<UserProfile>> {
        Box::pin(async move {
            self.check("find_profile")?;
            Ok(self.profile(user_id))
        })
    }

    fn find_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, Option<Merchant>> {
        Box::pin(async move {
            self.check("find_merchant")?;
            Ok(lock(&self.state)
                .merchants
                .iter()
                .find(|merchant| merchant.id == merchant_id)
                .cloned())
        })
    }

    fn find_merchant_by_owner(&self, owner_user_id: Uuid) -> StoreFuture<'_, Option<Merchant>> {
        Box::pin(async move {
            self.check("find_merchant_by_owner")?;
            Ok(lock(&self.state)
                .merchants
                .iter()
                .find(|merchant| merchant.owner_user_id == owner_user_id)
                .cloned())
        })
    }

    fn insert_merchant<'a>(&'a self, merchant: &'a NewMerchant) -> StoreFuture<'a, Merchant> {
        Box::pin(async move {
            self.check("insert_merchant")?;
            let row = Merchant {
                id: Uuid::new_v4(),
                owner_user_id: merchant.owner_user_id,
                name: merchant.name.clone(),
                country: merchant.country.clone(),
                currency: merchant.currency.clone(),
                channel: merchant.channel.clone(),
                status: merchant.status.clone(),
                onboarding_stage: merchant.onboarding_stage.clone(),
                created_at: Utc::now(),
            };
            lock(&self.state).merchants.push(row.clone());
            Ok(row)
        })
    }

    fn delete_merchant(&self, merchant_id: Uuid) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check("delete_merchant")?;
            let mut state = lock(&self.state);
            state.merchants.retain(|merchant| merchant.id != merchant_id);
            state.api_keys.retain(|key| key.merchant_id != merchant_id);
            state.members.retain(|(id, _, _)| *id != merchant_id);
            state.deleted_merchants.push(merchant_id);
            Ok(())
        })
    }

    fn upsert_profile<'a>(&'a self, profile: &'a UserProfile) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check("upsert_profile")?;
            lock(&self.state)
                .profiles
                .insert(profile.user_id, profile.clone());
            Ok(())
        })
    }

    fn member_exists(&self, merchant_id: Uuid, user_id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check("member_exists")?;
            Ok(lock(&self.state)
                .members
                .iter()
                .any(|(m, u, _)| *m == merchant_id && *u == user_id))
        })
    }

    fn insert_member(
        &self,
        merchant_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> StoreFuture<'_, MemberOutcome> {
        Box::pin(async move {
            self.check("insert_member")?;
            let mut state = lock(&self.state);
            if state
                .members
                .iter()
                .any(|(m, u, _)| *m == merchant_id && *u == user_id)
            {
                return Ok(MemberOutcome::AlreadyMember);
            }
            state.members.push((merchant_id, user_id, role));
            Ok(MemberOutcome::Created)
        })
    }

    fn insert_api_key<'a>(&'a self, key: &'a NewApiKey) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check("insert_api_key")?;
            lock(&self.state).api_keys.push(key.clone());
            Ok(())
        })
    }

    fn list_merchants(&self) -> StoreFuture<'_, Vec<Merchant>> {
        Box::pin(async move {
            self.check("list_merchants")?;
            Ok(self.merchants())
        })
    }

    fn count_active_api_keys(&self, merchant_id: Uuid) -> StoreFuture<'_, i64> {
        Box::pin(async move {
            self.check("count_active_api_keys")?;
            let count = lock(&self.state)
                .api_keys
                .iter()
                .filter(|key| key.merchant_id == merchant_id)
                .count();
            Ok(i64::try_from(count)?)
        })
    }

    fn insert_session_log<'a>(&'a self, log: &'a SessionLog) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check("insert_session_log")?;
            lock(&self.state).session_logs.push(log.clone());
            Ok(())
        })
    }
}
