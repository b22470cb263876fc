//! Account Provisioning Sequencer.
//!
//! Builds the record graph behind a new identity user: merchant, `test` key
//! pair, profile and `owner` membership. Each write is its own statement. When
//! a later step fails, earlier rows (and the identity user) are removed by
//! spawned best-effort tasks whose outcome is only logged.

pub mod api_keys;
mod backfill;

pub use api_keys::{
    DEFAULT_TEST_KEY_NAME, KeyType, MerchantKeys, generate_merchant_keys, hash_secret_key,
};
pub use backfill::{BackfillEntry, BackfillOutcome, backfill_test_keys};

use crate::{
    identity::IdentityProvider,
    store::{AccountStore, MemberRole, Merchant, NewMerchant, ProfileType, UserProfile},
};
use std::{fmt, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const LEGACY_MERCHANT_NAME: &str = "Mi primer comercio";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionStage {
    Merchant,
    ApiKeys,
    Profile,
    Membership,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Merchant => "merchant",
            Self::ApiKeys => "API keys",
            Self::Profile => "profile",
            Self::Membership => "merchant membership",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to create {stage}: {detail}")]
pub struct ProvisionError {
    stage: ProvisionStage,
    detail: String,
    cleanup: Vec<JoinHandle<()>>,
}

impl ProvisionError {
    fn new(stage: ProvisionStage, err: &anyhow::Error, cleanup: Vec<JoinHandle<()>>) -> Self {
        Self {
            stage,
            detail: format!("{err:#}"),
            cleanup,
        }
    }

    #[must_use]
    pub fn stage(&self) -> ProvisionStage {
        self.stage
    }

    /// Underlying store error, for logs and development responses only.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    #[must_use]
    pub fn public_message(&self) -> String {
        format!("Failed to create {}. Please contact support.", self.stage)
    }

    #[must_use]
    pub fn cleanup_tasks(&self) -> usize {
        self.cleanup.len()
    }

    /// Wait for the spawned cleanup tasks. Request handlers never call this.
    pub async fn wait_for_cleanup(self) {
        for task in self.cleanup {
            if let Err(err) = task.await {
                error!("Cleanup task panicked: {err}");
            }
        }
    }
}

/// Profile fields submitted on the sign-up form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignupProfile {
    pub merchant_name: String,
    pub full_name: String,
    pub phone: String,
    pub profile_type: ProfileType,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Provisioned {
    Created { merchant: Merchant },
    /// A previous sign-up for this user already completed.
    AlreadyProvisioned { merchant: Merchant },
}

impl Provisioned {
    #[must_use]
    pub fn merchant(&self) -> &Merchant {
        match self {
            Self::Created { merchant } | Self::AlreadyProvisioned { merchant } => merchant,
        }
    }
}

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn AccountStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl Provisioner {
    #[must_use]
    pub fn new(store: Arc<dyn AccountStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Provision the record graph for a freshly signed-up user.
    ///
    /// # Errors
    /// Returns the failing stage. Earlier writes are compensated in the background.
    pub async fn provision_signup(
        &self,
        user_id: Uuid,
        form: &SignupProfile,
    ) -> Result<Provisioned, ProvisionError> {
        if let Some(merchant) = self.completed_merchant(user_id).await {
            info!(%user_id, merchant_id = %merchant.id, "User already provisioned");
            return Ok(Provisioned::AlreadyProvisioned { merchant });
        }

        let existing = match self.store.find_merchant_by_owner(user_id).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(%user_id, "Failed to check existing merchant: {err:#}");
                None
            }
        };

        let merchant = match existing {
            Some(merchant) => {
                debug!(merchant_id = %merchant.id, "Reusing merchant from a partial sign-up");
                merchant
            }
            None => self.create_merchant_with_keys(user_id, &form.merchant_name).await?,
        };

        let profile = UserProfile {
            user_id,
            full_name: form.full_name.clone(),
            phone: form.phone.clone(),
            profile_type: form.profile_type,
            default_merchant_id: Some(merchant.id),
        };
        if let Err(err) = self.store.upsert_profile(&profile).await {
            error!(%user_id, "Profile creation failed: {err:#}");
            let cleanup = self.spawn_cleanup(user_id, Some(merchant.id));
            return Err(ProvisionError::new(ProvisionStage::Profile, &err, cleanup));
        }

        let already_member = self
            .store
            .member_exists(merchant.id, user_id)
            .await
            .unwrap_or_else(|err| {
                warn!(%user_id, "Failed to check merchant membership: {err:#}");
                false
            });
        if !already_member {
            match self
                .store
                .insert_member(merchant.id, user_id, MemberRole::Owner)
                .await
            {
                Ok(outcome) => debug!(?outcome, "Merchant membership recorded"),
                Err(err) => {
                    error!(%user_id, "Membership creation failed: {err:#}");
                    return Err(ProvisionError::new(
                        ProvisionStage::Membership,
                        &err,
                        Vec::new(),
                    ));
                }
            }
        }

        info!(%user_id, merchant_id = %merchant.id, "Merchant provisioned");
        Ok(Provisioned::Created { merchant })
    }

    /// Legacy sign-in path: make sure the user has a default merchant.
    ///
    /// # Errors
    /// Fails only when the merchant or the profile cannot be written.
    pub async fn ensure_default_merchant(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Uuid, ProvisionError> {
        match self.store.find_profile(user_id).await {
            Ok(Some(UserProfile {
                default_merchant_id: Some(merchant_id),
                ..
            })) => return Ok(merchant_id),
            Ok(_) => {}
            Err(err) => warn!(%user_id, "Failed to load profile: {err:#}"),
        }

        info!(%user_id, "Creating default merchant for legacy user");
        let merchant = self
            .store
            .insert_merchant(&NewMerchant::draft(user_id, LEGACY_MERCHANT_NAME))
            .await
            .map_err(|err| {
                error!(%user_id, "Default merchant creation failed: {err:#}");
                ProvisionError::new(ProvisionStage::Merchant, &err, Vec::new())
            })?;

        let profile = UserProfile {
            user_id,
            full_name: email.split('@').next().unwrap_or_default().to_string(),
            phone: String::new(),
            profile_type: ProfileType::MerchantOwner,
            default_merchant_id: Some(merchant.id),
        };
        self.store.upsert_profile(&profile).await.map_err(|err| {
            error!(%user_id, "Legacy profile update failed: {err:#}");
            ProvisionError::new(ProvisionStage::Profile, &err, Vec::new())
        })?;

        if let Err(err) = self
            .store
            .insert_member(merchant.id, user_id, MemberRole::Owner)
            .await
        {
            warn!(%user_id, "Ignoring membership failure for legacy user: {err:#}");
        }

        let keys = generate_merchant_keys(KeyType::Test);
        let record = keys.to_record(merchant.id, user_id, DEFAULT_TEST_KEY_NAME);
        if let Err(err) = self.store.insert_api_key(&record).await {
            warn!(merchant_id = %merchant.id, "Failed to create test keys: {err:#}");
        }

        Ok(merchant.id)
    }

    /// Merchant referenced by an existing profile, if both rows exist.
    async fn completed_merchant(&self, user_id: Uuid) -> Option<Merchant> {
        let profile = match self.store.find_profile(user_id).await {
            Ok(profile) => profile?,
            Err(err) => {
                warn!(%user_id, "Failed to load profile: {err:#}");
                return None;
            }
        };
        let merchant_id = profile.default_merchant_id?;
        match self.store.find_merchant(merchant_id).await {
            Ok(merchant) => merchant,
            Err(err) => {
                warn!(%merchant_id, "Failed to load default merchant: {err:#}");
                None
            }
        }
    }

    async fn create_merchant_with_keys(
        &self,
        user_id: Uuid,
        name: &str,
    ) -> Result<Merchant, ProvisionError> {
        let merchant = match self
            .store
            .insert_merchant(&NewMerchant::draft(user_id, name))
            .await
        {
            Ok(merchant) => merchant,
            Err(err) => {
                error!(%user_id, "Merchant creation failed: {err:#}");
                let cleanup = self.spawn_cleanup(user_id, None);
                return Err(ProvisionError::new(ProvisionStage::Merchant, &err, cleanup));
            }
        };
        info!(merchant_id = %merchant.id, "Merchant created");

        let keys = generate_merchant_keys(KeyType::Test);
        let record = keys.to_record(merchant.id, user_id, DEFAULT_TEST_KEY_NAME);
        if let Err(err) = self.store.insert_api_key(&record).await {
            error!(merchant_id = %merchant.id, "API key creation failed: {err:#}");
            let cleanup = self.spawn_cleanup(user_id, Some(merchant.id));
            return Err(ProvisionError::new(ProvisionStage::ApiKeys, &err, cleanup));
        }
        debug!(public_key = %keys.public_key, "Test keys created");

        Ok(merchant)
    }

    fn spawn_cleanup(&self, user_id: Uuid, merchant_id: Option<Uuid>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(2);

        if let Some(merchant_id) = merchant_id {
            let store = Arc::clone(&self.store);
            tasks.push(tokio::spawn(async move {
                match store.delete_merchant(merchant_id).await {
                    Ok(()) => info!(%merchant_id, "Cleaned up merchant after failed sign-up"),
                    Err(err) => error!(%merchant_id, "Failed to clean up merchant: {err:#}"),
                }
            }));
        }

        let identity = Arc::clone(&self.identity);
        tasks.push(tokio::spawn(async move {
            match identity.delete_user(user_id).await {
                Ok(()) => info!(%user_id, "Cleaned up identity user after failed sign-up"),
                Err(err) => error!(%user_id, "Failed to clean up identity user: {err}"),
            }
        }));

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeIdentity, MemoryStore};
    use anyhow::{Context, Result};

    fn form() -> SignupProfile {
        SignupProfile {
            merchant_name: "Tacos Ana".to_string(),
            full_name: "Ana López".to_string(),
            phone: "+52 55 1234 5678".to_string(),
            profile_type: ProfileType::MerchantOwner,
        }
    }

    fn provisioner() -> (Provisioner, Arc<MemoryStore>, Arc<FakeIdentity>) {
        let store = Arc::new(MemoryStore::default());
        let identity = Arc::new(FakeIdentity::default());
        (
            Provisioner::new(store.clone(), identity.clone()),
            store,
            identity,
        )
    }

    #[tokio::test]
    async fn fresh_signup_builds_the_record_graph() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();

        let outcome = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;
        let Provisioned::Created { merchant } = outcome else {
            anyhow::bail!("expected a fresh merchant");
        };

        assert_eq!(merchant.name, "Tacos Ana");
        assert_eq!(merchant.owner_user_id, user_id);
        assert_eq!(merchant.country, "MX");
        assert_eq!(merchant.status, "draft");

        let profile = store.profile(user_id).context("profile missing")?;
        assert_eq!(profile.default_merchant_id, Some(merchant.id));
        assert_eq!(profile.full_name, "Ana López");
        assert_eq!(profile.profile_type, ProfileType::MerchantOwner);

        assert_eq!(
            store.members(),
            vec![(merchant.id, user_id, MemberRole::Owner)]
        );
        let keys = store.api_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].merchant_id, merchant.id);
        assert_eq!(keys[0].key_type, "test");
        assert!(keys[0].public_key.starts_with("pk_test_"));
        Ok(())
    }

    #[tokio::test]
    async fn repeated_signup_is_already_provisioned() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();

        let first = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;
        let second = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;

        assert!(matches!(second, Provisioned::AlreadyProvisioned { .. }));
        assert_eq!(first.merchant().id, second.merchant().id);
        assert_eq!(store.merchants().len(), 1);
        assert_eq!(store.api_keys().len(), 1);
        assert_eq!(store.members().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn partial_signup_reuses_owned_merchant() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();
        let existing = store
            .insert_merchant(&NewMerchant::draft(user_id, "Earlier attempt"))
            .await?;

        let outcome = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;

        assert_eq!(outcome.merchant().id, existing.id);
        assert_eq!(store.merchants().len(), 1);
        // keys are only generated together with a new merchant
        assert!(store.api_keys().is_empty());
        assert_eq!(
            store.profile(user_id).and_then(|p| p.default_merchant_id),
            Some(existing.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn merchant_failure_deletes_identity_user() -> Result<()> {
        let (provisioner, store, identity) = provisioner();
        store.fail("insert_merchant");
        let user_id = Uuid::new_v4();

        let err = provisioner
            .provision_signup(user_id, &form())
            .await
            .err()
            .context("expected failure")?;
        assert_eq!(err.stage(), ProvisionStage::Merchant);
        assert_eq!(
            err.public_message(),
            "Failed to create merchant. Please contact support."
        );
        assert!(err.detail().contains("insert_merchant"));
        assert_eq!(err.cleanup_tasks(), 1);

        err.wait_for_cleanup().await;
        assert_eq!(identity.calls(), vec![format!("delete_user:{user_id}")]);
        assert!(store.profile(user_id).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn api_key_failure_removes_merchant_and_user() -> Result<()> {
        let (provisioner, store, identity) = provisioner();
        store.fail("insert_api_key");
        let user_id = Uuid::new_v4();

        let err = provisioner
            .provision_signup(user_id, &form())
            .await
            .err()
            .context("expected failure")?;
        assert_eq!(err.stage(), ProvisionStage::ApiKeys);
        assert_eq!(
            err.public_message(),
            "Failed to create API keys. Please contact support."
        );

        err.wait_for_cleanup().await;
        assert!(store.merchants().is_empty());
        assert_eq!(store.deleted_merchants().len(), 1);
        assert!(
            identity
                .calls()
                .contains(&format!("delete_user:{user_id}"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn profile_failure_removes_merchant_and_user() -> Result<()> {
        let (provisioner, store, identity) = provisioner();
        store.fail("upsert_profile");
        let user_id = Uuid::new_v4();

        let err = provisioner
            .provision_signup(user_id, &form())
            .await
            .err()
            .context("expected failure")?;
        assert_eq!(err.stage(), ProvisionStage::Profile);
        assert_eq!(err.cleanup_tasks(), 2);

        err.wait_for_cleanup().await;
        assert!(store.merchants().is_empty());
        assert!(
            identity
                .calls()
                .contains(&format!("delete_user:{user_id}"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn membership_failure_keeps_records() -> Result<()> {
        let (provisioner, store, identity) = provisioner();
        store.fail("insert_member");
        let user_id = Uuid::new_v4();

        let err = provisioner
            .provision_signup(user_id, &form())
            .await
            .err()
            .context("expected failure")?;
        assert_eq!(err.stage(), ProvisionStage::Membership);
        assert_eq!(
            err.public_message(),
            "Failed to create merchant membership. Please contact support."
        );
        assert_eq!(err.cleanup_tasks(), 0);
        assert_eq!(store.merchants().len(), 1);
        assert!(store.profile(user_id).is_some());
        assert!(identity.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_membership_counts_as_success() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();
        // member_exists misses it but the insert hits the unique constraint
        store.fail("member_exists");
        let merchant = store
            .insert_merchant(&NewMerchant::draft(user_id, "Tacos Ana"))
            .await?;
        store
            .insert_member(merchant.id, user_id, MemberRole::Owner)
            .await?;

        let outcome = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;
        assert_eq!(outcome.merchant().id, merchant.id);
        assert_eq!(store.members().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn default_merchant_is_returned_when_present() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();
        let first = provisioner
            .provision_signup(user_id, &form())
            .await
            .map_err(anyhow::Error::new)?;

        let merchant_id = provisioner
            .ensure_default_merchant(user_id, "ana@example.com")
            .await
            .map_err(anyhow::Error::new)?;
        assert_eq!(merchant_id, first.merchant().id);
        assert_eq!(store.merchants().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn legacy_user_gets_a_default_merchant() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        let user_id = Uuid::new_v4();

        let merchant_id = provisioner
            .ensure_default_merchant(user_id, "legacy.user@example.com")
            .await
            .map_err(anyhow::Error::new)?;

        let merchants = store.merchants();
        assert_eq!(merchants.len(), 1);
        assert_eq!(merchants[0].id, merchant_id);
        assert_eq!(merchants[0].name, LEGACY_MERCHANT_NAME);
        assert_eq!(merchants[0].currency, "MXN");

        let profile = store.profile(user_id).context("profile missing")?;
        assert_eq!(profile.full_name, "legacy.user");
        assert_eq!(profile.phone, "");
        assert_eq!(profile.profile_type, ProfileType::MerchantOwner);
        assert_eq!(profile.default_merchant_id, Some(merchant_id));

        assert_eq!(store.members().len(), 1);
        assert_eq!(store.api_keys().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn legacy_path_tolerates_membership_and_key_failures() -> Result<()> {
        let (provisioner, store, _) = provisioner();
        store.fail("insert_member");
        store.fail("insert_api_key");
        let user_id = Uuid::new_v4();

        let merchant_id = provisioner
            .ensure_default_merchant(user_id, "ana@example.com")
            .await
            .map_err(anyhow::Error::new)?;
        assert_eq!(
            store.profile(user_id).and_then(|p| p.default_merchant_id),
            Some(merchant_id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn legacy_path_reports_failing_stage() {
        let (merchant_case, store, _) = provisioner();
        store.fail("insert_merchant");
        let err = merchant_case
            .ensure_default_merchant(Uuid::new_v4(), "ana@example.com")
            .await
            .err();
        assert_eq!(err.map(|e| e.stage()), Some(ProvisionStage::Merchant));

        let (profile_case, store, _) = provisioner();
        store.fail("upsert_profile");
        let err = profile_case
            .ensure_default_merchant(Uuid::new_v4(), "ana@example.com")
            .await
            .err();
        assert_eq!(err.map(|e| e.stage()), Some(ProvisionStage::Profile));
    }
}
