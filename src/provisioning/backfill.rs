//! One-off: give every merchant without an active key a `test` pair.

use super::{DEFAULT_TEST_KEY_NAME, KeyType, generate_merchant_keys};
use crate::store::AccountStore;
use anyhow::Result;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// Merchant already had this many active keys.
    Existing(i64),
    /// New pair; the secret is only available here.
    Generated {
        public_key: String,
        secret_key: String,
    },
    Failed(String),
}

#[derive(Debug)]
pub struct BackfillEntry {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub outcome: BackfillOutcome,
}

/// Walk every merchant. Per-merchant failures are reported, not fatal.
///
/// # Errors
/// Returns an error only if the merchant list cannot be loaded.
pub async fn backfill_test_keys(store: &dyn AccountStore) -> Result<Vec<BackfillEntry>> {
    let merchants = store.list_merchants().await?;
    info!("Found {} merchant(s)", merchants.len());

    let mut entries = Vec::with_capacity(merchants.len());
    for merchant in merchants {
        let outcome = match store.count_active_api_keys(merchant.id).await {
            Ok(count) if count > 0 => BackfillOutcome::Existing(count),
            Ok(_) => {
                let keys = generate_merchant_keys(KeyType::Test);
                let record =
                    keys.to_record(merchant.id, merchant.owner_user_id, DEFAULT_TEST_KEY_NAME);
                match store.insert_api_key(&record).await {
                    Ok(()) => {
                        info!(merchant_id = %merchant.id, public_key = %keys.public_key, "Generated test keys");
                        BackfillOutcome::Generated {
                            public_key: keys.public_key,
                            secret_key: keys.secret_key,
                        }
                    }
                    Err(err) => {
                        error!(merchant_id = %merchant.id, "Failed to insert api keys: {err:#}");
                        BackfillOutcome::Failed(format!("{err:#}"))
                    }
                }
            }
            Err(err) => {
                error!(merchant_id = %merchant.id, "Failed to count api keys: {err:#}");
                BackfillOutcome::Failed(format!("{err:#}"))
            }
        };

        entries.push(BackfillEntry {
            merchant_id: merchant.id,
            merchant_name: merchant.name,
            outcome,
        });
    }

    Ok(entries)
}
