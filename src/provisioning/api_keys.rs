//! Merchant API key pairs.
//!
//! The secret key is shown once; only its SHA-256 and a short prefix (for
//! display and lookup hints) are stored.

use crate::store::NewApiKey;
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

const RANDOM_LEN: usize = 32;
const SECRET_PREFIX_LEN: usize = 12;
pub const DEFAULT_TEST_KEY_NAME: &str = "Default Test Key";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyType {
    Test,
    Live,
}

impl KeyType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct MerchantKeys {
    pub key_type: KeyType,
    pub public_key: String,
    pub secret_key: String,
    pub secret_key_hash: String,
    pub secret_key_prefix: String,
}

impl fmt::Debug for MerchantKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantKeys")
            .field("key_type", &self.key_type)
            .field("public_key", &self.public_key)
            .field("secret_key_prefix", &self.secret_key_prefix)
            .finish_non_exhaustive()
    }
}

impl MerchantKeys {
    /// The storable half of the pair.
    #[must_use]
    pub fn to_record(&self, merchant_id: Uuid, created_by: Uuid, name: &str) -> NewApiKey {
        NewApiKey {
            merchant_id,
            name: name.to_string(),
            key_type: self.key_type.as_str().to_string(),
            public_key: self.public_key.clone(),
            secret_key_hash: self.secret_key_hash.clone(),
            secret_key_prefix: self.secret_key_prefix.clone(),
            created_by,
        }
    }
}

fn random_alphanumeric(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[must_use]
pub fn hash_secret_key(secret_key: &str) -> String {
    format!("{:x}", Sha256::digest(secret_key.as_bytes()))
}

/// Generate `pk_<type>_…` / `sk_<type>_…` with 32 random alphanumerics each.
#[must_use]
pub fn generate_merchant_keys(key_type: KeyType) -> MerchantKeys {
    let public_key = format!("pk_{key_type}_{}", random_alphanumeric(RANDOM_LEN));
    let secret_key = format!("sk_{key_type}_{}", random_alphanumeric(RANDOM_LEN));
    let secret_key_hash = hash_secret_key(&secret_key);
    let secret_key_prefix = secret_key.chars().take(SECRET_PREFIX_LEN).collect();

    MerchantKeys {
        key_type,
        public_key,
        secret_key,
        secret_key_hash,
        secret_key_prefix,
    }
}
