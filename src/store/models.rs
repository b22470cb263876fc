//! Rows of the merchant record graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

pub const DEFAULT_COUNTRY: &str = "MX";
pub const DEFAULT_CURRENCY: &str = "MXN";
pub const DEFAULT_CHANNEL: &str = "CARD_NOT_PRESENT";
pub const DEFAULT_STATUS: &str = "draft";
pub const DEFAULT_ONBOARDING_STAGE: &str = "initial";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Merchant {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub country: String,
    pub currency: String,
    pub channel: String,
    pub status: String,
    pub onboarding_stage: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMerchant {
    pub owner_user_id: Uuid,
    pub name: String,
    pub country: String,
    pub currency: String,
    pub channel: String,
    pub status: String,
    pub onboarding_stage: String,
}

impl NewMerchant {
    /// A draft merchant in the initial onboarding stage.
    #[must_use]
    pub fn draft(owner_user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            owner_user_id,
            name: name.into(),
            country: DEFAULT_COUNTRY.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            status: DEFAULT_STATUS.to_string(),
            onboarding_stage: DEFAULT_ONBOARDING_STAGE.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    MerchantOwner,
    Developer,
    Agency,
}

impl ProfileType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MerchantOwner => "merchant_owner",
            Self::Developer => "developer",
            Self::Agency => "agency",
        }
    }
}

impl FromStr for ProfileType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "merchant_owner" => Ok(Self::MerchantOwner),
            "developer" => Ok(Self::Developer),
            "agency" => Ok(Self::Agency),
            other => Err(format!("unknown profile type: {other}")),
        }
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub profile_type: ProfileType,
    pub default_merchant_id: Option<Uuid>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
}

impl MemberRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberOutcome {
    Created,
    /// The `(merchant, user)` pair already had a membership.
    AlreadyMember,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewApiKey {
    pub merchant_id: Uuid,
    pub name: String,
    pub key_type: String,
    pub public_key: String,
    pub secret_key_hash: String,
    pub secret_key_prefix: String,
    pub created_by: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionLog {
    pub user_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
}
