//! Payloads exchanged with the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl IdentityUser {
    #[must_use]
    pub fn is_email_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Token pair issued by the provider, stored verbatim in the session cookies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentitySession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds. Older provider versions omit it; see [`IdentitySession::with_expiry`].
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: IdentityUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl IdentitySession {
    /// Fill `expires_at` from `expires_in` when the provider did not send it.
    #[must_use]
    pub fn with_expiry(mut self, now_unix: i64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(now_unix.saturating_add(self.expires_in));
        }
        self
    }

    /// True when the access token is expired or expires within `margin_seconds`.
    /// Sessions without any expiry information are treated as expiring.
    #[must_use]
    pub fn expires_within(&self, now_unix: i64, margin_seconds: i64) -> bool {
        self.expires_at
            .is_none_or(|expires_at| expires_at <= now_unix.saturating_add(margin_seconds))
    }
}

/// Result of a sign-up call.
///
/// With email confirmation enabled the provider returns only the user; with
/// auto-confirm it returns a full session.
#[derive(Clone, Debug, Default)]
pub struct SignUpOutcome {
    pub user: Option<IdentityUser>,
    pub session: Option<IdentitySession>,
}

impl SignUpOutcome {
    #[must_use]
    pub fn from_session(session: IdentitySession) -> Self {
        Self {
            user: Some(session.user.clone()),
            session: Some(session),
        }
    }

    #[must_use]
    pub fn pending(user: IdentityUser) -> Self {
        Self {
            user: Some(user),
            session: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn session(expires_at: Option<i64>) -> IdentitySession {
        IdentitySession {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            expires_at,
            user: IdentityUser {
                id: Uuid::nil(),
                email: Some("ana@example.com".to_string()),
                email_confirmed_at: None,
            },
        }
    }

    #[test]
    fn with_expiry_fills_missing_expires_at() {
        let filled = session(None).with_expiry(1_000);
        assert_eq!(filled.expires_at, Some(4_600));

        let kept = session(Some(42)).with_expiry(1_000);
        assert_eq!(kept.expires_at, Some(42));
    }

    #[test]
    fn expires_within_honours_margin() {
        let session = session(Some(1_100));
        assert!(!session.expires_within(1_000, 30));
        assert!(session.expires_within(1_080, 30));
        assert!(session.expires_within(2_000, 0));
    }

    #[test]
    fn session_without_expiry_counts_as_expiring() {
        assert!(session(None).expires_within(0, 0));
    }

    #[test]
    fn user_parses_provider_payload() -> Result<()> {
        let user: IdentityUser = serde_json::from_str(
            r#"{
                "id": "6f1c1d2e-8a34-4a9b-9f7e-2b1d3c4e5f60",
                "aud": "authenticated",
                "email": "ana@example.com",
                "email_confirmed_at": "2024-05-01T10:00:00Z",
                "app_metadata": {"provider": "email"}
            }"#,
        )?;
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        assert!(user.is_email_confirmed());

        let unconfirmed: IdentityUser = serde_json::from_str(
            r#"{"id": "6f1c1d2e-8a34-4a9b-9f7e-2b1d3c4e5f60", "email_confirmed_at": null}"#,
        )?;
        assert!(!unconfirmed.is_email_confirmed());
        Ok(())
    }
}
