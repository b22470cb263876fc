//! `reqwest` client for a GoTrue-compatible auth API (`/auth/v1`).

use super::{
    IdentityFuture, IdentityProvider,
    error::{IdentityError, api_error},
    types::{IdentitySession, IdentityUser, SignUpOutcome},
};
use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, Response, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{Instrument, debug, info_span};
use url::Url;
use uuid::Uuid;

const API_KEY_HEADER: &str = "apikey";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct GoTrueClient {
    base_url: Url,
    anon_key: SecretString,
    service_key: Option<SecretString>,
    http: Client,
}

impl std::fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("base_url", &self.base_url.as_str())
            .field("anon_key", &"***")
            .field("service_key", &self.service_key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl GoTrueClient {
    /// Build a client for the provider project at `project_url`
    /// (e.g. `https://abcd.supabase.co`).
    ///
    /// # Errors
    /// Returns an error if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(
        project_url: &str,
        anon_key: SecretString,
        service_key: Option<SecretString>,
    ) -> Result<Self> {
        let mut base_url = Url::parse(project_url)
            .with_context(|| format!("Invalid identity provider URL: {project_url}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Identity provider URL must use http or https: {project_url}"
            ));
        }
        let path = format!("{}/auth/v1/", base_url.path().trim_end_matches('/'));
        base_url.set_path(&path);

        let http = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build identity provider HTTP client")?;

        Ok(Self {
            base_url,
            anon_key,
            service_key,
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityError::Decode(format!("invalid endpoint {path}: {err}")))
    }

    fn anon(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(API_KEY_HEADER, self.anon_key.expose_secret())
    }

    fn bearer(&self, builder: RequestBuilder, access_token: &str) -> RequestBuilder {
        self.anon(builder)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
    }

    fn admin(&self, builder: RequestBuilder) -> Result<RequestBuilder, IdentityError> {
        let key = self
            .service_key
            .as_ref()
            .ok_or(IdentityError::MissingServiceKey)?;
        Ok(builder
            .header(API_KEY_HEADER, key.expose_secret())
            .header(AUTHORIZATION, format!("Bearer {}", key.expose_secret())))
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, IdentityError> {
        let span = info_span!("identity.request", identity.operation = operation);
        let response = builder.send().instrument(span).await?;
        debug!(operation, status = %response.status(), "identity provider responded");
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, IdentityError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| IdentityError::Decode(err.to_string()))
}

async fn expect_success(response: Response) -> Result<(), IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await?;
    Err(api_error(status.as_u16(), &body))
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Sign-up answers with a session when auto-confirm is on, otherwise with the bare user.
fn parse_sign_up(value: Value) -> Result<SignUpOutcome, IdentityError> {
    if value.get("access_token").is_some() {
        let session: IdentitySession = serde_json::from_value(value)
            .map_err(|err| IdentityError::Decode(err.to_string()))?;
        return Ok(SignUpOutcome::from_session(session.with_expiry(now_unix())));
    }
    if value.get("id").is_some() {
        let user: IdentityUser =
            serde_json::from_value(value).map_err(|err| IdentityError::Decode(err.to_string()))?;
        return Ok(SignUpOutcome::pending(user));
    }
    if let Some(user) = value.get("user").filter(|user| !user.is_null()) {
        let user: IdentityUser = serde_json::from_value(user.clone())
            .map_err(|err| IdentityError::Decode(err.to_string()))?;
        return Ok(SignUpOutcome::pending(user));
    }
    Ok(SignUpOutcome::default())
}

impl IdentityProvider for GoTrueClient {
    fn sign_in_with_password<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentitySession> {
        Box::pin(async move {
            let url = self.endpoint("token")?;
            let request = self
                .anon(self.http.post(url))
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password }));
            let response = self.send("sign_in_with_password", request).await?;
            let session: IdentitySession = decode(response).await?;
            Ok(session.with_expiry(now_unix()))
        })
    }

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, SignUpOutcome> {
        Box::pin(async move {
            let url = self.endpoint("signup")?;
            let request = self
                .anon(self.http.post(url))
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email, "password": password }));
            let response = self.send("sign_up", request).await?;
            let value: Value = decode(response).await?;
            parse_sign_up(value)
        })
    }

    fn send_password_recovery<'a>(
        &'a self,
        email: &'a str,
        redirect_to: &'a str,
    ) -> IdentityFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint("recover")?;
            let request = self
                .anon(self.http.post(url))
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email }));
            let response = self.send("send_password_recovery", request).await?;
            expect_success(response).await
        })
    }

    fn get_user<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, IdentityUser> {
        Box::pin(async move {
            let url = self.endpoint("user")?;
            let request = self.bearer(self.http.get(url), access_token);
            let response = self.send("get_user", request).await?;
            decode(response).await
        })
    }

    fn update_password<'a>(
        &'a self,
        access_token: &'a str,
        password: &'a str,
    ) -> IdentityFuture<'a, IdentityUser> {
        Box::pin(async move {
            let url = self.endpoint("user")?;
            let request = self
                .bearer(self.http.put(url), access_token)
                .json(&json!({ "password": password }));
            let response = self.send("update_password", request).await?;
            decode(response).await
        })
    }

    fn sign_out<'a>(&'a self, access_token: &'a str) -> IdentityFuture<'a, ()> {
        Box::pin(async move {
            let url = self.endpoint("logout")?;
            let request = self.bearer(self.http.post(url), access_token);
            let response = self.send("sign_out", request).await?;
            expect_success(response).await
        })
    }

    fn refresh_session<'a>(&'a self, refresh_token: &'a str) -> IdentityFuture<'a, IdentitySession> {
        Box::pin(async move {
            let url = self.endpoint("token")?;
            let request = self
                .anon(self.http.post(url))
                .query(&[("grant_type", "refresh_token")])
                .json(&json!({ "refresh_token": refresh_token }));
            let response = self.send("refresh_session", request).await?;
            let session: IdentitySession = decode(response).await?;
            Ok(session.with_expiry(now_unix()))
        })
    }

    fn delete_user(&self, user_id: Uuid) -> IdentityFuture<'_, ()> {
        Box::pin(async move {
            let url = self.endpoint(&format!("admin/users/{user_id}"))?;
            let request = self.admin(self.http.delete(url))?;
            let response = self.send("delete_user", request).await?;
            expect_success(response).await
        })
    }

    fn health(&self) -> IdentityFuture<'_, ()> {
        Box::pin(async move {
            let url = self.endpoint("health")?;
            let request = self.anon(self.http.get(url));
            let response = self.send("health", request).await?;
            expect_success(response).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_appends_auth_prefix() -> Result<()> {
        let client = GoTrueClient::new(
            "https://abcd.supabase.co",
            SecretString::from("anon"),
            None,
        )?;
        assert_eq!(client.base_url().as_str(), "https://abcd.supabase.co/auth/v1/");
        assert_eq!(
            client.endpoint("token").map(|url| url.to_string()).ok(),
            Some("https://abcd.supabase.co/auth/v1/token".to_string())
        );

        let nested = GoTrueClient::new(
            "http://localhost:9999/gateway/",
            SecretString::from("anon"),
            None,
        )?;
        assert_eq!(
            nested.base_url().as_str(),
            "http://localhost:9999/gateway/auth/v1/"
        );
        Ok(())
    }

    #[test]
    fn new_rejects_non_http_urls() {
        assert!(GoTrueClient::new("ftp://example.com", SecretString::from("anon"), None).is_err());
        assert!(GoTrueClient::new("not a url", SecretString::from("anon"), None).is_err());
    }

    #[test]
    fn debug_hides_keys() -> Result<()> {
        let client = GoTrueClient::new(
            "https://abcd.supabase.co",
            SecretString::from("anon-secret"),
            Some(SecretString::from("service-secret")),
        )?;
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("anon-secret"));
        assert!(!rendered.contains("service-secret"));
        Ok(())
    }

    #[test]
    fn parse_sign_up_distinguishes_session_and_user() -> Result<()> {
        let with_session = parse_sign_up(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": {"id": "6f1c1d2e-8a34-4a9b-9f7e-2b1d3c4e5f60", "email": "ana@example.com"}
        }))?;
        assert!(with_session.session.is_some());
        assert!(with_session.user.is_some());

        let pending = parse_sign_up(json!({
            "id": "6f1c1d2e-8a34-4a9b-9f7e-2b1d3c4e5f60",
            "email": "ana@example.com",
            "confirmation_sent_at": "2024-05-01T10:00:00Z"
        }))?;
        assert!(pending.session.is_none());
        assert_eq!(
            pending.user.and_then(|user| user.email),
            Some("ana@example.com".to_string())
        );

        let empty = parse_sign_up(json!({"user": null, "session": null}))?;
        assert!(empty.user.is_none());
        Ok(())
    }
}
